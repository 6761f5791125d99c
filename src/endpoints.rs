//! The URIs of the REST API.
//!
//! Every route lives under the `/api` prefix.

/// Reports whether the server is up.
pub const HEALTH: &str = "/api/health";

/// Registers a new user.
pub const REGISTER: &str = "/api/auth/register";
/// Exchanges credentials for auth cookies.
pub const LOG_IN: &str = "/api/auth/login";
/// Clears the auth cookies.
pub const LOG_OUT: &str = "/api/auth/logout";
/// Exchanges a refresh token for new auth cookies.
///
/// The refresh cookie is scoped to this path.
pub const REFRESH: &str = "/api/auth/refresh";
/// The user the access token belongs to.
pub const AUTH_ME: &str = "/api/auth/me";
/// Checks whether an email address is free to register.
pub const CHECK_EMAIL: &str = "/api/auth/check-email";
/// Checks whether a password is strong enough.
pub const VALIDATE_PASSWORD: &str = "/api/auth/validate-password";
/// Emails a password reset token.
pub const FORGOT_PASSWORD: &str = "/api/auth/forgot-password";
/// Sets a new password with a password reset token.
pub const RESET_PASSWORD: &str = "/api/auth/reset-password";
/// Emails an email verification code to the current user.
pub const SEND_VERIFICATION_CODE: &str = "/api/auth/send-verification-code";
/// Marks the current user's email as verified with a verification code.
pub const VERIFY_EMAIL: &str = "/api/auth/verify-email";

/// The current user's account.
pub const USERS_ME: &str = "/api/users/me";
/// The current user's account with statistics.
pub const USER_PROFILE: &str = "/api/users/profile";
/// Changes the current user's password.
pub const CHANGE_PASSWORD: &str = "/api/users/change-password";

/// The route to list and create bank accounts.
pub const ACCOUNTS: &str = "/api/accounts";
/// The route to access a single bank account.
pub const ACCOUNT: &str = "/api/accounts/{account_id}";

/// The route to list and create credit cards.
pub const CARDS: &str = "/api/cards";
/// The route to access a single credit card.
pub const CARD: &str = "/api/cards/{card_id}";

/// The route to list and create categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route to access a single category.
pub const CATEGORY: &str = "/api/categories/{category_id}";

/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";

/// The route to list and create fixed expenses.
pub const FIXED_EXPENSES: &str = "/api/fixed-expenses";
/// The route to access a single fixed expense.
pub const FIXED_EXPENSE: &str = "/api/fixed-expenses/{fixed_expense_id}";
/// Posts the fixed expenses due today.
pub const RUN_FIXED_EXPENSES: &str = "/api/fixed-expenses/run";
/// Previews the fixed expenses due in the coming days.
pub const UPCOMING_FIXED_EXPENSES: &str = "/api/fixed-expenses/upcoming";

/// The route to list and create shares.
pub const SHARES: &str = "/api/shares";
/// The route to delete a single share.
pub const SHARE: &str = "/api/shares/{share_id}";
/// Accepts a pending share.
pub const ACCEPT_SHARE: &str = "/api/shares/{share_id}/accept";
/// Declines a pending share.
pub const DECLINE_SHARE: &str = "/api/shares/{share_id}/decline";

/// Downloads the filtered transactions as CSV.
pub const TRANSACTIONS_REPORT: &str = "/api/reports/transactions.csv";

/// Income, expenses and net for a period.
pub const DASHBOARD_SUMMARY: &str = "/api/dashboard/summary";
/// Current balance of each visible account.
pub const DASHBOARD_BALANCES: &str = "/api/dashboard/balances-by-account";
/// Expense totals per category for a period.
pub const DASHBOARD_EXPENSES_BY_CATEGORY: &str = "/api/dashboard/expenses-by-category";
/// Income and expense totals per day for a period.
pub const DASHBOARD_DAILY_FLOW: &str = "/api/dashboard/daily-flow";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/accounts/{account_id}', '{account_id}' is the parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok(), "{uri} is not a valid URI");
    }

    #[test]
    fn endpoints_are_valid_uris() {
        for endpoint in [
            endpoints::HEALTH,
            endpoints::REGISTER,
            endpoints::LOG_IN,
            endpoints::LOG_OUT,
            endpoints::REFRESH,
            endpoints::AUTH_ME,
            endpoints::CHECK_EMAIL,
            endpoints::VALIDATE_PASSWORD,
            endpoints::FORGOT_PASSWORD,
            endpoints::RESET_PASSWORD,
            endpoints::SEND_VERIFICATION_CODE,
            endpoints::VERIFY_EMAIL,
            endpoints::USERS_ME,
            endpoints::USER_PROFILE,
            endpoints::CHANGE_PASSWORD,
            endpoints::ACCOUNTS,
            endpoints::ACCOUNT,
            endpoints::CARDS,
            endpoints::CARD,
            endpoints::CATEGORIES,
            endpoints::CATEGORY,
            endpoints::TRANSACTIONS,
            endpoints::TRANSACTION,
            endpoints::FIXED_EXPENSES,
            endpoints::FIXED_EXPENSE,
            endpoints::RUN_FIXED_EXPENSES,
            endpoints::UPCOMING_FIXED_EXPENSES,
            endpoints::SHARES,
            endpoints::SHARE,
            endpoints::ACCEPT_SHARE,
            endpoints::DECLINE_SHARE,
            endpoints::TRANSACTIONS_REPORT,
            endpoints::DASHBOARD_SUMMARY,
            endpoints::DASHBOARD_BALANCES,
            endpoints::DASHBOARD_EXPENSES_BY_CATEGORY,
            endpoints::DASHBOARD_DAILY_FLOW,
        ] {
            assert_endpoint_is_valid_uri(endpoint);
        }
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint("/hello/{world_id}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint("/hello/world", 1);

        assert_eq!(formatted_path, "/hello/world");
    }

    #[test]
    fn parameter_in_middle() {
        let formatted_path = format_endpoint(endpoints::ACCEPT_SHARE, 7);

        assert_eq!(formatted_path, "/api/shares/7/accept");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }
}
