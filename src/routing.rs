//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::{
    AppState,
    account::{
        create_account_endpoint, delete_account_endpoint, get_account_endpoint,
        get_accounts_endpoint, update_account_endpoint,
    },
    auth::{
        auth_guard, check_email, csrf_guard, forgot_password, get_me, post_log_in, post_log_out,
        post_refresh, register_user, reset_password, send_verification_code, validate_password,
        verify_email,
    },
    card::{
        create_card_endpoint, delete_card_endpoint, get_card_endpoint, get_cards_endpoint,
        update_card_endpoint,
    },
    category::{
        create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
        get_category_endpoint, update_category_endpoint,
    },
    dashboard::{
        get_balances_by_account_endpoint, get_daily_flow_endpoint,
        get_expenses_by_category_endpoint, get_summary_endpoint,
    },
    endpoints,
    fixed_expense::{
        create_fixed_expense_endpoint, delete_fixed_expense_endpoint, get_fixed_expense_endpoint,
        get_fixed_expenses_endpoint, get_upcoming_fixed_expenses_endpoint,
        run_fixed_expenses_endpoint, update_fixed_expense_endpoint,
    },
    report::get_transactions_csv,
    share::{
        accept_share_endpoint, create_share_endpoint, decline_share_endpoint,
        delete_share_endpoint, get_shares_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        get_transactions_endpoint,
    },
    user::{
        change_password, deactivate_current_user, get_current_user, get_profile,
        update_current_user,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::HEALTH, get(get_health))
        .route(endpoints::REGISTER, post(register_user))
        .route(endpoints::LOG_IN, post(post_log_in))
        .route(endpoints::REFRESH, post(post_refresh))
        .route(endpoints::CHECK_EMAIL, post(check_email))
        .route(endpoints::VALIDATE_PASSWORD, post(validate_password))
        .route(endpoints::FORGOT_PASSWORD, post(forgot_password))
        .route(endpoints::RESET_PASSWORD, post(reset_password));

    // Logging out only needs the CSRF check so that a stale session can always be cleared.
    let log_out_route = Router::new()
        .route(endpoints::LOG_OUT, post(post_log_out))
        .layer(middleware::from_fn_with_state(state.clone(), csrf_guard));

    let protected_routes = Router::new()
        .route(endpoints::AUTH_ME, get(get_me))
        .route(endpoints::SEND_VERIFICATION_CODE, post(send_verification_code))
        .route(endpoints::VERIFY_EMAIL, post(verify_email))
        .route(
            endpoints::USERS_ME,
            get(get_current_user)
                .put(update_current_user)
                .delete(deactivate_current_user),
        )
        .route(endpoints::USER_PROFILE, get(get_profile))
        .route(endpoints::CHANGE_PASSWORD, post(change_password))
        .route(
            endpoints::ACCOUNTS,
            get(get_accounts_endpoint).post(create_account_endpoint),
        )
        .route(
            endpoints::ACCOUNT,
            get(get_account_endpoint)
                .put(update_account_endpoint)
                .delete(delete_account_endpoint),
        )
        .route(
            endpoints::CARDS,
            get(get_cards_endpoint).post(create_card_endpoint),
        )
        .route(
            endpoints::CARD,
            get(get_card_endpoint)
                .put(update_card_endpoint)
                .delete(delete_card_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(get_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            get(get_category_endpoint)
                .put(update_category_endpoint)
                .delete(delete_category_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint).delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::FIXED_EXPENSES,
            get(get_fixed_expenses_endpoint).post(create_fixed_expense_endpoint),
        )
        .route(
            endpoints::FIXED_EXPENSE,
            get(get_fixed_expense_endpoint)
                .put(update_fixed_expense_endpoint)
                .delete(delete_fixed_expense_endpoint),
        )
        .route(
            endpoints::RUN_FIXED_EXPENSES,
            post(run_fixed_expenses_endpoint),
        )
        .route(
            endpoints::UPCOMING_FIXED_EXPENSES,
            get(get_upcoming_fixed_expenses_endpoint),
        )
        .route(
            endpoints::SHARES,
            get(get_shares_endpoint).post(create_share_endpoint),
        )
        .route(endpoints::SHARE, axum::routing::delete(delete_share_endpoint))
        .route(endpoints::ACCEPT_SHARE, post(accept_share_endpoint))
        .route(endpoints::DECLINE_SHARE, post(decline_share_endpoint))
        .route(endpoints::TRANSACTIONS_REPORT, get(get_transactions_csv))
        .route(endpoints::DASHBOARD_SUMMARY, get(get_summary_endpoint))
        .route(
            endpoints::DASHBOARD_BALANCES,
            get(get_balances_by_account_endpoint),
        )
        .route(
            endpoints::DASHBOARD_EXPENSES_BY_CATEGORY,
            get(get_expenses_by_category_endpoint),
        )
        .route(endpoints::DASHBOARD_DAILY_FLOW, get(get_daily_flow_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), csrf_guard))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(log_out_route)
        .merge(unprotected_routes)
        .with_state(state)
}

/// Report that the server is up.
async fn get_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod routing_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        auth::{COOKIE_ACCESS_TOKEN, COOKIE_CSRF_TOKEN, CSRF_HEADER},
        endpoints,
        test_utils::{TEST_PASSWORD, get_test_app, get_test_app_with_csrf, register_test_user},
    };

    #[tokio::test]
    async fn health_is_public() {
        let app = get_test_app();

        let response = app.server.get(endpoints::HEALTH).await;

        response.assert_status_ok();
        response.assert_json(&json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn protected_routes_require_authentication() {
        let app = get_test_app();

        for endpoint in [
            endpoints::ACCOUNTS,
            endpoints::TRANSACTIONS,
            endpoints::FIXED_EXPENSES,
            endpoints::DASHBOARD_SUMMARY,
            endpoints::TRANSACTIONS_REPORT,
        ] {
            let response = app.server.get(endpoint).await;

            response.assert_status(StatusCode::UNAUTHORIZED);
            response.assert_json(&json!({ "error": "authentication required" }));
        }
    }

    #[tokio::test]
    async fn enforced_csrf_requires_matching_header() {
        let app = get_test_app_with_csrf();
        let response = app
            .server
            .post(endpoints::REGISTER)
            .json(&json!({
                "first_name": "Alice",
                "last_name": "Smith",
                "email": "alice@example.com",
                "password": TEST_PASSWORD,
            }))
            .await;
        let access_cookie = response.cookie(COOKIE_ACCESS_TOKEN);
        let csrf_cookie = response.cookie(COOKIE_CSRF_TOKEN);
        let account = json!({
            "bank_name": "Nubank",
            "account_type": "checking",
            "initial_balance": "0",
        });

        app.server
            .post(endpoints::ACCOUNTS)
            .add_cookie(access_cookie.clone())
            .add_cookie(csrf_cookie.clone())
            .json(&account)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.server
            .get(endpoints::ACCOUNTS)
            .add_cookie(access_cookie.clone())
            .await
            .assert_status_ok();
        app.server
            .post(endpoints::ACCOUNTS)
            .add_cookie(access_cookie)
            .add_cookie(csrf_cookie.clone())
            .add_header(CSRF_HEADER, csrf_cookie.value())
            .json(&account)
            .await
            .assert_status(StatusCode::CREATED);
    }

    #[tokio::test]
    async fn log_out_clears_cookies() {
        let app = get_test_app();
        let cookie = register_test_user(&app.server, "alice@example.com").await;

        let response = app
            .server
            .post(endpoints::LOG_OUT)
            .add_cookie(cookie)
            .await;

        response.assert_status_ok();
        assert_eq!(response.cookie(COOKIE_ACCESS_TOKEN).value(), "");
    }
}
