//! MoneyHub is a backend for tracking personal and shared finances.
//!
//! This library provides a JSON REST API over a SQLite database: bank accounts whose
//! balances follow the transactions posted against them, credit cards, categories,
//! recurring ("fixed") expenses that are posted automatically by a daily scheduler,
//! sharing between users and CSV reports.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod account;
mod app_state;
mod auth;
mod card;
mod category;
mod config;
mod dashboard;
mod database_id;
mod db;
mod endpoints;
mod fixed_expense;
mod logging;
mod mail;
mod money;
mod password;
mod report;
mod routing;
mod scheduler;
mod share;
mod timezone;
mod transaction;
mod user;

#[cfg(test)]
mod test_utils;

pub use account::{Account, AccountBuilder, AccountType, create_account};
pub use app_state::AppState;
pub use category::{Category, CategoryKind, NewCategory, create_category};
pub use config::{AuthConfig, CookieConfig};
pub use db::initialize as initialize_db;
pub use fixed_expense::{FixedExpenseBuilder, create_fixed_expense, run_fixed_expenses_for_date};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use mail::{Mailer, TracingMailer};
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;
pub use scheduler::{SchedulerConfig, run_scheduler};
pub use timezone::get_local_offset;
pub use transaction::{Transaction, TransactionBuilder, TransactionKind, create_transaction};
pub use user::{
    NewUser, User, UserID, count_users, create_user, get_user_by_email, get_user_by_id,
    set_password,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("Could not listen for ctrl+c: {error}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("Could not install the terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email and password combination did not match an active user.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The request did not carry a valid access token.
    #[error("authentication required")]
    Unauthenticated,

    /// The CSRF header was missing or did not match the CSRF cookie.
    #[error("CSRF token missing or invalid")]
    CsrfMismatch,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// A new password and its confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// The user tried to change a password but has never set one.
    #[error("this account does not have a password")]
    NoPasswordSet,

    /// The current password given for a password change is wrong.
    #[error("current password is incorrect")]
    IncorrectPassword,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An access or refresh token could not be created.
    #[error("could not create token: {0}")]
    TokenError(String),

    /// A password reset token or verification code is unknown, used or expired.
    #[error("the token is invalid or has expired")]
    InvalidToken,

    /// The email is already registered to another user.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// A request field failed validation.
    ///
    /// The string describes which field is wrong and why.
    #[error("{0}")]
    Validation(String),

    /// A category, account or card ID that does not exist or belongs to another user.
    #[error("{0} does not refer to one of your records")]
    InvalidReference(String),

    /// A category cannot be deleted while transactions or fixed expenses use it.
    #[error("the category is still used by transactions or fixed expenses")]
    CategoryInUse,

    /// A share request that cannot be fulfilled, e.g. sharing with yourself.
    #[error("{0}")]
    InvalidShare(String),

    /// The share between the two users already exists.
    #[error("a share with this user already exists")]
    DuplicateShare,

    /// The requested resource was not found.
    ///
    /// Resources owned by another user are reported as not found so that their existence is
    /// not leaked.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// The CSV report could not be written.
    #[error("could not write CSV: {0}")]
    CsvError(String),

    /// An email could not be delivered.
    #[error("could not send email: {0}")]
    MailError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::CsrfMismatch => StatusCode::FORBIDDEN,
            Error::TooWeak(_)
            | Error::PasswordMismatch
            | Error::NoPasswordSet
            | Error::IncorrectPassword
            | Error::InvalidToken
            | Error::Validation(_)
            | Error::InvalidReference(_)
            | Error::InvalidShare(_) => StatusCode::BAD_REQUEST,
            Error::DuplicateEmail | Error::CategoryInUse | Error::DuplicateShare => {
                StatusCode::CONFLICT
            }
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::HashingError(_)
            | Error::TokenError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::InvalidTimezoneError(_)
            | Error::CsvError(_)
            | Error::MailError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details are only meant for the server logs.
        let message = if status.is_server_error() {
            tracing::error!("An unexpected error occurred: {}", self);
            "an unexpected error occurred, check the server logs for more details".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::Error;

    #[test]
    fn no_rows_maps_to_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound);
    }

    #[test]
    fn client_errors_use_4xx() {
        assert_eq!(
            Error::InvalidCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::CsrfMismatch.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::DuplicateEmail.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Validation("amount must be positive".to_owned())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn server_errors_use_500() {
        assert_eq!(
            Error::DatabaseLockError.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
