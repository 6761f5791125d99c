//! Route handlers for creating, listing, editing and deleting bank accounts.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error, UserID,
    account::core::{
        Account, AccountBuilder, AccountUpdate, create_account, delete_account, get_account,
        get_accounts, update_account,
    },
    database_id::AccountId,
};

/// The state needed to manage accounts.
#[derive(Debug, Clone)]
pub struct AccountState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for creating a new account.
pub async fn create_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Json(builder): Json<AccountBuilder>,
) -> Result<(StatusCode, Json<Account>), Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let account = create_account(builder, user_id, &connection)?;

    Ok((StatusCode::CREATED, Json(account)))
}

/// A route handler for listing the current user's accounts.
pub async fn get_accounts_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<Account>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_accounts(&[user_id], &connection).map(Json)
}

/// A route handler for getting a single account.
pub async fn get_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Account>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_account(account_id, user_id, &connection).map(Json)
}

/// A route handler for renaming an account or changing its type.
pub async fn update_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Path(account_id): Path<AccountId>,
    Json(update): Json<AccountUpdate>,
) -> Result<Json<Account>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    update_account(account_id, user_id, update, &connection).map(Json)
}

/// A route handler for deleting an account.
pub async fn delete_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Path(account_id): Path<AccountId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    delete_account(account_id, user_id, &connection)?;
    tracing::info!("User {user_id} deleted account {account_id}");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod account_endpoint_tests {
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::{
        Account, AccountType,
        endpoints::{self, format_endpoint},
        test_utils::{get_test_app, register_test_user},
    };

    #[tokio::test]
    async fn create_and_list_accounts() {
        let app = get_test_app();
        let cookie = register_test_user(&app.server, "alice@example.com").await;

        let response = app
            .server
            .post(endpoints::ACCOUNTS)
            .add_cookie(cookie.clone())
            .json(&json!({
                "bank_name": "Nubank",
                "account_type": "savings",
                "initial_balance": "100.00",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let account = response.json::<Account>();
        assert_eq!(account.account_type, AccountType::Savings);
        assert_eq!(account.current_balance, Decimal::new(10000, 2));

        let accounts = app
            .server
            .get(endpoints::ACCOUNTS)
            .add_cookie(cookie)
            .await
            .json::<Vec<Account>>();
        assert_eq!(accounts, vec![account]);
    }

    #[tokio::test]
    async fn balances_serialise_with_two_decimals() {
        let app = get_test_app();
        let cookie = register_test_user(&app.server, "alice@example.com").await;

        let response = app
            .server
            .post(endpoints::ACCOUNTS)
            .add_cookie(cookie)
            .json(&json!({
                "bank_name": "Nubank",
                "account_type": "checking",
                "initial_balance": "80",
            }))
            .await;

        let body = response.json::<serde_json::Value>();
        assert_eq!(body["current_balance"], json!("80.00"));
    }

    #[tokio::test]
    async fn create_rejects_unknown_account_type() {
        let app = get_test_app();
        let cookie = register_test_user(&app.server, "alice@example.com").await;

        let response = app
            .server
            .post(endpoints::ACCOUNTS)
            .add_cookie(cookie)
            .json(&json!({
                "bank_name": "Nubank",
                "account_type": "crypto",
                "initial_balance": "1.00",
            }))
            .await;

        assert!(response.status_code().is_client_error());
    }

    #[tokio::test]
    async fn other_users_cannot_see_or_delete_account() {
        let app = get_test_app();
        let alice = register_test_user(&app.server, "alice@example.com").await;
        let bob = register_test_user(&app.server, "bob@example.com").await;
        let account = app
            .server
            .post(endpoints::ACCOUNTS)
            .add_cookie(alice.clone())
            .json(&json!({
                "bank_name": "Nubank",
                "account_type": "checking",
                "initial_balance": "0",
            }))
            .await
            .json::<Account>();
        let uri = format_endpoint(endpoints::ACCOUNT, account.id);

        app.server
            .get(&uri)
            .add_cookie(bob.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        app.server
            .put(&uri)
            .add_cookie(bob.clone())
            .json(&json!({ "bank_name": "Mine now" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        app.server
            .delete(&uri)
            .add_cookie(bob)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        app.server
            .get(&uri)
            .add_cookie(alice)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn update_and_delete_account() {
        let app = get_test_app();
        let cookie = register_test_user(&app.server, "alice@example.com").await;
        let account = app
            .server
            .post(endpoints::ACCOUNTS)
            .add_cookie(cookie.clone())
            .json(&json!({
                "bank_name": "Nubank",
                "account_type": "checking",
                "initial_balance": "10",
            }))
            .await
            .json::<Account>();
        let uri = format_endpoint(endpoints::ACCOUNT, account.id);

        let updated = app
            .server
            .put(&uri)
            .add_cookie(cookie.clone())
            .json(&json!({ "bank_name": "Itaú" }))
            .await
            .json::<Account>();
        assert_eq!(updated.bank_name, "Itaú");
        assert_eq!(updated.account_type, AccountType::Checking);

        app.server
            .delete(&uri)
            .add_cookie(cookie.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.server
            .get(&uri)
            .add_cookie(cookie)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
