//! Endpoints for reading and changing the current user's account.

use axum::{Extension, Json, extract::State, http::StatusCode};
use axum_extra::extract::CookieJar;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Error, PasswordHash, User, UserID,
    account::get_total_balance,
    auth::{AuthState, invalidate_auth_cookies},
    transaction::count_transactions,
    user::core::{UserUpdate, deactivate_user, get_user_by_id, set_password, update_user_profile},
};

/// Get the current user.
pub async fn get_current_user(
    State(state): State<AuthState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<User>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_user_by_id(user_id, &connection).map(Json)
}

/// Change the names or email of the current user.
pub async fn update_current_user(
    State(state): State<AuthState>,
    Extension(user_id): Extension<UserID>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<User>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    update_user_profile(user_id, update, &connection).map(Json)
}

/// The current user with statistics about their data.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    /// The user.
    #[serde(flatten)]
    pub user: User,
    /// How many transactions the user has recorded.
    pub transaction_count: usize,
    /// The sum of the current balances of the user's accounts.
    pub total_balance: Decimal,
}

/// Get the current user together with their transaction count and total balance.
pub async fn get_profile(
    State(state): State<AuthState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<UserProfile>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    Ok(Json(UserProfile {
        user: get_user_by_id(user_id, &connection)?,
        transaction_count: count_transactions(user_id, &connection)?,
        total_balance: get_total_balance(user_id, &connection)?,
    }))
}

/// The data submitted to change a password.
#[derive(Clone, Serialize, Deserialize)]
pub struct ChangePasswordForm {
    /// The password the user logs in with now.
    pub current_password: String,
    /// The new password.
    pub new_password: String,
    /// The new password, typed again.
    pub confirm_password: String,
}

/// Replace the current user's password after checking the current one.
///
/// # Errors
///
/// Returns:
/// - [Error::NoPasswordSet] if the user never set a password,
/// - [Error::IncorrectPassword] if `current_password` is wrong,
/// - [Error::PasswordMismatch] if the new passwords differ,
/// - [Error::TooWeak] if the new password is too easy to guess.
pub async fn change_password(
    State(state): State<AuthState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<ChangePasswordForm>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user_by_id(user_id, &connection)?;
    let password_hash = user.password_hash.ok_or(Error::NoPasswordSet)?;

    let is_current_password = password_hash
        .verify(&form.current_password)
        .map_err(|error| Error::HashingError(error.to_string()))?;
    if !is_current_password {
        return Err(Error::IncorrectPassword);
    }

    if form.new_password != form.confirm_password {
        return Err(Error::PasswordMismatch);
    }

    let new_password_hash =
        PasswordHash::from_raw_password(&form.new_password, state.auth_config.password_hash_cost)?;
    set_password(user_id, &new_password_hash, &connection)?;
    tracing::info!("User {user_id} changed their password");

    Ok(Json(json!({ "message": "password changed" })))
}

/// Deactivate the current user and log them out.
pub async fn deactivate_current_user(
    State(state): State<AuthState>,
    Extension(user_id): Extension<UserID>,
    jar: CookieJar,
) -> Result<(StatusCode, CookieJar), Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    deactivate_user(user_id, &connection)?;
    tracing::info!("Deactivated user {user_id}");

    Ok((
        StatusCode::NO_CONTENT,
        invalidate_auth_cookies(jar, &state.auth_config),
    ))
}
