//! Password reset with single-use tokens that are delivered by email.
//!
//! Only the SHA-256 digest of a token is stored.

use std::fmt::Write;

use axum::{Json, extract::State};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    Error, PasswordHash, UserID,
    mail::{Email, MailState},
    user::{get_user_by_email, set_password},
};

const NEUTRAL_MESSAGE: &str =
    "If the email is registered you will receive instructions to reset your password.";

/// Create the table that holds password reset token digests.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_password_reset_token_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS password_reset_token (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                token_hash TEXT NOT NULL UNIQUE,
                expires_at TEXT NOT NULL,
                used INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// The hex encoded SHA-256 digest of `token`.
pub(crate) fn hash_token(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .fold(String::with_capacity(64), |mut hex, byte| {
            // Writing to a string cannot fail.
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}

/// Issue a new reset token for `user_id` that expires `duration` after `now`.
///
/// Unused tokens issued earlier are invalidated. Returns the raw token, which is not stored.
pub fn create_password_reset_token(
    user_id: UserID,
    now: OffsetDateTime,
    duration: Duration,
    connection: &Connection,
) -> Result<String, Error> {
    let token = Uuid::new_v4().simple().to_string();

    connection.execute(
        "UPDATE password_reset_token SET used = 1 WHERE user_id = ?1 AND used = 0",
        (user_id.as_i64(),),
    )?;
    connection.execute(
        "INSERT INTO password_reset_token (user_id, token_hash, expires_at) VALUES (?1, ?2, ?3)",
        (user_id.as_i64(), hash_token(&token), now + duration),
    )?;

    Ok(token)
}

/// Mark `token` as used and return the user it was issued to.
///
/// # Errors
///
/// Returns [Error::InvalidToken] if the token is unknown, already used or expired at `now`.
pub fn consume_password_reset_token(
    token: &str,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<UserID, Error> {
    let (id, user_id, expires_at): (i64, i64, OffsetDateTime) = connection
        .query_row(
            "SELECT id, user_id, expires_at FROM password_reset_token
             WHERE token_hash = ?1 AND used = 0",
            (hash_token(token),),
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::InvalidToken,
            error => error.into(),
        })?;

    if expires_at < now {
        return Err(Error::InvalidToken);
    }

    connection.execute(
        "UPDATE password_reset_token SET used = 1 WHERE id = ?1",
        (id,),
    )?;

    Ok(UserID::new(user_id))
}

/// The email address that forgot its password.
#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    email: String,
}

/// Email a password reset token to a registered user.
///
/// Always answers with the same message so that callers cannot find out which emails are
/// registered.
pub async fn forgot_password(
    State(state): State<MailState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = match get_user_by_email(&request.email, &connection) {
        Ok(user) if user.is_active && user.password_hash.is_some() => user,
        Ok(_) | Err(Error::NotFound) => {
            tracing::debug!("Ignoring password reset request for unknown or password-less user");
            return Ok(Json(json!({ "message": NEUTRAL_MESSAGE })));
        }
        Err(error) => return Err(error),
    };

    let duration = state.auth_config.reset_token_duration;
    let token =
        create_password_reset_token(user.id, OffsetDateTime::now_utc(), duration, &connection)?;

    state.mailer.send(&Email {
        to: user.email,
        subject: "Reset your MoneyHub password".to_owned(),
        body: format!(
            "Use this token to reset your password: {token}\n\
             It expires in {} minutes.",
            duration.whole_minutes()
        ),
    })?;

    Ok(Json(json!({ "message": NEUTRAL_MESSAGE })))
}

/// The data submitted to reset a password.
#[derive(Clone, Serialize, Deserialize)]
pub struct ResetPasswordForm {
    /// The token from the reset email.
    pub token: String,
    /// The new password.
    pub new_password: String,
    /// The new password, typed again.
    pub confirm_password: String,
}

/// Set a new password using a reset token.
///
/// # Errors
///
/// Returns:
/// - [Error::PasswordMismatch] if the passwords differ,
/// - [Error::TooWeak] if the new password is too easy to guess,
/// - [Error::InvalidToken] if the token is unknown, used or expired.
pub async fn reset_password(
    State(state): State<MailState>,
    Json(form): Json<ResetPasswordForm>,
) -> Result<Json<Value>, Error> {
    if form.new_password != form.confirm_password {
        return Err(Error::PasswordMismatch);
    }

    let password_hash =
        PasswordHash::from_raw_password(&form.new_password, state.auth_config.password_hash_cost)?;

    let mut connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let transaction = connection.transaction()?;

    let user_id =
        consume_password_reset_token(&form.token, OffsetDateTime::now_utc(), &transaction)?;
    set_password(user_id, &password_hash, &transaction)?;

    transaction.commit()?;
    tracing::info!("User {user_id} reset their password");

    Ok(Json(json!({ "message": "password has been reset" })))
}
