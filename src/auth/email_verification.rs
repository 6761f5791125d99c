//! Email verification with six digit codes that are delivered by email.

use axum::{Extension, Json, extract::State};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    Error, User, UserID,
    mail::{Email, MailState},
    user::{get_user_by_id, set_email_verified},
};

/// Create the table that holds email verification codes.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_verification_code_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS verification_code (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                code TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                used INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

fn generate_code() -> String {
    format!("{:06}", Uuid::new_v4().as_u128() % 1_000_000)
}

/// Issue a new verification code for `user_id` that expires `duration` after `now`.
///
/// Unused codes issued earlier are invalidated.
pub fn create_verification_code(
    user_id: UserID,
    now: OffsetDateTime,
    duration: Duration,
    connection: &Connection,
) -> Result<String, Error> {
    let code = generate_code();

    connection.execute(
        "UPDATE verification_code SET used = 1 WHERE user_id = ?1 AND used = 0",
        (user_id.as_i64(),),
    )?;
    connection.execute(
        "INSERT INTO verification_code (user_id, code, expires_at) VALUES (?1, ?2, ?3)",
        (user_id.as_i64(), &code, now + duration),
    )?;

    Ok(code)
}

/// Mark the verification `code` of `user_id` as used.
///
/// # Errors
///
/// Returns [Error::InvalidToken] if the code is wrong, already used or expired at `now`.
pub fn consume_verification_code(
    user_id: UserID,
    code: &str,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let (id, expires_at): (i64, OffsetDateTime) = connection
        .query_row(
            "SELECT id, expires_at FROM verification_code
             WHERE user_id = ?1 AND code = ?2 AND used = 0",
            (user_id.as_i64(), code.trim()),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::InvalidToken,
            error => error.into(),
        })?;

    if expires_at < now {
        return Err(Error::InvalidToken);
    }

    connection.execute("UPDATE verification_code SET used = 1 WHERE id = ?1", (id,))?;

    Ok(())
}

/// Email a verification code to the current user.
///
/// # Errors
///
/// Returns [Error::Validation] if the email address is already verified.
pub async fn send_verification_code(
    State(state): State<MailState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user_by_id(user_id, &connection)?;
    if user.email_verified {
        return Err(Error::Validation("email is already verified".to_owned()));
    }

    let duration = state.auth_config.reset_token_duration;
    let code =
        create_verification_code(user_id, OffsetDateTime::now_utc(), duration, &connection)?;

    state.mailer.send(&Email {
        to: user.email,
        subject: "Verify your MoneyHub email address".to_owned(),
        body: format!(
            "Your verification code is {code}\nIt expires in {} minutes.",
            duration.whole_minutes()
        ),
    })?;

    Ok(Json(json!({ "message": "verification code sent" })))
}

/// The code from the verification email.
#[derive(Deserialize)]
pub struct VerifyEmailRequest {
    code: String,
}

/// Mark the current user's email address as verified.
///
/// # Errors
///
/// Returns [Error::InvalidToken] if the code is wrong, used or expired.
pub async fn verify_email(
    State(state): State<MailState>,
    Extension(user_id): Extension<UserID>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<Json<User>, Error> {
    let mut connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let transaction = connection.transaction()?;

    consume_verification_code(
        user_id,
        &request.code,
        OffsetDateTime::now_utc(),
        &transaction,
    )?;
    set_email_verified(user_id, &transaction)?;
    let user = get_user_by_id(user_id, &transaction)?;

    transaction.commit()?;

    Ok(Json(user))
}

#[cfg(test)]
mod email_verification_tests {
    use axum::http::StatusCode;
    use rusqlite::Connection;
    use serde_json::json;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error, NewUser, User,
        db::initialize,
        endpoints,
        test_utils::{get_test_app, register_test_user},
        user::create_user,
    };

    use super::{consume_verification_code, create_verification_code, generate_code};

    #[test]
    fn code_has_six_digits() {
        for _ in 0..100 {
            let code = generate_code();

            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn expired_code_is_rejected() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = create_user(
            NewUser {
                first_name: "Test".to_owned(),
                last_name: "User".to_owned(),
                email: "test@example.com".to_owned(),
                password_hash: None,
            },
            &connection,
        )
        .unwrap();
        let now = OffsetDateTime::now_utc();
        let code =
            create_verification_code(user.id, now, Duration::minutes(15), &connection).unwrap();

        let result = consume_verification_code(
            user.id,
            &code,
            now + Duration::minutes(20),
            &connection,
        );

        assert_eq!(result, Err(Error::InvalidToken));
    }

    #[tokio::test]
    async fn verify_email_flow() {
        let app = get_test_app();
        let cookie = register_test_user(&app.server, "alice@example.com").await;

        app.server
            .post(endpoints::SEND_VERIFICATION_CODE)
            .add_cookie(cookie.clone())
            .await
            .assert_status_ok();
        let sent = app.mailer.sent();
        assert_eq!(sent.len(), 1);
        let code = sent[0]
            .body
            .split_whitespace()
            .find(|word| word.len() == 6 && word.chars().all(|c| c.is_ascii_digit()))
            .unwrap()
            .to_owned();

        let response = app
            .server
            .post(endpoints::VERIFY_EMAIL)
            .add_cookie(cookie.clone())
            .json(&json!({ "code": code }))
            .await;

        response.assert_status_ok();
        assert!(response.json::<User>().email_verified);

        app.server
            .post(endpoints::SEND_VERIFICATION_CODE)
            .add_cookie(cookie)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_email_rejects_wrong_code() {
        let app = get_test_app();
        let cookie = register_test_user(&app.server, "alice@example.com").await;
        app.server
            .post(endpoints::SEND_VERIFICATION_CODE)
            .add_cookie(cookie.clone())
            .await
            .assert_status_ok();

        app.server
            .post(endpoints::VERIFY_EMAIL)
            .add_cookie(cookie)
            .json(&json!({ "code": "not-a-code" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn send_verification_code_requires_authentication() {
        let app = get_test_app();

        app.server
            .post(endpoints::SEND_VERIFICATION_CODE)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
