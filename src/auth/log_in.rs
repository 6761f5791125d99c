//! Handlers for logging in and out, refreshing tokens and fetching the current user.

use axum::{Extension, Json, extract::State};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::{
    Error, User, UserID,
    auth::{
        cookie::{COOKIE_REFRESH_TOKEN, invalidate_auth_cookies, set_auth_cookies},
        middleware::AuthState,
        token::decode_refresh_token,
    },
    user::{get_user_by_email, get_user_by_id, record_login},
};

/// The credentials entered by the user when logging in.
///
/// The password is stored as a plain string. There is no need for validation here since
/// it will be compared against the password hash in the database.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogInData {
    /// Email entered during log-in.
    pub email: String,
    /// Password entered during log-in.
    pub password: String,
}

/// Check that `raw_password` is the password of an active `user`.
///
/// Every failure is reported as [Error::InvalidCredentials] so that callers cannot tell
/// which part of the credentials was wrong.
fn verify_credentials(user: &User, raw_password: &str) -> Result<(), Error> {
    if !user.is_active {
        return Err(Error::InvalidCredentials);
    }

    let Some(password_hash) = &user.password_hash else {
        return Err(Error::InvalidCredentials);
    };

    match password_hash.verify(raw_password) {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::InvalidCredentials),
        Err(error) => Err(Error::HashingError(error.to_string())),
    }
}

/// Handler for log-in requests.
///
/// On success the auth cookies are set and the user is returned.
///
/// # Errors
///
/// Returns [Error::InvalidCredentials] if the email is unknown, the password is wrong, the
/// user is inactive or never set a password.
pub async fn post_log_in(
    State(state): State<AuthState>,
    jar: CookieJar,
    Json(credentials): Json<LogInData>,
) -> Result<(CookieJar, Json<User>), Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = match get_user_by_email(&credentials.email, &connection) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::InvalidCredentials),
        Err(error) => return Err(error),
    };

    verify_credentials(&user, &credentials.password)?;
    record_login(user.id, OffsetDateTime::now_utc(), &connection)?;
    let user = get_user_by_id(user.id, &connection)?;
    tracing::info!("User {} logged in", user.id);

    let jar = set_auth_cookies(jar, user.id, &state.auth_config)?;

    Ok((jar, Json(user)))
}

/// Clear the auth cookies.
pub async fn post_log_out(
    State(state): State<AuthState>,
    jar: CookieJar,
) -> (CookieJar, Json<Value>) {
    (
        invalidate_auth_cookies(jar, &state.auth_config),
        Json(json!({ "message": "logged out" })),
    )
}

/// Exchange the refresh token cookie for a new set of auth cookies.
///
/// # Errors
///
/// Returns [Error::Unauthenticated] if the refresh token is missing, invalid, expired or
/// belongs to an unknown or inactive user.
pub async fn post_refresh(
    State(state): State<AuthState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<User>), Error> {
    let refresh_token = jar
        .get(COOKIE_REFRESH_TOKEN)
        .map(|cookie| cookie.value().to_owned())
        .ok_or(Error::Unauthenticated)?;
    let user_id = decode_refresh_token(&refresh_token, &state.auth_config)?.user_id();

    let user = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        match get_user_by_id(user_id, &connection) {
            Ok(user) if user.is_active => user,
            Ok(_) | Err(Error::NotFound) => return Err(Error::Unauthenticated),
            Err(error) => return Err(error),
        }
    };

    let jar = set_auth_cookies(jar, user.id, &state.auth_config)?;

    Ok((jar, Json(user)))
}

/// Get the user the access token was issued to.
pub async fn get_me(
    State(state): State<AuthState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<User>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_user_by_id(user_id, &connection).map(Json)
}

#[cfg(test)]
mod log_in_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        User,
        auth::cookie::{COOKIE_ACCESS_TOKEN, COOKIE_CSRF_TOKEN, COOKIE_REFRESH_TOKEN},
        endpoints,
        test_utils::{TEST_PASSWORD, get_test_app, register_test_user},
        user::deactivate_user,
    };

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let app = get_test_app();
        register_test_user(&app.server, "alice@example.com").await;

        let response = app
            .server
            .post(endpoints::LOG_IN)
            .json(&json!({ "email": "Alice@Example.com ", "password": TEST_PASSWORD }))
            .await;

        response.assert_status_ok();
        let user = response.json::<User>();
        assert_eq!(user.email, "alice@example.com");
        assert!(user.last_login.is_some());
        assert!(!response.cookie(COOKIE_ACCESS_TOKEN).value().is_empty());
        assert!(!response.cookie(COOKIE_REFRESH_TOKEN).value().is_empty());
        assert!(!response.cookie(COOKIE_CSRF_TOKEN).value().is_empty());
    }

    #[tokio::test]
    async fn log_in_fails_with_wrong_password() {
        let app = get_test_app();
        register_test_user(&app.server, "alice@example.com").await;

        let response = app
            .server
            .post(endpoints::LOG_IN)
            .json(&json!({ "email": "alice@example.com", "password": "wrongpassword" }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        response.assert_json(&json!({ "error": "invalid credentials" }));
    }

    #[tokio::test]
    async fn log_in_fails_with_unknown_email() {
        let app = get_test_app();

        app.server
            .post(endpoints::LOG_IN)
            .json(&json!({ "email": "nobody@example.com", "password": TEST_PASSWORD }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn log_in_fails_for_inactive_user() {
        let app = get_test_app();
        let cookie = register_test_user(&app.server, "alice@example.com").await;
        let user = app
            .server
            .get(endpoints::AUTH_ME)
            .add_cookie(cookie)
            .await
            .json::<User>();
        deactivate_user(user.id, &app.state.db_connection.lock().unwrap()).unwrap();

        app.server
            .post(endpoints::LOG_IN)
            .json(&json!({ "email": "alice@example.com", "password": TEST_PASSWORD }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn log_out_clears_cookies() {
        let app = get_test_app();

        let response = app.server.post(endpoints::LOG_OUT).await;

        response.assert_status_ok();
        assert_eq!(response.cookie(COOKIE_ACCESS_TOKEN).value(), "");
        assert_eq!(response.cookie(COOKIE_REFRESH_TOKEN).value(), "");
    }

    #[tokio::test]
    async fn refresh_issues_new_cookies() {
        let app = get_test_app();
        register_test_user(&app.server, "alice@example.com").await;
        let log_in_response = app
            .server
            .post(endpoints::LOG_IN)
            .json(&json!({ "email": "alice@example.com", "password": TEST_PASSWORD }))
            .await;
        let refresh_cookie = log_in_response.cookie(COOKIE_REFRESH_TOKEN);

        let response = app
            .server
            .post(endpoints::REFRESH)
            .add_cookie(refresh_cookie)
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<User>().email, "alice@example.com");
        let access_cookie = response.cookie(COOKIE_ACCESS_TOKEN);
        app.server
            .get(endpoints::AUTH_ME)
            .add_cookie(access_cookie)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let app = get_test_app();
        let access_cookie = register_test_user(&app.server, "alice@example.com").await;

        app.server
            .post(endpoints::REFRESH)
            .add_cookie(axum_extra::extract::cookie::Cookie::new(
                COOKIE_REFRESH_TOKEN,
                access_cookie.value().to_owned(),
            ))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_fails_without_cookie() {
        let app = get_test_app();

        app.server
            .post(endpoints::REFRESH)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_requires_authentication() {
        let app = get_test_app();

        app.server
            .get(endpoints::AUTH_ME)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
