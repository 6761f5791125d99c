//! Handlers for registering a new user and for the checks a registration form runs before
//! submitting.

use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Error, PasswordHash, User, ValidatedPassword,
    auth::{cookie::set_auth_cookies, middleware::AuthState},
    user::{NewUser, create_user, get_user_by_email, validate_email},
};

/// The data submitted to register a new user.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterForm {
    /// The user's given name.
    pub first_name: String,
    /// The user's family name.
    pub last_name: String,
    /// The email to log in with.
    pub email: String,
    /// The raw password, checked for strength before it is hashed.
    pub password: String,
}

/// Create a new user and log them in.
///
/// # Errors
///
/// Returns:
/// - [Error::TooWeak] if the password is too easy to guess,
/// - [Error::Validation] if a name or the email is invalid,
/// - [Error::DuplicateEmail] if the email is already registered.
pub async fn register_user(
    State(state): State<AuthState>,
    jar: CookieJar,
    Json(form): Json<RegisterForm>,
) -> Result<(StatusCode, CookieJar, Json<User>), Error> {
    let password_hash =
        PasswordHash::from_raw_password(&form.password, state.auth_config.password_hash_cost)?;

    let user = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        create_user(
            NewUser {
                first_name: form.first_name,
                last_name: form.last_name,
                email: form.email,
                password_hash: Some(password_hash),
            },
            &connection,
        )?
    };

    tracing::info!("Registered user {}", user.id);
    let jar = set_auth_cookies(jar, user.id, &state.auth_config)?;

    Ok((StatusCode::CREATED, jar, Json(user)))
}

/// The email address to check.
#[derive(Deserialize)]
pub struct CheckEmailRequest {
    email: String,
}

/// Report whether `email` is free to register.
///
/// # Errors
///
/// Returns [Error::Validation] if the email is not a valid address.
pub async fn check_email(
    State(state): State<AuthState>,
    Json(request): Json<CheckEmailRequest>,
) -> Result<Json<Value>, Error> {
    let email = validate_email(&request.email)?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let available = match get_user_by_email(&email, &connection) {
        Ok(_) => false,
        Err(Error::NotFound) => true,
        Err(error) => return Err(error),
    };

    Ok(Json(json!({ "available": available })))
}

/// The password to check.
#[derive(Deserialize)]
pub struct ValidatePasswordRequest {
    password: String,
}

/// The verdict on a password and, for a weak password, how to make it stronger.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct PasswordValidation {
    /// Whether the password is strong enough.
    pub valid: bool,
    /// Suggestions for a stronger password.
    pub feedback: Option<String>,
}

/// Check the strength of a password without storing it.
pub async fn validate_password(
    Json(request): Json<ValidatePasswordRequest>,
) -> Json<PasswordValidation> {
    let validation = match ValidatedPassword::new(&request.password) {
        Ok(_) => PasswordValidation {
            valid: true,
            feedback: None,
        },
        Err(Error::TooWeak(feedback)) => PasswordValidation {
            valid: false,
            feedback: Some(feedback),
        },
        Err(error) => PasswordValidation {
            valid: false,
            feedback: Some(error.to_string()),
        },
    };

    Json(validation)
}

#[cfg(test)]
mod register_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        User,
        auth::cookie::COOKIE_ACCESS_TOKEN,
        endpoints,
        test_utils::{TEST_PASSWORD, get_test_app, register_test_user},
    };

    use super::PasswordValidation;

    #[tokio::test]
    async fn register_creates_user_and_sets_cookies() {
        let app = get_test_app();

        let response = app
            .server
            .post(endpoints::REGISTER)
            .json(&json!({
                "first_name": "Alice",
                "last_name": "Smith",
                "email": " Alice@Example.com",
                "password": TEST_PASSWORD,
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let user = response.json::<User>();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.provider, "email");
        assert!(user.is_active);
        assert!(!user.email_verified);
        assert!(!response.cookie(COOKIE_ACCESS_TOKEN).value().is_empty());
    }

    #[tokio::test]
    async fn register_response_omits_password_hash() {
        let app = get_test_app();

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

        let body = response.json::<serde_json::Value>();
        assert!(body.get("password_hash").is_none());
        assert!(body.get("password").is_none());
    }

    #[tokio::test]
    async fn register_rejects_weak_password() {
        let app = get_test_app();

        app.server
            .post(endpoints::REGISTER)
            .json(&json!({
                "first_name": "Alice",
                "last_name": "Smith",
                "email": "alice@example.com",
                "password": "password1234",
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let app = get_test_app();
        register_test_user(&app.server, "alice@example.com").await;

        app.server
            .post(endpoints::REGISTER)
            .json(&json!({
                "first_name": "Other",
                "last_name": "Alice",
                "email": "ALICE@example.com",
                "password": TEST_PASSWORD,
            }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn check_email_reports_availability() {
        let app = get_test_app();
        register_test_user(&app.server, "alice@example.com").await;

        app.server
            .post(endpoints::CHECK_EMAIL)
            .json(&json!({ "email": "alice@example.com" }))
            .await
            .assert_json(&json!({ "available": false }));
        app.server
            .post(endpoints::CHECK_EMAIL)
            .json(&json!({ "email": "bob@example.com" }))
            .await
            .assert_json(&json!({ "available": true }));
    }

    #[tokio::test]
    async fn check_email_rejects_invalid_address() {
        let app = get_test_app();

        app.server
            .post(endpoints::CHECK_EMAIL)
            .json(&json!({ "email": "not an email" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn validate_password_gives_feedback() {
        let app = get_test_app();

        let weak = app
            .server
            .post(endpoints::VALIDATE_PASSWORD)
            .json(&json!({ "password": "password" }))
            .await
            .json::<PasswordValidation>();
        let strong = app
            .server
            .post(endpoints::VALIDATE_PASSWORD)
            .json(&json!({ "password": TEST_PASSWORD }))
            .await
            .json::<PasswordValidation>();

        assert!(!weak.valid);
        assert!(weak.feedback.is_some());
        assert_eq!(
            strong,
            PasswordValidation {
                valid: true,
                feedback: None
            }
        );
    }
}
