//! Authentication middleware that validates the access token and rejects inactive users.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    extract::CookieJar,
    headers::{Authorization, HeaderMapExt, authorization::Bearer},
};
use rusqlite::Connection;

use crate::{
    AppState, Error, UserID,
    auth::{cookie::COOKIE_ACCESS_TOKEN, token::decode_access_token},
    config::AuthConfig,
    user::get_user_by_id,
};

/// The state needed for the auth middleware and the auth endpoints.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Keys, lifetimes and cookie settings for authentication.
    pub auth_config: AuthConfig,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            auth_config: state.auth_config.clone(),
        }
    }
}

/// Get the access token from the `Authorization: Bearer` header, falling back to the access
/// token cookie.
///
/// The cookie value may carry a "Bearer " prefix.
fn get_access_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_owned());
    }

    jar.get(COOKIE_ACCESS_TOKEN)
        .map(|cookie| cookie.value_trimmed())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).to_owned())
        .filter(|token| !token.is_empty())
}

/// Resolve the active user that an access token was issued to.
///
/// # Errors
///
/// Returns [Error::Unauthenticated] if the token is invalid or the user is unknown or
/// deactivated.
pub(crate) fn authenticate(
    token: &str,
    state: &AuthState,
) -> Result<UserID, Error> {
    let user_id = decode_access_token(token, &state.auth_config)?.user_id();
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    match get_user_by_id(user_id, &connection) {
        Ok(user) if user.is_active => Ok(user.id),
        Ok(_) | Err(Error::NotFound) => Err(Error::Unauthenticated),
        Err(error) => Err(error),
    }
}

/// Middleware function that checks for a valid access token.
///
/// The user ID is placed into the request and the request executed normally if the token is
/// valid, otherwise a 401 response is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>`
/// to receive the user ID.
pub async fn auth_guard(
    State(state): State<AuthState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = get_access_token(&jar, request.headers()) else {
        return Error::Unauthenticated.into_response();
    };

    let user_id = match authenticate(&token, &state) {
        Ok(user_id) => user_id,
        Err(error) => return error.into_response(),
    };

    request.extensions_mut().insert(user_id);
    next.run(request).await
}

#[cfg(test)]
mod auth_guard_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Router, http::StatusCode, middleware, routing::get};
    use axum_extra::extract::cookie::Cookie;
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{
        AuthConfig, NewUser, UserID,
        auth::{cookie::COOKIE_ACCESS_TOKEN, token::create_access_token},
        db::initialize,
        user::{create_user, deactivate_user},
    };

    use super::{AuthState, auth_guard};

    async fn handler(Extension(user_id): Extension<UserID>) -> String {
        user_id.to_string()
    }

    fn get_test_state() -> (AuthState, UserID) {
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

        let state = AuthState {
            db_connection: Arc::new(Mutex::new(connection)),
            auth_config: AuthConfig::new("access-secret", "refresh-secret"),
        };

        (state, user.id)
    }

    fn get_test_server(state: AuthState) -> TestServer {
        let app = Router::new()
            .route("/protected", get(handler))
            .layer(middleware::from_fn_with_state(state.clone(), auth_guard))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn accepts_access_token_cookie() {
        let (state, user_id) = get_test_state();
        let token = create_access_token(user_id, &state.auth_config).unwrap();
        let server = get_test_server(state);

        let response = server
            .get("/protected")
            .add_cookie(Cookie::new(COOKIE_ACCESS_TOKEN, token))
            .await;

        response.assert_status_ok();
        response.assert_text(user_id.to_string());
    }

    #[tokio::test]
    async fn accepts_cookie_with_bearer_prefix() {
        let (state, user_id) = get_test_state();
        let token = create_access_token(user_id, &state.auth_config).unwrap();
        let server = get_test_server(state);

        let response = server
            .get("/protected")
            .add_cookie(Cookie::new(COOKIE_ACCESS_TOKEN, format!("Bearer {token}")))
            .await;

        response.assert_status_ok();
    }

    #[tokio::test]
    async fn accepts_bearer_header() {
        let (state, user_id) = get_test_state();
        let token = create_access_token(user_id, &state.auth_config).unwrap();
        let server = get_test_server(state);

        let response = server
            .get("/protected")
            .add_header("authorization", format!("Bearer {token}"))
            .await;

        response.assert_status_ok();
    }

    #[tokio::test]
    async fn rejects_missing_token() {
        let (state, _) = get_test_state();
        let server = get_test_server(state);

        server
            .get("/protected")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_garbage_token() {
        let (state, _) = get_test_state();
        let server = get_test_server(state);

        server
            .get("/protected")
            .add_cookie(Cookie::new(COOKIE_ACCESS_TOKEN, "not-a-jwt"))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_deactivated_user() {
        let (state, user_id) = get_test_state();
        let token = create_access_token(user_id, &state.auth_config).unwrap();
        deactivate_user(user_id, &state.db_connection.lock().unwrap()).unwrap();
        let server = get_test_server(state);

        server
            .get("/protected")
            .add_cookie(Cookie::new(COOKIE_ACCESS_TOKEN, token))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
