//! Double-submit CSRF protection: state-changing requests must echo the CSRF cookie in a header.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use crate::{
    Error,
    auth::{cookie::COOKIE_CSRF_TOKEN, middleware::AuthState},
};

/// The header that must carry the value of the CSRF cookie.
pub const CSRF_HEADER: &str = "x-csrf-token";

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Reject state-changing requests whose CSRF header does not match the CSRF cookie.
///
/// Does nothing unless CSRF enforcement is switched on in the auth config.
pub async fn csrf_guard(
    State(state): State<AuthState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    if !state.auth_config.csrf_enforce || is_safe_method(request.method()) {
        return next.run(request).await;
    }

    let cookie_token = jar.get(COOKIE_CSRF_TOKEN).map(|cookie| cookie.value().to_owned());
    let header_token = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok());

    let is_valid = match (cookie_token, header_token) {
        (Some(cookie_token), Some(header_token)) => {
            !cookie_token.is_empty() && cookie_token == header_token
        }
        _ => false,
    };

    if !is_valid {
        tracing::debug!(
            "Rejected {} {}: CSRF token mismatch",
            request.method(),
            request.uri()
        );
        return Error::CsrfMismatch.into_response();
    }

    next.run(request).await
}
