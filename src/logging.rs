//! Middleware for logging requests and responses.

use axum::{
    body::Body,
    extract::Request,
    http::{StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// The number of characters of a body that are logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

const REDACTED: &str = "********";

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] characters, it is
/// truncated and the full body is logged at the `debug` level.
/// Passwords, tokens and codes in JSON bodies are redacted.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read request body: {error}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|content_type| content_type.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("application/json"));
    let body_text = String::from_utf8_lossy(&body_bytes);
    let display_text = if is_json {
        redact_json(&body_text)
    } else {
        body_text.to_string()
    };
    log_body("Received request", &format!("{parts:#?}"), &display_text);

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    log_body(
        "Sending response",
        &format!("{parts:#?}"),
        &String::from_utf8_lossy(&body_bytes),
    );

    Response::from_parts(parts, Body::from(body_bytes))
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_lowercase();

    key.contains("password") || key == "token" || key == "code"
}

fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                if is_secret_key(key) {
                    *value = Value::String(REDACTED.to_owned());
                } else {
                    redact_value(value);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        _ => {}
    }
}

/// Replace the values of password, token and code fields in a JSON document.
///
/// Text that is not valid JSON is returned unchanged.
fn redact_json(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(mut value) => {
            redact_value(&mut value);
            value.to_string()
        }
        Err(_) => text.to_owned(),
    }
}

fn log_body(message: &str, headers: &str, body: &str) {
    if body.chars().count() > LOG_BODY_LENGTH_LIMIT {
        let truncated: String = body.chars().take(LOG_BODY_LENGTH_LIMIT).collect();
        tracing::info!("{message}: {headers}\nbody: {truncated}...");
        tracing::debug!("Full body: {body:?}");
    } else {
        tracing::info!("{message}: {headers}\nbody: {body:?}");
    }
}

#[cfg(test)]
mod logging_tests {
    use axum::{Json, Router, middleware, routing::post};
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::logging::{logging_middleware, redact_json};

    #[test]
    fn redacts_password_fields() {
        let text = r#"{"email":"a@example.com","password":"hunter2","confirm_password":"hunter2"}"#;

        let redacted: Value = serde_json::from_str(&redact_json(text)).unwrap();

        assert_eq!(
            redacted,
            json!({
                "email": "a@example.com",
                "password": "********",
                "confirm_password": "********",
            })
        );
    }

    #[test]
    fn redacts_nested_tokens() {
        let text = r#"{"reset":{"token":"abc","new_password":"x"},"code":"123456"}"#;

        let redacted: Value = serde_json::from_str(&redact_json(text)).unwrap();

        assert_eq!(redacted["reset"]["token"], json!("********"));
        assert_eq!(redacted["reset"]["new_password"], json!("********"));
        assert_eq!(redacted["code"], json!("********"));
    }

    #[test]
    fn leaves_other_text_alone() {
        assert_eq!(redact_json("password=hunter2"), "password=hunter2");
    }

    #[tokio::test]
    async fn passes_bodies_through() {
        let app = Router::new()
            .route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
            .layer(middleware::from_fn(logging_middleware));
        let server = TestServer::try_new(app).unwrap();
        let body = json!({ "password": "hunter2", "note": "é".repeat(100) });

        let response = server.post("/echo").json(&body).await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), body);
    }
}
