#![allow(missing_docs)]

use std::sync::Arc;

use axum_extra::extract::cookie::Cookie;
use axum_test::TestServer;
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppState, AuthConfig, auth::COOKIE_ACCESS_TOKEN, build_router, mail::RecordingMailer,
};

/// A password that passes the strength check.
pub const TEST_PASSWORD: &str = "roostersgocockledoodledoo";

/// A server over an in-memory database plus handles to its state.
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
}

fn build_test_app(csrf_enforce: bool) -> TestApp {
    let connection = Connection::open_in_memory().expect("Could not open database in memory.");
    let mut auth_config = AuthConfig::new("access-secret", "refresh-secret");
    auth_config.password_hash_cost = 4;
    auth_config.csrf_enforce = csrf_enforce;
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::new(connection, auth_config, "Etc/UTC", mailer.clone())
        .expect("Could not create app state.");
    let server =
        TestServer::try_new(build_router(state.clone())).expect("Could not create test server.");

    TestApp {
        server,
        state,
        mailer,
    }
}

/// A test app that skips CSRF checks.
pub fn get_test_app() -> TestApp {
    build_test_app(false)
}

/// A test app that rejects state-changing requests without a matching CSRF header.
pub fn get_test_app_with_csrf() -> TestApp {
    build_test_app(true)
}

/// Register a user with [TEST_PASSWORD] and return their access token cookie.
pub async fn register_test_user(server: &TestServer, email: &str) -> Cookie<'static> {
    let response = server
        .post(crate::endpoints::REGISTER)
        .json(&json!({
            "first_name": "Test",
            "last_name": "User",
            "email": email,
            "password": TEST_PASSWORD,
        }))
        .await;

    response.assert_status(axum::http::StatusCode::CREATED);

    response.cookie(COOKIE_ACCESS_TOKEN)
}
