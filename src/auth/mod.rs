//! Registration, log-in and the guards that protect the API.
//!
//! Authentication uses a short-lived access token and a long-lived refresh token, both JSON
//! Web Tokens carried in HttpOnly cookies.

mod cookie;
mod csrf;
mod email_verification;
mod log_in;
mod middleware;
mod password_reset;
mod register;
mod token;

pub use cookie::{
    COOKIE_ACCESS_TOKEN, COOKIE_CSRF_TOKEN, COOKIE_REFRESH_TOKEN, invalidate_auth_cookies,
    set_auth_cookies,
};
pub use csrf::{CSRF_HEADER, csrf_guard};
pub use email_verification::{
    create_verification_code_table, send_verification_code, verify_email,
};
pub use log_in::{get_me, post_log_in, post_log_out, post_refresh};
pub use middleware::{AuthState, auth_guard};
pub use password_reset::{create_password_reset_token_table, forgot_password, reset_password};
pub use register::{check_email, register_user, validate_password};
