//! Defines functions for setting and clearing the auth cookies.
//!
//! Three cookies are used:
//! - the access token, sent with every request,
//! - the refresh token, only sent to the refresh endpoint,
//! - the CSRF token, readable by scripts so that it can be echoed in a header.

use axum_extra::extract::{CookieJar, cookie::Cookie};
use cookie::CookieBuilder;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    Error, UserID,
    auth::token::{create_access_token, create_refresh_token},
    config::{AuthConfig, CookieConfig},
    endpoints,
};

/// The name of the cookie holding the access token.
pub const COOKIE_ACCESS_TOKEN: &str = "access_token";
/// The name of the cookie holding the refresh token.
pub const COOKIE_REFRESH_TOKEN: &str = "refresh_token";
/// The name of the cookie holding the CSRF token.
pub const COOKIE_CSRF_TOKEN: &str = "XSRF-TOKEN";

fn build_cookie(
    name: &'static str,
    value: String,
    path: &'static str,
    max_age: Duration,
    http_only: bool,
    config: CookieConfig,
) -> CookieBuilder<'static> {
    Cookie::build((name, value))
        .path(path)
        .max_age(max_age)
        .expires(OffsetDateTime::now_utc() + max_age)
        .http_only(http_only)
        .secure(config.secure)
        .same_site(config.same_site)
}

fn build_removal_cookie(
    name: &'static str,
    path: &'static str,
    http_only: bool,
    config: CookieConfig,
) -> CookieBuilder<'static> {
    Cookie::build((name, ""))
        .path(path)
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .http_only(http_only)
        .secure(config.secure)
        .same_site(config.same_site)
}

/// Issue a fresh access token, refresh token and CSRF token for `user_id` and add them to `jar`.
///
/// # Errors
///
/// Returns [Error::TokenError] if a token could not be signed.
pub fn set_auth_cookies(
    jar: CookieJar,
    user_id: UserID,
    config: &AuthConfig,
) -> Result<CookieJar, Error> {
    let access_token = create_access_token(user_id, config)?;
    let refresh_token = create_refresh_token(user_id, config)?;
    let csrf_token = Uuid::new_v4().simple().to_string();

    Ok(jar
        .add(build_cookie(
            COOKIE_ACCESS_TOKEN,
            access_token,
            "/",
            config.access_token_duration,
            true,
            config.cookie,
        ))
        .add(build_cookie(
            COOKIE_REFRESH_TOKEN,
            refresh_token,
            endpoints::REFRESH,
            config.refresh_token_duration,
            true,
            config.cookie,
        ))
        .add(build_cookie(
            COOKIE_CSRF_TOKEN,
            csrf_token,
            "/",
            config.refresh_token_duration,
            false,
            config.cookie,
        )))
}

/// Set the auth cookies to empty values with a max age of zero, which should delete them on the
/// client side.
pub fn invalidate_auth_cookies(jar: CookieJar, config: &AuthConfig) -> CookieJar {
    jar.add(build_removal_cookie(
        COOKIE_ACCESS_TOKEN,
        "/",
        true,
        config.cookie,
    ))
    .add(build_removal_cookie(
        COOKIE_REFRESH_TOKEN,
        endpoints::REFRESH,
        true,
        config.cookie,
    ))
    .add(build_removal_cookie(
        COOKIE_CSRF_TOKEN,
        "/",
        false,
        config.cookie,
    ))
}

#[cfg(test)]
mod cookie_tests {
    use axum_extra::extract::CookieJar;
    use time::Duration;

    use crate::{
        AuthConfig, UserID,
        auth::token::{decode_access_token, decode_refresh_token},
        endpoints,
    };

    use super::{
        COOKIE_ACCESS_TOKEN, COOKIE_CSRF_TOKEN, COOKIE_REFRESH_TOKEN, invalidate_auth_cookies,
        set_auth_cookies,
    };

    fn get_config() -> AuthConfig {
        AuthConfig::new("access-secret", "refresh-secret")
    }

    #[test]
    fn set_auth_cookies_adds_all_cookies() {
        let config = get_config();
        let user_id = UserID::new(3);

        let jar = set_auth_cookies(CookieJar::new(), user_id, &config).unwrap();

        let access_cookie = jar.get(COOKIE_ACCESS_TOKEN).unwrap();
        let claims = decode_access_token(access_cookie.value(), &config).unwrap();
        assert_eq!(claims.user_id(), user_id);
        assert_eq!(access_cookie.http_only(), Some(true));
        assert_eq!(access_cookie.path(), Some("/"));

        let refresh_cookie = jar.get(COOKIE_REFRESH_TOKEN).unwrap();
        assert!(decode_refresh_token(refresh_cookie.value(), &config).is_ok());
        assert_eq!(refresh_cookie.path(), Some(endpoints::REFRESH));

        let csrf_cookie = jar.get(COOKIE_CSRF_TOKEN).unwrap();
        assert_eq!(csrf_cookie.value().len(), 32);
        assert_eq!(csrf_cookie.http_only(), Some(false));
    }

    #[test]
    fn invalidate_auth_cookies_clears_values() {
        let config = get_config();
        let jar = set_auth_cookies(CookieJar::new(), UserID::new(1), &config).unwrap();

        let jar = invalidate_auth_cookies(jar, &config);

        for name in [COOKIE_ACCESS_TOKEN, COOKIE_REFRESH_TOKEN, COOKIE_CSRF_TOKEN] {
            let cookie = jar.get(name).unwrap();
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        }
    }
}
