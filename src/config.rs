//! Settings for issuing tokens and auth cookies.

use std::fmt::Debug;

use axum_extra::extract::cookie::SameSite;
use jsonwebtoken::{DecodingKey, EncodingKey};
use time::Duration;

/// The default lifetime of an access token.
pub const DEFAULT_ACCESS_TOKEN_DURATION: Duration = Duration::minutes(60);
/// The default lifetime of a refresh token.
pub const DEFAULT_REFRESH_TOKEN_DURATION: Duration = Duration::days(7);
/// The default lifetime of password reset tokens and email verification codes.
pub const DEFAULT_RESET_TOKEN_DURATION: Duration = Duration::minutes(15);

#[derive(Clone)]
struct JwtKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
        }
    }
}

impl Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtKeys { .. }")
    }
}

/// Attributes shared by every auth cookie.
#[derive(Debug, Clone, Copy)]
pub struct CookieConfig {
    /// Only send the cookies over HTTPS.
    pub secure: bool,
    /// The `SameSite` attribute of the cookies.
    pub same_site: SameSite,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: false,
            same_site: SameSite::Lax,
        }
    }
}

/// The config for authentication: token keys, token lifetimes, cookie attributes and CSRF checks.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    access_keys: JwtKeys,
    refresh_keys: JwtKeys,
    /// How long an access token is valid.
    pub access_token_duration: Duration,
    /// How long a refresh token is valid.
    pub refresh_token_duration: Duration,
    /// How long a password reset token or email verification code is valid.
    pub reset_token_duration: Duration,
    /// Attributes for the auth cookies.
    pub cookie: CookieConfig,
    /// Require the CSRF header on state-changing requests.
    pub csrf_enforce: bool,
    /// The bcrypt cost used when hashing new passwords.
    pub password_hash_cost: u32,
}

impl AuthConfig {
    /// Create a config that signs access tokens with `access_secret` and refresh tokens with
    /// `refresh_secret`, using the default lifetimes.
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        Self {
            access_keys: JwtKeys::from_secret(access_secret),
            refresh_keys: JwtKeys::from_secret(refresh_secret),
            access_token_duration: DEFAULT_ACCESS_TOKEN_DURATION,
            refresh_token_duration: DEFAULT_REFRESH_TOKEN_DURATION,
            reset_token_duration: DEFAULT_RESET_TOKEN_DURATION,
            cookie: CookieConfig::default(),
            csrf_enforce: false,
            password_hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// The encoding key for access tokens.
    pub fn access_encoding_key(&self) -> &EncodingKey {
        &self.access_keys.encoding_key
    }

    /// The decoding key for access tokens.
    pub fn access_decoding_key(&self) -> &DecodingKey {
        &self.access_keys.decoding_key
    }

    /// The encoding key for refresh tokens.
    pub fn refresh_encoding_key(&self) -> &EncodingKey {
        &self.refresh_keys.encoding_key
    }

    /// The decoding key for refresh tokens.
    pub fn refresh_decoding_key(&self) -> &DecodingKey {
        &self.refresh_keys.decoding_key
    }
}
