//! Encodes and decodes the JSON Web Tokens carried by the auth cookies.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Error, UserID, config::AuthConfig};

/// Distinguishes short-lived access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Authorises API requests.
    Access,
    /// Can only be exchanged for a new pair of tokens.
    Refresh,
}

/// The contents of a JSON Web Token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The ID of the user the token was issued to.
    pub sub: i64,
    /// The expiry time of the token as a unix timestamp.
    pub exp: i64,
    /// The time the token was issued as a unix timestamp.
    pub iat: i64,
    /// Whether this is an access or refresh token.
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// A unique ID so that two tokens issued in the same second differ.
    pub jti: String,
}

impl Claims {
    fn new(
        user_id: UserID,
        token_type: TokenType,
        issued_at: OffsetDateTime,
        duration: Duration,
    ) -> Self {
        Self {
            sub: user_id.as_i64(),
            exp: (issued_at + duration).unix_timestamp(),
            iat: issued_at.unix_timestamp(),
            token_type,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// The user the token belongs to.
    pub fn user_id(&self) -> UserID {
        UserID::new(self.sub)
    }
}

fn encode_claims(claims: &Claims, key: &EncodingKey) -> Result<String, Error> {
    encode(&Header::new(Algorithm::HS256), claims, key)
        .map_err(|error| Error::TokenError(error.to_string()))
}

fn decode_claims(token: &str, key: &DecodingKey, want: TokenType) -> Result<Claims, Error> {
    let claims = decode::<Claims>(token, key, &Validation::new(Algorithm::HS256))
        .map_err(|error| {
            tracing::debug!("Rejected token: {error}");
            Error::Unauthenticated
        })?
        .claims;

    if claims.token_type != want {
        return Err(Error::Unauthenticated);
    }

    Ok(claims)
}

/// Issue an access token for `user_id` that expires after the configured access duration.
pub fn create_access_token(user_id: UserID, config: &AuthConfig) -> Result<String, Error> {
    let claims = Claims::new(
        user_id,
        TokenType::Access,
        OffsetDateTime::now_utc(),
        config.access_token_duration,
    );

    encode_claims(&claims, config.access_encoding_key())
}

/// Issue a refresh token for `user_id` that expires after the configured refresh duration.
pub fn create_refresh_token(user_id: UserID, config: &AuthConfig) -> Result<String, Error> {
    let claims = Claims::new(
        user_id,
        TokenType::Refresh,
        OffsetDateTime::now_utc(),
        config.refresh_token_duration,
    );

    encode_claims(&claims, config.refresh_encoding_key())
}

/// Check the signature, expiry and type of an access token.
///
/// # Errors
///
/// Returns [Error::Unauthenticated] if the token is invalid for any reason.
pub fn decode_access_token(token: &str, config: &AuthConfig) -> Result<Claims, Error> {
    decode_claims(token, config.access_decoding_key(), TokenType::Access)
}

/// Check the signature, expiry and type of a refresh token.
///
/// # Errors
///
/// Returns [Error::Unauthenticated] if the token is invalid for any reason.
pub fn decode_refresh_token(token: &str, config: &AuthConfig) -> Result<Claims, Error> {
    decode_claims(token, config.refresh_decoding_key(), TokenType::Refresh)
}
