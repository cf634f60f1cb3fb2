//! Stateless bearer tokens.
//!
//! Tokens are compact HS256 JWS strings (`header.payload.signature`) carrying
//! `{user_id, username, iat, exp}`. The server keeps no session state; a token
//! is valid from issuance until `exp` and cannot be revoked.
//!
//! # Invariants
//! - Only HS256 is accepted. The algorithm comes from the authority, never from
//!   the token header.
//! - A token is expired once the current time reaches `exp`.
//! - Verification checks structure, then signature, then expiry.

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;

/// Lifetime of every issued token: 24 hours.
pub const TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims embedded in every token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret must not be empty")]
    EmptySecret,
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Mints and verifies tokens with one process-wide HMAC secret.
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("algorithm", &SIGNING_ALGORITHM)
            .field("secret", &"***")
            .finish()
    }
}

impl TokenAuthority {
    /// Build an authority around the signing secret.
    ///
    /// # Errors
    /// Returns [`TokenError::EmptySecret`] if the secret is empty.
    pub fn new(secret: &SecretString) -> Result<Self, TokenError> {
        let secret = secret.expose_secret().as_bytes();
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        // Expiry is checked in verify_at against the caller's clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Issue a token for `user_id`/`username`, valid for [`TOKEN_TTL_SECONDS`].
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] only on an internal signing failure.
    pub fn issue(&self, user_id: i64, username: &str) -> Result<String, TokenError> {
        self.issue_at(user_id, username, unix_now())
    }

    /// Issue a token as if the current time were `now` (unix seconds).
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] only on an internal signing failure.
    pub fn issue_at(&self, user_id: i64, username: &str, now: i64) -> Result<String, TokenError> {
        let claims = Claims {
            user_id,
            username: username.to_string(),
            iat: now,
            exp: now.saturating_add(TOKEN_TTL_SECONDS),
        };

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Verify a token against the current time.
    ///
    /// # Errors
    /// See [`TokenAuthority::verify_at`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// Verify a token as if the current time were `now` (unix seconds).
    ///
    /// # Errors
    /// - [`TokenError::Malformed`] if the token does not parse into the expected shape.
    /// - [`TokenError::BadSignature`] if the signature does not match or the
    ///   header names an algorithm other than HS256.
    /// - [`TokenError::Expired`] if `now >= exp`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(map_jwt_error)?
            .claims;

        if now >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

fn map_jwt_error(error: jsonwebtoken::errors::Error) -> TokenError {
    match error.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::BadSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}
