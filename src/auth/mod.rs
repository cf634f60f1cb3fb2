//! Authentication core.
//!
//! - [`credential`]: bcrypt hashing and verification of account passwords.
//! - [`token`]: issuance and verification of HS256 bearer tokens.
//! - [`intercept`]: the bearer-extraction and verification stage placed in
//!   front of protected operations.
//!
//! Nothing here performs I/O or holds mutable state; the only shared value is
//! the immutable [`TokenAuthority`].

pub mod credential;
pub mod intercept;
pub mod token;

pub use credential::{Credential, CredentialError, PasswordHasher, MAX_PASSWORD_BYTES};
pub use intercept::{authenticate, bearer_token, intercept, AuthError, BEARER_PREFIX};
pub use token::{unix_now, Claims, TokenAuthority, TokenError, TOKEN_TTL_SECONDS};

/// Authenticated caller bound to a single request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
        }
    }
}
