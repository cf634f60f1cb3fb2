//! Password credentials.
//!
//! Plaintext passwords are turned into salted bcrypt hashes before they reach
//! storage. Hashes are opaque: callers store and hand them back, nothing else.

use std::fmt;
use thiserror::Error;

/// Work factor used when none is configured.
pub const DEFAULT_COST: u32 = 14;

/// Longest password bcrypt keys on in full. Only the implicit NUL terminator
/// falls outside the key at this length, as in every bcrypt implementation.
pub const MAX_PASSWORD_BYTES: usize = 72;

// Salt and digest of a well-formed hash; paired with the configured cost it
// makes a decoy that costs as much to check as a real credential.
const DECOY_SALT_AND_DIGEST: &str = "N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("password must not be empty")]
    EmptySecret,
    #[error("password is {0} bytes, longer than bcrypt can represent")]
    TooLong(usize),
    #[error("password hashing failed: {0}")]
    Hashing(#[source] bcrypt::BcryptError),
    #[error("stored credential is corrupt: {0}")]
    Corrupt(#[source] bcrypt::BcryptError),
}

/// Stored bcrypt hash of a password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a hash previously produced by [`PasswordHasher::hash`] and read back from storage.
    #[must_use]
    pub const fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Hashes passwords at a fixed bcrypt work factor.
#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: DEFAULT_COST,
        }
    }
}

impl PasswordHasher {
    #[must_use]
    pub const fn new(cost: u32) -> Self {
        Self { cost }
    }

    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password with a fresh random salt.
    ///
    /// # Errors
    /// Returns [`CredentialError::EmptySecret`] for an empty password,
    /// [`CredentialError::TooLong`] above [`MAX_PASSWORD_BYTES`] (never
    /// silently truncated) and [`CredentialError::Hashing`] when bcrypt fails.
    pub fn hash(&self, plaintext: &str) -> Result<Credential, CredentialError> {
        if plaintext.is_empty() {
            return Err(CredentialError::EmptySecret);
        }
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(CredentialError::TooLong(plaintext.len()));
        }

        bcrypt::hash(plaintext, self.cost)
            .map(Credential)
            .map_err(CredentialError::Hashing)
    }

    /// A credential no password matches, checked at this hasher's cost.
    ///
    /// Verifying against it when an account does not exist keeps that path as
    /// slow as a real mismatch.
    #[must_use]
    pub fn decoy(&self) -> Credential {
        Credential(format!("$2b${:02}${DECOY_SALT_AND_DIGEST}", self.cost))
    }
}

/// Check a plaintext password against a stored credential.
///
/// A wrong password is `Ok(false)`. Only an unparsable stored hash is an error,
/// and callers must treat it as a failed verification.
///
/// # Errors
/// Returns [`CredentialError::Corrupt`] if the stored hash cannot be parsed.
pub fn verify(plaintext: &str, credential: &Credential) -> Result<bool, CredentialError> {
    // Longer than bcrypt can represent, so it cannot be what was hashed.
    if plaintext.len() > MAX_PASSWORD_BYTES {
        return Ok(false);
    }

    bcrypt::verify(plaintext, credential.as_str()).map_err(CredentialError::Corrupt)
}
