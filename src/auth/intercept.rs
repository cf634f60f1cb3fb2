//! Bearer interception for protected operations.
//!
//! Flow: take the raw `Authorization` header value, strip the `Bearer ` prefix,
//! verify the token and hand the resulting [`Identity`] to the protected
//! operation. Any rejection stops the flow before the operation runs.

use super::{
    token::{TokenAuthority, TokenError},
    Identity,
};
use thiserror::Error;

pub const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingCredential,
    #[error("authorization header is not a bearer credential")]
    MalformedCredential,
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Extract the token from an `Authorization` header value.
///
/// # Errors
/// [`AuthError::MissingCredential`] when the header is absent or empty,
/// [`AuthError::MalformedCredential`] when it lacks the `Bearer ` prefix.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MissingCredential)?;

    header
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::MalformedCredential)
}

/// Resolve an `Authorization` header value into the caller's identity.
///
/// # Errors
/// Any [`AuthError`]; token failures are wrapped as [`AuthError::Token`].
pub fn authenticate(
    authority: &TokenAuthority,
    header: Option<&str>,
) -> Result<Identity, AuthError> {
    let token = bearer_token(header)?;
    let claims = authority.verify(token)?;
    Ok(claims.into())
}

/// Run `proceed` with the caller's identity, or reject without running it.
///
/// # Errors
/// Returns the rejection from [`authenticate`]; `proceed` is not called.
pub fn intercept<T, F>(
    authority: &TokenAuthority,
    header: Option<&str>,
    proceed: F,
) -> Result<T, AuthError>
where
    F: FnOnce(Identity) -> T,
{
    authenticate(authority, header).map(proceed)
}
