//! # Foodlog (personal food diary backend)
//!
//! `foodlog` serves account registration and login plus owner-scoped CRUD on
//! dated meal-log entries.
//!
//! ## Authentication
//!
//! Passwords are stored as bcrypt hashes (work factor 14 by default). A
//! successful login returns a stateless HS256 bearer token valid for 24 hours.
//! Protected routes pass through an interception stage that verifies the token
//! and attaches the caller's [`auth::Identity`] to the request.
//!
//! The signing secret is supplied at startup (`FOODLOG_JWT_SECRET`) and must be
//! identical on every instance that verifies tokens issued by another.
//!
//! There is no revocation: a token stays valid until it expires.

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
