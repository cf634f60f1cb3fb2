//! Authentication settings: token signing secret and password work factor.

use anyhow::{anyhow, Context, Result};
use clap::{Arg, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_BCRYPT_COST: &str = "bcrypt-cost";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign and verify session tokens (HS256)")
                .long_help(
                    "Secret used to sign and verify session tokens (HS256). Every instance that verifies tokens issued by another must share the same value.",
                )
                .env("FOODLOG_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_BCRYPT_COST)
                .long(ARG_BCRYPT_COST)
                .help("bcrypt work factor for password hashing")
                .env("FOODLOG_BCRYPT_COST")
                .default_value("14")
                .value_parser(clap::value_parser!(u32).range(4..=31)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub bcrypt_cost: u32,
}

impl Options {
    /// # Errors
    /// Returns an error if the signing secret is missing or empty.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .context("missing required argument: --jwt-secret")?;

        if jwt_secret.is_empty() {
            return Err(anyhow!("--jwt-secret must not be empty"));
        }

        Ok(Self {
            jwt_secret: SecretString::from(jwt_secret),
            bcrypt_cost: matches
                .get_one::<u32>(ARG_BCRYPT_COST)
                .copied()
                .unwrap_or(crate::auth::credential::DEFAULT_COST),
        })
    }
}
