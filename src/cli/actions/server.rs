use crate::{
    api,
    auth::{PasswordHasher, TokenAuthority},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use tracing::{debug, warn};

// HS256 keys shorter than the hash output weaken the MAC.
const RECOMMENDED_SECRET_BYTES: usize = 32;

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub bcrypt_cost: u32,
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &"***")
            .field("jwt_secret", &"***")
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if the signing secret is unusable, the database is
/// unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    if args.jwt_secret.expose_secret().len() < RECOMMENDED_SECRET_BYTES {
        warn!(
            "JWT secret is shorter than {} bytes; use a longer random value in production",
            RECOMMENDED_SECRET_BYTES
        );
    }

    let authority =
        TokenAuthority::new(&args.jwt_secret).context("Failed to initialize token authority")?;

    api::new(
        args.port,
        &args.dsn,
        authority,
        PasswordHasher::new(args.bcrypt_cost),
    )
    .await
}
