use super::handlers::failure;
use crate::auth::{intercept, AuthError, TokenAuthority};
use axum::{
    extract::{Extension, Request},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

pub const UNAUTHORIZED_MESSAGE: &str = "invalid or missing authentication token";

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        failure(StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE)
    }
}

/// Adapts [`intercept`] to axum: on success the caller's
/// [`Identity`](crate::auth::Identity) is attached to the request extensions
/// and the inner handler runs; otherwise the request ends here with `401`.
pub async fn require_auth(
    Extension(authority): Extension<Arc<TokenAuthority>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = match request
        .headers()
        .get(AUTHORIZATION)
        .map(HeaderValue::to_str)
        .transpose()
    {
        Ok(value) => value.map(str::to_owned),
        Err(_) => return reject(AuthError::MalformedCredential),
    };

    match intercept(&authority, header.as_deref(), move |identity| {
        request.extensions_mut().insert(identity);
        next.run(request)
    }) {
        Ok(proceed) => proceed.await,
        Err(err) => reject(err),
    }
}

fn reject(err: AuthError) -> Response {
    warn!("Rejected request: {}", err);
    err.into_response()
}
