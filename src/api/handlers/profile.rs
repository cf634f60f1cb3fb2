use super::{failure, internal_error, success, user_register::RegisteredUser, ErrorEnvelope};
use crate::{api::storage::UserStore, auth::Identity};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use tracing::error;

#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Return the authenticated user profile.", body = RegisteredUser),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorEnvelope),
        (status = 404, description = "The account no longer exists.", body = ErrorEnvelope),
    ),
    security(("bearer" = [])),
    tag = "profile"
)]
pub async fn profile(
    Extension(identity): Extension<Identity>,
    users: Extension<Arc<dyn UserStore>>,
) -> impl IntoResponse {
    match users.find_by_id(identity.user_id).await {
        Ok(Some(user)) => success(
            StatusCode::OK,
            "Profile",
            RegisteredUser {
                user_id: user.id,
                username: user.username,
                email: user.email,
            },
        ),
        Ok(None) => failure(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to fetch profile: {err}");
            internal_error()
        }
    }
}
