use super::{failure, internal_error, success, ErrorEnvelope};
use crate::{
    api::storage::UserStore,
    auth::{credential, PasswordHasher, TokenAuthority},
};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument, warn};
use utoipa::ToSchema;

pub const LOGIN_FAILED_MESSAGE: &str = "invalid username or password";

#[derive(ToSchema, Deserialize)]
pub struct UserLogin {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct LoginSession {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

#[utoipa::path(
    post,
    path= "/api/login",
    request_body = UserLogin,
    responses (
        (status = 200, description = "Login successful, returns a bearer token valid for 24 hours", body = LoginSession),
        (status = 400, description = "Missing or invalid payload", body = ErrorEnvelope),
        (status = 401, description = "Invalid username or password", body = ErrorEnvelope),
    ),
    tag= "login"
)]
#[instrument(skip(users, authority, hasher, payload))]
pub async fn login(
    users: Extension<Arc<dyn UserStore>>,
    authority: Extension<Arc<TokenAuthority>>,
    hasher: Extension<PasswordHasher>,
    payload: Option<Json<UserLogin>>,
) -> impl IntoResponse {
    let login: UserLogin = match payload {
        Some(Json(payload)) => payload,
        None => return failure(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let username = login.username.trim();
    if username.is_empty() || login.password.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "Missing username or password");
    }

    let user = match users.find_by_username(username).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            // Spend the same bcrypt work as a wrong password would.
            let decoy = hasher.decoy();
            let password = login.password;
            if let Err(e) =
                tokio::task::spawn_blocking(move || credential::verify(&password, &decoy)).await
            {
                error!("Password verification task failed: {}", e);
            }
            warn!("Login failed: unknown user");
            return failure(StatusCode::UNAUTHORIZED, LOGIN_FAILED_MESSAGE);
        }
        Err(e) => {
            error!("Error fetching user: {:?}", e);
            return internal_error();
        }
    };

    // bcrypt is CPU-bound
    let stored = user.credential();
    let password = login.password;
    match tokio::task::spawn_blocking(move || credential::verify(&password, &stored)).await {
        Ok(Ok(true)) => (),
        Ok(Ok(false)) => {
            warn!("Login failed: password mismatch");
            return failure(StatusCode::UNAUTHORIZED, LOGIN_FAILED_MESSAGE);
        }
        Ok(Err(e)) => {
            error!("Login failed: stored credential unusable: {}", e);
            return failure(StatusCode::UNAUTHORIZED, LOGIN_FAILED_MESSAGE);
        }
        Err(e) => {
            error!("Password verification task failed: {}", e);
            return internal_error();
        }
    }

    match authority.issue(user.id, &user.username) {
        Ok(token) => success(
            StatusCode::OK,
            "Login successful",
            LoginSession {
                token,
                user_id: user.id,
                username: user.username,
                email: user.email,
            },
        ),
        Err(e) => {
            error!("Error issuing token: {}", e);
            internal_error()
        }
    }
}
