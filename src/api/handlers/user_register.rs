use super::{
    failure, internal_error, normalize_email, success, valid_email, valid_password,
    ErrorEnvelope,
};
use crate::{
    api::storage::{NewUser, StoreError, UserStore},
    auth::{CredentialError, PasswordHasher},
};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
pub struct UserRegister {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

impl std::fmt::Debug for UserRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRegister")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct RegisteredUser {
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

#[utoipa::path(
    post,
    path= "/api/register",
    request_body = UserRegister,
    responses (
        (status = 201, description = "Registration successful", body = RegisteredUser, content_type = "application/json"),
        (status = 400, description = "Missing or invalid fields", body = ErrorEnvelope),
        (status = 409, description = "Username or email already registered", body = ErrorEnvelope),
        (status = 500, description = "Hashing or storage failure", body = ErrorEnvelope),
    ),
    tag= "register"
)]
#[instrument(skip(users, hasher, payload))]
pub async fn register(
    users: Extension<Arc<dyn UserStore>>,
    hasher: Extension<PasswordHasher>,
    payload: Option<Json<UserRegister>>,
) -> impl IntoResponse {
    let user: UserRegister = match payload {
        Some(Json(payload)) => payload,
        None => return failure(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    debug!("user: {:?}", user);
    let username = user.username.trim().to_string();
    let email = normalize_email(&user.email);

    if username.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "Invalid username");
    }

    if !valid_email(&email) {
        return failure(StatusCode::BAD_REQUEST, "Invalid email");
    }

    if !valid_password(&user.password) {
        return failure(StatusCode::BAD_REQUEST, "Invalid password");
    }

    match users.username_exists(&username).await {
        Ok(true) => return failure(StatusCode::CONFLICT, "Username already exists"),
        Ok(false) => (),
        Err(e) => {
            error!("Error checking if username exists: {:?}", e);
            return internal_error();
        }
    }

    match users.email_exists(&email).await {
        Ok(true) => return failure(StatusCode::CONFLICT, "Email already registered"),
        Ok(false) => (),
        Err(e) => {
            error!("Error checking if email exists: {:?}", e);
            return internal_error();
        }
    }

    // bcrypt is CPU-bound
    let hasher = *hasher;
    let password = user.password;
    let credential = match tokio::task::spawn_blocking(move || hasher.hash(&password)).await {
        Ok(Ok(credential)) => credential,
        Ok(Err(CredentialError::TooLong(_))) => {
            return failure(StatusCode::BAD_REQUEST, "Invalid password");
        }
        Ok(Err(e)) => {
            error!("Error hashing password: {}", e);
            return internal_error();
        }
        Err(e) => {
            error!("Password hashing task failed: {}", e);
            return internal_error();
        }
    };

    let new_user = NewUser {
        username,
        email,
        credential,
    };

    match users.insert(new_user).await {
        Ok(record) => success(
            StatusCode::CREATED,
            "User registered",
            RegisteredUser {
                user_id: record.id,
                username: record.username,
                email: record.email,
            },
        ),
        Err(StoreError::Conflict) => {
            failure(StatusCode::CONFLICT, "Username or email already registered")
        }
        Err(e) => {
            error!("Error inserting user: {:?}", e);
            internal_error()
        }
    }
}
