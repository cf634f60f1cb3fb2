//! HTTP handlers and the helpers they share.
//!
//! Every `/api` response uses the same JSON envelope:
//! `{"status": "success" | "error", "message": ..., "data": ...}`.

pub mod food_records;
pub mod health;
pub mod profile;
pub mod user_login;
pub mod user_register;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use crate::auth::MAX_PASSWORD_BYTES;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Documented shape of every failure body (`status` is always `"error"`).
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorEnvelope {
    pub status: String,
    pub message: String,
}

pub fn success<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    let body = Envelope {
        status: "success",
        message: message.to_string(),
        data: Some(data),
    };
    (status, Json(body)).into_response()
}

pub fn failure(status: StatusCode, message: &str) -> Response {
    let body: Envelope<()> = Envelope {
        status: "error",
        message: message.to_string(),
        data: None,
    };
    (status, Json(body)).into_response()
}

pub fn internal_error() -> Response {
    failure(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
}

/// Lightweight email sanity check.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Length in characters, bounded above by what bcrypt can hash.
pub fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH && password.len() <= MAX_PASSWORD_BYTES
}

/// `YYYY-MM-DD` naming a real calendar day.
pub fn valid_date(date: &str) -> bool {
    let Ok(re) = Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$") else {
        return false;
    };
    let Some(caps) = re.captures(date) else {
        return false;
    };
    let (Ok(year), Ok(month), Ok(day)) = (
        caps[1].parse::<u32>(),
        caps[2].parse::<u32>(),
        caps[3].parse::<u32>(),
    ) else {
        return false;
    };

    year > 0 && day >= 1 && day <= days_in_month(year, month)
}

/// `YYYY-MM` with a month between 01 and 12.
pub fn valid_month(month: &str) -> bool {
    let Ok(re) = Regex::new(r"^(\d{4})-(\d{2})$") else {
        return false;
    };
    re.captures(month)
        .and_then(|caps| caps[2].parse::<u32>().ok())
        .is_some_and(|m| (1..=12).contains(&m))
}

const fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
        2 => 28,
        _ => 0,
    }
}
