//! Owner-scoped CRUD on meal-log entries.
//!
//! The caller's [`Identity`] comes from the bearer token; a record belonging
//! to another user answers exactly like a record that does not exist.

use super::{failure, internal_error, success, valid_date, valid_month, ErrorEnvelope};
use crate::{
    api::storage::{FoodRecord, FoodRecordFields, FoodRecordStore, RecordFilter},
    auth::Identity,
};
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::{IntoParams, ToSchema};

const NOT_FOUND_MESSAGE: &str = "Food record not found";

#[derive(ToSchema, Deserialize, Debug)]
pub struct FoodRecordPayload {
    /// Calendar day, `YYYY-MM-DD`.
    #[serde(default)]
    date: String,
    #[serde(default)]
    meal_type: String,
    #[serde(default)]
    food_items: String,
    #[serde(default)]
    notes: Option<String>,
}

impl FoodRecordPayload {
    fn into_fields(self) -> Result<FoodRecordFields, &'static str> {
        let date = self.date.trim().to_string();
        let meal_type = self.meal_type.trim().to_string();
        let food_items = self.food_items.trim().to_string();

        if !valid_date(&date) {
            return Err("Invalid date, expected YYYY-MM-DD");
        }
        if meal_type.is_empty() {
            return Err("Missing meal_type");
        }
        if food_items.is_empty() {
            return Err("Missing food_items");
        }

        Ok(FoodRecordFields {
            date,
            meal_type,
            food_items,
            notes: self.notes.unwrap_or_default(),
        })
    }
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct RecordQuery {
    /// Exact day, `YYYY-MM-DD`. Takes precedence over `month`.
    date: Option<String>,
    /// Calendar month, `YYYY-MM`.
    month: Option<String>,
}

impl RecordQuery {
    fn filter(self) -> Result<RecordFilter, &'static str> {
        match (self.date, self.month) {
            (Some(date), _) if !date.is_empty() => {
                if valid_date(&date) {
                    Ok(RecordFilter::Date(date))
                } else {
                    Err("Invalid date, expected YYYY-MM-DD")
                }
            }
            (_, Some(month)) if !month.is_empty() => {
                if valid_month(&month) {
                    Ok(RecordFilter::Month(month))
                } else {
                    Err("Invalid month, expected YYYY-MM")
                }
            }
            _ => Ok(RecordFilter::All),
        }
    }
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

fn parse_payload(payload: Option<Json<FoodRecordPayload>>) -> Result<FoodRecordFields, Response> {
    let Some(Json(payload)) = payload else {
        return Err(failure(StatusCode::BAD_REQUEST, "Missing payload"));
    };
    payload
        .into_fields()
        .map_err(|message| failure(StatusCode::BAD_REQUEST, message))
}

#[utoipa::path(
    post,
    path = "/api/food-records",
    request_body = FoodRecordPayload,
    responses(
        (status = 201, description = "Record created", body = FoodRecord),
        (status = 400, description = "Missing or invalid fields", body = ErrorEnvelope),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorEnvelope),
    ),
    security(("bearer" = [])),
    tag = "food-records"
)]
#[instrument(skip(records, payload), fields(user_id = identity.user_id))]
pub async fn create(
    Extension(identity): Extension<Identity>,
    records: Extension<Arc<dyn FoodRecordStore>>,
    payload: Option<Json<FoodRecordPayload>>,
) -> impl IntoResponse {
    let fields = match parse_payload(payload) {
        Ok(fields) => fields,
        Err(response) => return response,
    };

    match records.create(identity.user_id, fields).await {
        Ok(record) => success(StatusCode::CREATED, "Food record created", record),
        Err(e) => {
            error!("Error creating food record: {:?}", e);
            internal_error()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/food-records",
    params(RecordQuery),
    responses(
        (status = 200, description = "Caller's records, newest first", body = [FoodRecord]),
        (status = 400, description = "Malformed filter", body = ErrorEnvelope),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorEnvelope),
    ),
    security(("bearer" = [])),
    tag = "food-records"
)]
#[instrument(skip(records, query), fields(user_id = identity.user_id))]
pub async fn list(
    Extension(identity): Extension<Identity>,
    records: Extension<Arc<dyn FoodRecordStore>>,
    query: Option<Query<RecordQuery>>,
) -> impl IntoResponse {
    let Some(Query(query)) = query else {
        return failure(StatusCode::BAD_REQUEST, "Invalid query");
    };
    let filter = match query.filter() {
        Ok(filter) => filter,
        Err(message) => return failure(StatusCode::BAD_REQUEST, message),
    };

    debug!("filter: {:?}", filter);

    match records.list(identity.user_id, &filter).await {
        Ok(list) => success(StatusCode::OK, "Food records", list),
        Err(e) => {
            error!("Error listing food records: {:?}", e);
            internal_error()
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/food-records/{id}",
    params(("id" = i64, Path, description = "Record id")),
    request_body = FoodRecordPayload,
    responses(
        (status = 200, description = "Record updated", body = FoodRecord),
        (status = 400, description = "Invalid id or fields", body = ErrorEnvelope),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorEnvelope),
        (status = 404, description = "No such record for this user", body = ErrorEnvelope),
    ),
    security(("bearer" = [])),
    tag = "food-records"
)]
#[instrument(skip(records, payload), fields(user_id = identity.user_id))]
pub async fn update(
    Extension(identity): Extension<Identity>,
    records: Extension<Arc<dyn FoodRecordStore>>,
    Path(id): Path<String>,
    payload: Option<Json<FoodRecordPayload>>,
) -> impl IntoResponse {
    let Some(id) = parse_id(&id) else {
        return failure(StatusCode::BAD_REQUEST, "Invalid record id");
    };
    let fields = match parse_payload(payload) {
        Ok(fields) => fields,
        Err(response) => return response,
    };

    match records.update(identity.user_id, id, fields).await {
        Ok(Some(record)) => success(StatusCode::OK, "Food record updated", record),
        Ok(None) => failure(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE),
        Err(e) => {
            error!("Error updating food record: {:?}", e);
            internal_error()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/food-records/{id}",
    params(("id" = i64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Record deleted"),
        (status = 400, description = "Invalid id", body = ErrorEnvelope),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorEnvelope),
        (status = 404, description = "No such record for this user", body = ErrorEnvelope),
    ),
    security(("bearer" = [])),
    tag = "food-records"
)]
#[instrument(skip(records), fields(user_id = identity.user_id))]
pub async fn delete(
    Extension(identity): Extension<Identity>,
    records: Extension<Arc<dyn FoodRecordStore>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Some(id) = parse_id(&id) else {
        return failure(StatusCode::BAD_REQUEST, "Invalid record id");
    };

    match records.delete(identity.user_id, id).await {
        Ok(true) => success(StatusCode::OK, "Food record deleted", json!({ "id": id })),
        Ok(false) => failure(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE),
        Err(e) => {
            error!("Error deleting food record: {:?}", e);
            internal_error()
        }
    }
}
