//! User and food-record persistence.
//!
//! Handlers depend on the [`UserStore`] and [`FoodRecordStore`] traits; the
//! service wires both to [`PgStore`]. Every food-record operation is scoped to
//! the owning user, so a record id belonging to someone else behaves exactly
//! like a missing one.

use crate::auth::Credential;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use thiserror::Error;
use tracing::{info_span, Instrument, Span};
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    Conflict,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

impl UserRecord {
    #[must_use]
    pub fn credential(&self) -> Credential {
        Credential::from_stored(self.password_hash.clone())
    }
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub credential: Credential,
}

/// A meal-log entry as returned to its owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct FoodRecord {
    pub id: i64,
    pub user_id: i64,
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,
    pub meal_type: String,
    pub food_items: String,
    pub notes: String,
    /// Unix seconds.
    pub created_at: i64,
    /// Unix seconds.
    pub updated_at: i64,
}

/// Editable fields of a food record.
#[derive(Clone, Debug)]
pub struct FoodRecordFields {
    pub date: String,
    pub meal_type: String,
    pub food_items: String,
    pub notes: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordFilter {
    All,
    /// Exact day, `YYYY-MM-DD`.
    Date(String),
    /// Calendar month, `YYYY-MM`.
    Month(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Check the backing store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn username_exists(&self, username: &str) -> Result<bool, StoreError>;
    async fn email_exists(&self, email: &str) -> Result<bool, StoreError>;
    /// Returns [`StoreError::Conflict`] if the username or email is taken.
    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError>;
}

#[async_trait]
pub trait FoodRecordStore: Send + Sync {
    async fn create(
        &self,
        user_id: i64,
        fields: FoodRecordFields,
    ) -> Result<FoodRecord, StoreError>;
    /// Newest day first, then newest entry within a day.
    async fn list(
        &self,
        user_id: i64,
        filter: &RecordFilter,
    ) -> Result<Vec<FoodRecord>, StoreError>;
    /// `None` if the record does not exist or belongs to another user.
    async fn update(
        &self,
        user_id: i64,
        id: i64,
        fields: FoodRecordFields,
    ) -> Result<Option<FoodRecord>, StoreError>;
    /// Soft delete; `false` if nothing owned by `user_id` matched.
    async fn delete(&self, user_id: i64, id: i64) -> Result<bool, StoreError>;
}

const USER_COLUMNS: &str = "id, username, email, password_hash";

const RECORD_COLUMNS: &str = "id, user_id, to_char(date, 'YYYY-MM-DD') AS date, meal_type, \
     food_items, notes, EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at, \
     EXTRACT(EPOCH FROM updated_at)::BIGINT AS updated_at";

// Qualified so the ordering uses the stored columns, not the formatted aliases.
const RECORD_ORDER: &str =
    "ORDER BY food_records.date DESC, food_records.created_at DESC, food_records.id DESC";

fn db_span(operation: &str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn map_insert_error(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
        _ => StoreError::Database(error),
    }
}

fn user_from_row(row: &PgRow) -> Result<UserRecord, sqlx::Error> {
    Ok(UserRecord {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
    })
}

fn record_from_row(row: &PgRow) -> Result<FoodRecord, sqlx::Error> {
    Ok(FoodRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        date: row.try_get("date")?,
        meal_type: row.try_get("meal_type")?,
        food_items: row.try_get("food_items")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// PostgreSQL-backed store.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_user(
        &self,
        column: &str,
        value: UserKey<'_>,
    ) -> Result<Option<UserRecord>, StoreError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = $1 AND deleted_at IS NULL"
        );
        let span = db_span("SELECT", &query);
        let statement = sqlx::query(&query);
        let statement = match value {
            UserKey::Id(id) => statement.bind(id),
            UserKey::Text(text) => statement.bind(text),
        };
        let row = statement
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn exists(&self, column: &str, value: &str) -> Result<bool, StoreError> {
        let query = format!("SELECT EXISTS(SELECT 1 FROM users WHERE {column} = $1) AS exists");
        let span = db_span("SELECT", &query);
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.try_get("exists")?)
    }
}

enum UserKey<'a> {
    Id(i64),
    Text(&'a str),
}

#[async_trait]
impl UserStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        let mut conn = self.pool.acquire().await?;
        conn.ping().instrument(span).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, StoreError> {
        self.fetch_user("id", UserKey::Id(id)).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        self.fetch_user("username", UserKey::Text(username)).await
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        self.exists("username", username).await
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        self.exists("email", email).await
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let query = format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        let span = db_span("INSERT", &query);
        let row = sqlx::query(&query)
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.credential.as_str())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(map_insert_error)?;

        Ok(user_from_row(&row)?)
    }
}

#[async_trait]
impl FoodRecordStore for PgStore {
    async fn create(
        &self,
        user_id: i64,
        fields: FoodRecordFields,
    ) -> Result<FoodRecord, StoreError> {
        let query = format!(
            "INSERT INTO food_records (user_id, date, meal_type, food_items, notes) \
             VALUES ($1, $2::date, $3, $4, $5) RETURNING {RECORD_COLUMNS}"
        );
        let span = db_span("INSERT", &query);
        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(&fields.date)
            .bind(&fields.meal_type)
            .bind(&fields.food_items)
            .bind(&fields.notes)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;

        Ok(record_from_row(&row)?)
    }

    async fn list(
        &self,
        user_id: i64,
        filter: &RecordFilter,
    ) -> Result<Vec<FoodRecord>, StoreError> {
        let (clause, value) = match filter {
            RecordFilter::All => ("", None),
            RecordFilter::Date(date) => (" AND date = $2::date", Some(date)),
            RecordFilter::Month(month) => (" AND to_char(date, 'YYYY-MM') = $2", Some(month)),
        };
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM food_records \
             WHERE user_id = $1 AND deleted_at IS NULL{clause} {RECORD_ORDER}"
        );
        let span = db_span("SELECT", &query);
        let mut statement = sqlx::query(&query).bind(user_id);
        if let Some(value) = value {
            statement = statement.bind(value);
        }
        let rows = statement.fetch_all(&self.pool).instrument(span).await?;

        Ok(rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn update(
        &self,
        user_id: i64,
        id: i64,
        fields: FoodRecordFields,
    ) -> Result<Option<FoodRecord>, StoreError> {
        let query = format!(
            "UPDATE food_records SET date = $3::date, meal_type = $4, food_items = $5, notes = $6, \
             updated_at = NOW() WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL \
             RETURNING {RECORD_COLUMNS}"
        );
        let span = db_span("UPDATE", &query);
        let row = sqlx::query(&query)
            .bind(id)
            .bind(user_id)
            .bind(&fields.date)
            .bind(&fields.meal_type)
            .bind(&fields.food_items)
            .bind(&fields.notes)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.as_ref().map(record_from_row).transpose()?)
    }

    async fn delete(&self, user_id: i64, id: i64) -> Result<bool, StoreError> {
        let query = "UPDATE food_records SET deleted_at = NOW() \
                     WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL";
        let span = db_span("UPDATE", query);
        let result = sqlx::query(query)
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
