//! Router tests.
//!
//! These drive the full axum stack (request id, auth middleware, handlers)
//! with `oneshot` against an in-memory store.

use super::{
    router,
    storage::{
        FoodRecord, FoodRecordFields, FoodRecordStore, NewUser, RecordFilter, StoreError,
        UserRecord, UserStore,
    },
};
use crate::auth::{unix_now, PasswordHasher, TokenAuthority, TOKEN_TTL_SECONDS};
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Request, StatusCode,
    },
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use tower::ServiceExt;

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    records: Vec<(FoodRecord, bool)>,
    clock: i64,
}

struct MemoryStore {
    tables: Mutex<Tables>,
    healthy: AtomicBool,
}

impl MemoryStore {
    fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            healthy: AtomicBool::new(true),
        }
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn record_count(&self) -> usize {
        self.tables().records.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.tables().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.tables().users.iter().any(|u| u.username == username))
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.tables().users.iter().any(|u| u.email == email))
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut tables = self.tables();
        if tables
            .users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StoreError::Conflict);
        }
        let record = UserRecord {
            id: i64::try_from(tables.users.len()).unwrap_or(i64::MAX - 1) + 1,
            username: user.username,
            email: user.email,
            password_hash: user.credential.into_inner(),
        };
        tables.users.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl FoodRecordStore for MemoryStore {
    async fn create(
        &self,
        user_id: i64,
        fields: FoodRecordFields,
    ) -> Result<FoodRecord, StoreError> {
        let mut tables = self.tables();
        tables.clock += 1;
        let record = FoodRecord {
            id: i64::try_from(tables.records.len()).unwrap_or(i64::MAX - 1) + 1,
            user_id,
            date: fields.date,
            meal_type: fields.meal_type,
            food_items: fields.food_items,
            notes: fields.notes,
            created_at: tables.clock,
            updated_at: tables.clock,
        };
        tables.records.push((record.clone(), false));
        Ok(record)
    }

    async fn list(
        &self,
        user_id: i64,
        filter: &RecordFilter,
    ) -> Result<Vec<FoodRecord>, StoreError> {
        let mut list: Vec<FoodRecord> = self
            .tables()
            .records
            .iter()
            .filter(|(r, deleted)| !deleted && r.user_id == user_id)
            .filter(|(r, _)| match filter {
                RecordFilter::All => true,
                RecordFilter::Date(date) => &r.date == date,
                RecordFilter::Month(month) => r.date.starts_with(&format!("{month}-")),
            })
            .map(|(r, _)| r.clone())
            .collect();
        list.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(list)
    }

    async fn update(
        &self,
        user_id: i64,
        id: i64,
        fields: FoodRecordFields,
    ) -> Result<Option<FoodRecord>, StoreError> {
        let mut tables = self.tables();
        tables.clock += 1;
        let now = tables.clock;
        Ok(tables
            .records
            .iter_mut()
            .find(|(r, deleted)| !deleted && r.id == id && r.user_id == user_id)
            .map(|(r, _)| {
                r.date = fields.date;
                r.meal_type = fields.meal_type;
                r.food_items = fields.food_items;
                r.notes = fields.notes;
                r.updated_at = now;
                r.clone()
            }))
    }

    async fn delete(&self, user_id: i64, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        Ok(tables
            .records
            .iter_mut()
            .find(|(r, deleted)| !deleted && r.id == id && r.user_id == user_id)
            .map(|(_, deleted)| *deleted = true)
            .is_some())
    }
}

struct TestApp {
    app: Router,
    store: Arc<MemoryStore>,
    authority: Arc<TokenAuthority>,
}

impl TestApp {
    fn new() -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let authority = Arc::new(TokenAuthority::new(&SecretString::from(
            "router-test-secret-0123456789abcdef".to_string(),
        ))?);
        let app = router(
            authority.clone(),
            PasswordHasher::new(4),
            store.clone(),
            store.clone(),
        );
        Ok(Self {
            app,
            store,
            authority,
        })
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        authorization: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, payload))
    }

    async fn register(&self, username: &str, email: &str, password: &str) -> Result<StatusCode> {
        let (status, _) = self
            .send(
                "POST",
                "/api/register",
                None,
                Some(json!({ "username": username, "email": email, "password": password })),
            )
            .await?;
        Ok(status)
    }

    async fn login(&self, username: &str, password: &str) -> Result<(StatusCode, Value)> {
        self.send(
            "POST",
            "/api/login",
            None,
            Some(json!({ "username": username, "password": password })),
        )
        .await
    }

    /// Register and log in, returning a ready `Authorization` header value.
    async fn bearer(&self, username: &str) -> Result<String> {
        let status = self
            .register(username, &format!("{username}@example.com"), "secret123")
            .await?;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = self.login(username, "secret123").await?;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["token"].as_str().unwrap_or_default();
        Ok(format!("Bearer {token}"))
    }

    async fn add_record(&self, bearer: &str, date: &str, meal_type: &str) -> Result<i64> {
        let (status, body) = self
            .send(
                "POST",
                "/api/food-records",
                Some(bearer),
                Some(json!({ "date": date, "meal_type": meal_type, "food_items": "rice" })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);
        Ok(body["data"]["id"].as_i64().unwrap_or_default())
    }
}

#[tokio::test]
async fn register_login_and_profile() -> Result<()> {
    let t = TestApp::new()?;

    let (status, body) = t
        .send(
            "POST",
            "/api/register",
            None,
            Some(json!({ "username": " alice ", "email": "Alice@Example.com", "password": "secret123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["email"], "alice@example.com");
    let user_id = body["data"]["user_id"].as_i64().unwrap_or_default();

    let stored = t.store.find_by_username("alice").await?;
    let hash = stored.map(|u| u.password_hash).unwrap_or_default();
    assert!(hash.starts_with("$2"));
    assert!(!hash.contains("secret123"));

    let (status, body) = t.login("alice", "secret123").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user_id"], user_id);
    assert_eq!(body["data"]["email"], "alice@example.com");
    let token = body["data"]["token"].as_str().unwrap_or_default().to_string();

    let claims = t.authority.verify(&token)?;
    assert_eq!(claims.user_id, user_id);
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECONDS);

    let (status, body) = t
        .send("GET", "/api/profile", Some(&format!("Bearer {token}")), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");
    Ok(())
}

#[tokio::test]
async fn register_rejects_duplicates() -> Result<()> {
    let t = TestApp::new()?;
    assert_eq!(
        t.register("alice", "alice@example.com", "secret123").await?,
        StatusCode::CREATED
    );

    let (status, taken_username) = t
        .send(
            "POST",
            "/api/register",
            None,
            Some(json!({ "username": "alice", "email": "other@example.com", "password": "secret123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, taken_email) = t
        .send(
            "POST",
            "/api/register",
            None,
            Some(json!({ "username": "bob", "email": "ALICE@example.com", "password": "secret123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_ne!(taken_username["message"], taken_email["message"]);
    Ok(())
}

#[tokio::test]
async fn register_validates_input() -> Result<()> {
    let t = TestApp::new()?;
    assert_eq!(
        t.register("", "alice@example.com", "secret123").await?,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        t.register("alice", "not-an-email", "secret123").await?,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        t.register("alice", "alice@example.com", "12345").await?,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        t.register("alice", "alice@example.com", &"x".repeat(73))
            .await?,
        StatusCode::BAD_REQUEST
    );

    let (status, body) = t.send("POST", "/api/register", None, None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    Ok(())
}

#[tokio::test]
async fn longest_password_registers_and_logs_in() -> Result<()> {
    let t = TestApp::new()?;
    let longest = "p".repeat(72);

    assert_eq!(
        t.register("alice", "alice@example.com", &longest).await?,
        StatusCode::CREATED
    );
    let (status, body) = t.login("alice", &longest).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["token"].is_string());

    // One byte more must not log in as the 72-byte prefix.
    let (status, _) = t.login("alice", &format!("{longest}p")).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t.login("alice", &longest[..71]).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(
        t.register("bob", "bob@example.com", &"p".repeat(73)).await?,
        StatusCode::BAD_REQUEST
    );
    Ok(())
}

#[tokio::test]
async fn login_failures_share_one_message() -> Result<()> {
    let t = TestApp::new()?;
    t.register("alice", "alice@example.com", "secret123").await?;

    let (status, wrong_password) = t.login("alice", "secret124").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, unknown_user) = t.login("mallory", "secret123").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password["message"], unknown_user["message"]);
    assert!(wrong_password.get("data").is_none());
    Ok(())
}

#[tokio::test]
async fn login_with_corrupt_stored_hash_is_rejected() -> Result<()> {
    let t = TestApp::new()?;
    t.store.tables().users.push(UserRecord {
        id: 42,
        username: "broken".to_string(),
        email: "broken@example.com".to_string(),
        password_hash: "not-a-bcrypt-hash".to_string(),
    });

    let (status, body) = t.login("broken", "secret123").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid username or password");
    Ok(())
}

#[tokio::test]
async fn missing_credential_never_reaches_handler() -> Result<()> {
    let t = TestApp::new()?;

    let (status, body) = t
        .send(
            "POST",
            "/api/food-records",
            None,
            Some(json!({ "date": "2024-03-01", "meal_type": "lunch", "food_items": "rice" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "invalid or missing authentication token");
    assert_eq!(t.store.record_count(), 0);
    Ok(())
}

#[tokio::test]
async fn rejected_credentials_share_one_message() -> Result<()> {
    let t = TestApp::new()?;
    let expired = t
        .authority
        .issue_at(7, "alice", unix_now() - TOKEN_TTL_SECONDS)?;
    let other = TokenAuthority::new(&SecretString::from("another-secret".to_string()))?
        .issue(7, "alice")?;

    for header in [
        "sometoken".to_string(),
        "Bearer".to_string(),
        "Bearer not.a.jwt".to_string(),
        format!("Bearer {expired}"),
        format!("Bearer {other}"),
    ] {
        let (status, body) = t.send("GET", "/api/profile", Some(&header), None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "header: {header}");
        assert_eq!(body["message"], "invalid or missing authentication token");
    }
    Ok(())
}

#[tokio::test]
async fn profile_of_vanished_user_is_not_found() -> Result<()> {
    let t = TestApp::new()?;
    let token = t.authority.issue(999, "ghost")?;

    let (status, _) = t
        .send("GET", "/api/profile", Some(&format!("Bearer {token}")), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn food_record_lifecycle() -> Result<()> {
    let t = TestApp::new()?;
    let alice = t.bearer("alice").await?;

    let (status, body) = t
        .send(
            "POST",
            "/api/food-records",
            Some(&alice),
            Some(json!({ "date": "2024-03-01", "meal_type": "breakfast", "food_items": "oats", "notes": "with honey" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["notes"], "with honey");
    let id = body["data"]["id"].as_i64().unwrap_or_default();

    let (status, body) = t
        .send(
            "PUT",
            &format!("/api/food-records/{id}"),
            Some(&alice),
            Some(json!({ "date": "2024-03-02", "meal_type": "lunch", "food_items": "soup" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["date"], "2024-03-02");
    assert_eq!(body["data"]["food_items"], "soup");
    assert_eq!(body["data"]["notes"], "");

    let (status, _) = t
        .send("DELETE", &format!("/api/food-records/{id}"), Some(&alice), None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .send("DELETE", &format!("/api/food-records/{id}"), Some(&alice), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = t
        .send("GET", "/api/food-records", Some(&alice), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn food_record_input_is_validated() -> Result<()> {
    let t = TestApp::new()?;
    let alice = t.bearer("alice").await?;

    let (status, _) = t
        .send(
            "POST",
            "/api/food-records",
            Some(&alice),
            Some(json!({ "date": "03/01/2024", "meal_type": "lunch", "food_items": "rice" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send(
            "PUT",
            "/api/food-records/abc",
            Some(&alice),
            Some(json!({ "date": "2024-03-01", "meal_type": "lunch", "food_items": "rice" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send("GET", "/api/food-records?month=2024-13", Some(&alice), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(t.store.record_count(), 0);
    Ok(())
}

#[tokio::test]
async fn records_are_scoped_to_their_owner() -> Result<()> {
    let t = TestApp::new()?;
    let alice = t.bearer("alice").await?;
    let bob = t.bearer("bob").await?;
    let id = t.add_record(&alice, "2024-03-01", "dinner").await?;

    let (status, body) = t.send("GET", "/api/food-records", Some(&bob), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    let (status, bob_update) = t
        .send(
            "PUT",
            &format!("/api/food-records/{id}"),
            Some(&bob),
            Some(json!({ "date": "2024-03-01", "meal_type": "dinner", "food_items": "stolen" })),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, missing) = t
        .send(
            "PUT",
            "/api/food-records/9999",
            Some(&bob),
            Some(json!({ "date": "2024-03-01", "meal_type": "dinner", "food_items": "x" })),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(bob_update, missing);

    let (status, _) = t
        .send("DELETE", &format!("/api/food-records/{id}"), Some(&bob), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = t
        .send("GET", "/api/food-records", Some(&alice), None)
        .await?;
    assert_eq!(body["data"][0]["food_items"], "rice");
    Ok(())
}

#[tokio::test]
async fn list_filters_and_ordering() -> Result<()> {
    let t = TestApp::new()?;
    let alice = t.bearer("alice").await?;
    let breakfast = t.add_record(&alice, "2024-03-01", "breakfast").await?;
    let dinner = t.add_record(&alice, "2024-03-01", "dinner").await?;
    let april = t.add_record(&alice, "2024-04-10", "lunch").await?;
    let february = t.add_record(&alice, "2024-02-29", "lunch").await?;

    let ids = |body: &Value| -> Vec<i64> {
        body["data"]
            .as_array()
            .map(|list| list.iter().filter_map(|r| r["id"].as_i64()).collect())
            .unwrap_or_default()
    };

    let (_, all) = t
        .send("GET", "/api/food-records", Some(&alice), None)
        .await?;
    assert_eq!(ids(&all), vec![april, dinner, breakfast, february]);

    let (_, day) = t
        .send("GET", "/api/food-records?date=2024-03-01", Some(&alice), None)
        .await?;
    assert_eq!(ids(&day), vec![dinner, breakfast]);

    let (_, month) = t
        .send("GET", "/api/food-records?month=2024-02", Some(&alice), None)
        .await?;
    assert_eq!(ids(&month), vec![february]);

    let (_, both) = t
        .send(
            "GET",
            "/api/food-records?date=2024-04-10&month=2024-02",
            Some(&alice),
            None,
        )
        .await?;
    assert_eq!(ids(&both), vec![april]);
    Ok(())
}

#[tokio::test]
async fn health_reports_database_state() -> Result<()> {
    let t = TestApp::new()?;

    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let x_app = response
        .headers()
        .get("X-App")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(x_app.starts_with(concat!(env!("CARGO_PKG_NAME"), ":", env!("CARGO_PKG_VERSION"))));
    assert!(response.headers().contains_key("x-request-id"));
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    let payload: Value = serde_json::from_slice(&body)?;
    assert_eq!(payload["status"], "ok");

    t.store.healthy.store(false, Ordering::SeqCst);
    let (status, body) = t.send("GET", "/health", None, None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"], "error");

    let (status, body) = t.send("OPTIONS", "/health", None, None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, Value::Null);
    Ok(())
}

#[tokio::test]
async fn request_id_is_propagated() -> Result<()> {
    let t = TestApp::new()?;
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "test-request-1")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("test-request-1")
    );
    Ok(())
}
