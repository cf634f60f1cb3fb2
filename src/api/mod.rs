use crate::auth::{PasswordHasher, TokenAuthority};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn,
    routing::{get, post, put},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod handlers;
mod middleware;
mod openapi;
pub mod storage;

#[cfg(test)]
mod tests;

pub use openapi::openapi;
use storage::{FoodRecordStore, PgStore, UserStore};

/// Start the server
/// # Errors
/// Return error if failed to connect to the database or to start the server
pub async fn new(
    port: u16,
    dsn: &str,
    authority: TokenAuthority,
    hasher: PasswordHasher,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PgStore::new(pool));

    let app = router(Arc::new(authority), hasher, store.clone(), store);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Build the application router.
///
/// Routes under `/api` other than register and login pass through
/// [`middleware::require_auth`] before their handler runs.
pub fn router(
    authority: Arc<TokenAuthority>,
    hasher: PasswordHasher,
    users: Arc<dyn UserStore>,
    records: Arc<dyn FoodRecordStore>,
) -> Router {
    let protected = Router::new()
        .route("/api/profile", get(handlers::profile::profile))
        .route(
            "/api/food-records",
            post(handlers::food_records::create).get(handlers::food_records::list),
        )
        .route(
            "/api/food-records/:id",
            put(handlers::food_records::update).delete(handlers::food_records::delete),
        )
        .route_layer(from_fn(middleware::require_auth));

    Router::new()
        .route(
            "/health",
            get(handlers::health::health).options(handlers::health::health),
        )
        .route("/api/register", post(handlers::user_register::register))
        .route("/api/login", post(handlers::user_login::login))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(authority))
                .layer(Extension(hasher))
                .layer(Extension(users))
                .layer(Extension(records)),
        )
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}
