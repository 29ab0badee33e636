//! Process skeleton for the ContractAI backend.
//!
//! Owns startup wiring only: configuration, tracing, the database pool,
//! schema bootstrap, a health endpoint, and the CORS/trace middleware
//! built from settings. The domain HTTP API (uploads, analyses, auth) is
//! mounted by the boundary layer, which receives the [`AppState`] built
//! here.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use contractai_config::Settings;
use contractai_db::DbPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// The process-wide configuration snapshot.
    pub settings: Arc<Settings>,
}

/// Builds the application router with the middleware stack.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.settings);

    Router::new()
        .route("/health", get(health))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Builds the CORS layer from the configured origins. A literal `*`
/// anywhere in the list opens the endpoint to any origin.
fn cors_layer(settings: &Settings) -> CorsLayer {
    if settings.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new().allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(origins))
}

/// Health check handler.
///
/// Reports the service version and verifies the database pool can still
/// hand out a session. Used by load balancers, monitoring, and CI.
async fn health(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let database = match contractai_db::acquire(&state.pool).await {
        Ok(_session) => "ok",
        Err(_) => "unavailable",
    };

    let status = if database == "ok" {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if database == "ok" { "ok" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "database": database,
        })),
    )
}
