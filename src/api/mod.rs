pub mod health;
pub mod scopes;

use crate::db::Repository;
use axum::{http::Method, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

/// Read-only routes over the persisted scope store.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/scopes", get(scopes::get_scope))
        .route("/v1/scopes/timeseries", get(scopes::get_timeseries))
        .route(
            "/v1/systems/:system/token-types",
            get(scopes::get_token_types),
        )
        .layer(cors)
        .with_state(state)
}
