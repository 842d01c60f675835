//! API layer - HTTP handlers and routing
//!
//! Endpoints under `/api/v1`:
//! - `GET /searches`: configured searches and their forms
//! - `GET /search/{conf}`: run a search
//! - `GET /search/{conf}/explain`: query explaining a search
//! - `GET /search/{conf}/records/{id}`: one record as a JSON file
//! - `POST /search/{conf}/records/{id}/mark`: mark a record for correction
//! - `GET /search/{conf}/download.json|csv`: bulk downloads
//! - `GET /statistics`: search statistics

pub mod middleware;
pub mod search;
pub mod statistics;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, RequestStats};

/// Build the API router
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .route("/searches", get(search::list_searches))
        .nest("/search", search::router())
        .route("/statistics", get(statistics::get_statistics))
}

/// Build the complete router with middleware; `*` allows any origin
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = if cors_origin == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::exact(
            cors_origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?,
        )
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .nest("/api/v1", build_api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state))
}
