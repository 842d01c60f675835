//! API state, errors and middleware

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::models::{ErrorCode, ResultError};
use crate::services::{CorrectionService, CorrectionServiceError, SearchService, SearchServiceError};
use crate::search::SearchError;

/// Request counters, updated without locks
pub struct RequestStats {
    total_requests: AtomicU64,
    total_response_time_us: AtomicU64,
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record(&self, duration_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us.fetch_add(duration_us, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Average response time in microseconds
    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.total_response_time_us.load(Ordering::Relaxed) as f64 / total as f64
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: crate::db::DynDatabasePool,
    pub search_service: Arc<SearchService>,
    pub correction_service: Arc<CorrectionService>,
    pub request_stats: Arc<RequestStats>,
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// A backend failure; the numeric result code goes into `details`
    pub fn upstream(error: &ResultError) -> Self {
        let code = match error.code {
            ErrorCode::Timeout => "UPSTREAM_TIMEOUT",
            _ => "UPSTREAM_ERROR",
        };
        Self::with_details(
            code,
            error.message.clone(),
            serde_json::json!({ "result_code": error.code.code() }),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UPSTREAM_ERROR" => StatusCode::BAD_GATEWAY,
            "UPSTREAM_TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<SearchServiceError> for ApiError {
    fn from(e: SearchServiceError) -> Self {
        match e {
            SearchServiceError::NotFound(msg) => ApiError::not_found(msg),
            SearchServiceError::Validation(msg) => ApiError::validation_error(msg),
            SearchServiceError::Query(SearchError::UnknownSearch(name)) => {
                ApiError::not_found(format!("Search not found: {}", name))
            }
            SearchServiceError::Query(e @ SearchError::UnknownApi(_)) => ApiError::internal_error(e.to_string()),
            SearchServiceError::Query(e) => ApiError::validation_error(e.to_string()),
            SearchServiceError::Backend(e) => ApiError::upstream(&e),
            SearchServiceError::Internal(e) => ApiError::internal_error(e.to_string()),
        }
    }
}

impl From<CorrectionServiceError> for ApiError {
    fn from(e: CorrectionServiceError) -> Self {
        match e {
            CorrectionServiceError::Disabled => ApiError::forbidden(e.to_string()),
            CorrectionServiceError::NotFound(msg) => ApiError::not_found(msg),
            CorrectionServiceError::Validation(msg) => ApiError::validation_error(msg),
            CorrectionServiceError::Internal(e) => ApiError::internal_error(e.to_string()),
        }
    }
}

/// Record request count and duration
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    state.request_stats.record(start.elapsed().as_micros() as u64);
    response
}
