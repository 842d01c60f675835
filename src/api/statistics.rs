//! Statistics API endpoint

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::db::repositories::SearchCount;
use crate::models::SearchStatisticEntry;

const MAX_LIMIT: i64 = 500;

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Serialize)]
struct StatisticsResponse {
    recent: Vec<SearchStatisticEntry>,
    counts: Vec<SearchCount>,
    requests: RequestInfo,
}

#[derive(Serialize)]
struct RequestInfo {
    total: u64,
    avg_response_time_us: f64,
    uptime_seconds: u64,
}

/// Recent searches, per-search counts and request counters
pub async fn get_statistics(
    State(state): State<AppState>,
    Query(query): Query<StatisticsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.clamp(1, MAX_LIMIT);
    let recent = state
        .search_service
        .recent_statistics(limit)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    let counts = state
        .search_service
        .search_counts()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let stats = &state.request_stats;
    Ok(Json(StatisticsResponse {
        recent,
        counts,
        requests: RequestInfo {
            total: stats.total_requests(),
            avg_response_time_us: stats.avg_response_time_us(),
            uptime_seconds: stats.uptime_seconds(),
        },
    }))
}
