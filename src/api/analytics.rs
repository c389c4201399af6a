//! Analytics API handlers

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::handlers::{ApiError, AppState};
use crate::analytics::AnalyticsReport;
use crate::auth::OwnerId;
use crate::storage::TimeRange;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQueryParams {
    /// Start time (Unix timestamp)
    pub start_time: Option<i64>,

    /// End time (Unix timestamp)
    pub end_time: Option<i64>,
}

/// Analytics report across all of the caller's links
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Query(params): Query<AnalyticsQueryParams>,
) -> Result<Json<AnalyticsReport>, ApiError> {
    if let (Some(start), Some(end)) = (params.start_time, params.end_time) {
        if start > end {
            return Err(ApiError::BadRequest(
                "start_time must not be after end_time".to_string(),
            ));
        }
    }

    let range = TimeRange {
        start: params.start_time,
        end: params.end_time,
    };

    Ok(Json(state.analytics.summarize(&owner_id, range).await))
}
