use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::analytics::AnalyticsService;
use crate::auth::OwnerId;
use crate::links::{create_link as create_owned_link, CreateLinkError};
use crate::models::{CreateLinkRequest, Link};
use crate::storage::LinkStore;

pub struct AppState {
    pub links: Arc<dyn LinkStore>,
    pub analytics: AnalyticsService,
    /// Base of the public short URL, e.g. `https://sho.rt`
    pub public_base_url: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<CreateLinkError> for ApiError {
    fn from(err: CreateLinkError) -> Self {
        match err {
            CreateLinkError::InvalidUrl(_) | CreateLinkError::InvalidCode => {
                ApiError::BadRequest(err.to_string())
            }
            CreateLinkError::CodeTaken => ApiError::Conflict(err.to_string()),
            CreateLinkError::Exhausted => ApiError::Internal(err.to_string()),
            CreateLinkError::Storage(e) => {
                error!("Failed to create link: {}", e);
                ApiError::Internal("Failed to create link".to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    #[serde(flatten)]
    pub link: Link,
    pub short_url: Option<String>,
}

impl LinkResponse {
    fn new(link: Link, public_base_url: Option<&str>) -> Self {
        let short_url =
            public_base_url.map(|base| format!("{}/{}", base.trim_end_matches('/'), link.short_code));
        Self { link, short_url }
    }
}

/// Create a new short link for the caller
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<LinkResponse>), ApiError> {
    let link = create_owned_link(state.links.as_ref(), &owner_id, &payload).await?;
    info!(short_code = %link.short_code, owner_id = %owner_id, "created link");

    Ok((
        StatusCode::CREATED,
        Json(LinkResponse::new(link, state.public_base_url.as_deref())),
    ))
}

/// List the caller's links, newest first
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
) -> Result<Json<Vec<LinkResponse>>, ApiError> {
    match state.links.list_by_owner(&owner_id).await {
        Ok(links) => Ok(Json(
            links
                .into_iter()
                .map(|l| LinkResponse::new(l, state.public_base_url.as_deref()))
                .collect(),
        )),
        Err(e) => {
            error!(owner_id = %owner_id, "Failed to list links: {}", e);
            Err(ApiError::Internal("Failed to list links".to_string()))
        }
    }
}

/// Delete one of the caller's links
pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(code): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    match state.links.delete(&owner_id, &code).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Link deleted successfully".to_string(),
        })),
        Ok(false) => Err(ApiError::NotFound("Link not found".to_string())),
        Err(e) => {
            error!(short_code = %code, "Failed to delete link: {}", e);
            Err(ApiError::Internal("Failed to delete link".to_string()))
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
