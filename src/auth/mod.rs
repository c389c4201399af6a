//! Owner identity for the management API
//!
//! Authentication happens upstream (a gateway or session layer). It passes
//! the caller's identity in a configurable header, which this middleware
//! turns into an `OwnerId` request extension.

use anyhow::Context;
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::config::AuthConfig;

/// Identity of the link owner making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerId(pub String);

pub struct AuthService {
    owner_header: HeaderName,
}

#[derive(Serialize)]
struct AuthErrorResponse {
    error: String,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> anyhow::Result<Self> {
        let owner_header = HeaderName::from_bytes(config.owner_header.as_bytes())
            .with_context(|| format!("OWNER_HEADER '{}' is not a valid header name", config.owner_header))?;
        Ok(Self { owner_header })
    }

    pub fn owner_header(&self) -> &HeaderName {
        &self.owner_header
    }

    pub fn owner_from(&self, headers: &HeaderMap) -> Option<OwnerId> {
        headers
            .get(&self.owner_header)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| OwnerId(v.to_string()))
    }
}

pub async fn auth_middleware(
    auth_service: Arc<AuthService>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    match auth_service.owner_from(&headers) {
        Some(owner) => {
            request.extensions_mut().insert(owner);
            next.run(request).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(AuthErrorResponse {
                error: "Not authenticated".to_string(),
            }),
        )
            .into_response(),
    }
}
