use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use super::middleware::RequestStart;
use super::service::{RedirectOutcome, RedirectService};
use crate::analytics::VisitorSignals;
use crate::config::RedirectConfig;

pub struct RedirectState {
    pub service: RedirectService,
    pub config: RedirectConfig,
}

impl RedirectState {
    fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.config.status_code)
            .ok()
            .filter(StatusCode::is_redirection)
            .unwrap_or(StatusCode::FOUND)
    }
}

fn redirect_to(status: StatusCode, location: &str) -> Option<Response> {
    let location = HeaderValue::from_str(location).ok()?;
    Some((status, [(header::LOCATION, location)]).into_response())
}

fn fallback(state: &RedirectState, status: StatusCode) -> Response {
    redirect_to(status, &state.config.fallback_url)
        .unwrap_or_else(|| (StatusCode::NOT_FOUND, "URL not found").into_response())
}

/// Redirect to the destination URL, recording the click
pub async fn redirect_url(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    Extension(RequestStart(request_start)): Extension<RequestStart>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let signals = VisitorSignals::from_headers(&headers);
    let status = state.status();

    let mut response = match state.service.resolve(&code, &signals).await {
        RedirectOutcome::Found {
            destination,
            click,
            cache_hit,
        } => match redirect_to(status, &destination) {
            Some(mut response) => {
                let headers = response.headers_mut();
                headers.insert("x-linkmeter-click", HeaderValue::from_static(click.as_str()));
                headers.insert(
                    "x-linkmeter-cache-hit",
                    HeaderValue::from_static(if cache_hit { "true" } else { "false" }),
                );
                response
            }
            None => {
                warn!(short_code = %code, "destination is not a valid Location header, using fallback");
                fallback(&state, status)
            }
        },
        RedirectOutcome::Fallback(_) => fallback(&state, status),
    };

    response.headers_mut().insert(
        "x-linkmeter-timing-total-ms",
        HeaderValue::from(request_start.elapsed().as_millis() as u64),
    );
    response
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
