use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::analytics::Enricher;
use crate::config::RedirectConfig;
use crate::storage::Stores;

use super::handlers::{health_check, redirect_url, RedirectState};
use super::middleware::record_request_start;
use super::service::RedirectService;

pub fn create_redirect_router(stores: &Stores, enricher: Enricher, config: RedirectConfig) -> Router {
    let state = Arc::new(RedirectState {
        service: RedirectService::new(stores.links.clone(), stores.clicks.clone(), enricher),
        config,
    });

    Router::new()
        .route("/", get(health_check))
        .route("/{code}", get(redirect_url))
        .layer(middleware::from_fn(record_request_start))
        .with_state(state)
}
