use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::{self, Next},
    routing::{delete, get},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::analytics::AnalyticsService;
use crate::auth::{auth_middleware, AuthService};
use crate::storage::Stores;

use super::analytics::get_analytics;
use super::handlers::{create_link, delete_link, health_check, list_links, AppState};

pub fn create_api_router(
    stores: &Stores,
    auth_service: Arc<AuthService>,
    public_base_url: Option<String>,
) -> Router {
    let state = Arc::new(AppState {
        links: stores.links.clone(),
        analytics: AnalyticsService::new(stores.links.clone(), stores.clicks.clone()),
        public_base_url,
    });

    let protected_routes = Router::new()
        .route("/links", get(list_links).post(create_link))
        .route("/links/{code}", delete(delete_link))
        .route("/analytics", get(get_analytics))
        .route_layer(middleware::from_fn(move |headers: HeaderMap, req: Request, next: Next| {
            let auth = Arc::clone(&auth_service);
            auth_middleware(auth, headers, req, next)
        }))
        .with_state(state);

    let api = Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes);

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
}
