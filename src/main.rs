use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use linkmeter::analytics::{Enricher, GeoResolver, ReferrerClassifier};
use linkmeter::auth::AuthService;
use linkmeter::config::Config;
use linkmeter::storage::Stores;
use linkmeter::{api, redirect};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let stores = Stores::connect(&config.database).await?;
    info!("Initializing database...");
    stores.init().await?;
    info!("Database initialized successfully");
    let stores = stores.with_link_cache(&config.cache);

    // Click enrichment
    let geo = GeoResolver::from_config(&config.geoip)?;
    let referrers = ReferrerClassifier::with_self_hosts(config.redirect.public_base_url.iter());
    let enricher = Enricher::new(geo, referrers);

    let auth_service = Arc::new(AuthService::new(&config.auth)?);
    info!(
        "Owner identity read from the '{}' header",
        auth_service.owner_header()
    );

    // Create routers
    let api_router = api::create_api_router(
        &stores,
        auth_service,
        config.redirect.public_base_url.clone(),
    );
    let redirect_router =
        redirect::create_redirect_router(&stores, enricher, config.redirect.clone());

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", api_addr))?;
    info!("API server listening on http://{}", api_addr);

    // Start redirect server
    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr)
        .await
        .with_context(|| format!("Failed to bind redirect server to {}", redirect_addr))?;
    info!(
        "Redirect server listening on http://{} (status {}, fallback {})",
        redirect_addr, config.redirect.status_code, config.redirect.fallback_url
    );
    if config.redirect.fallback_hits_health_check() {
        warn!(
            "FALLBACK_URL '{}' points at the redirect server's health check; set it to a home page",
            config.redirect.fallback_url
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received, draining connections...");
        let _ = shutdown_tx.send(true);
    });

    // Run both servers concurrently
    let served = tokio::try_join!(
        axum::serve(api_listener, api_router)
            .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone())),
        axum::serve(redirect_listener, redirect_router)
            .with_graceful_shutdown(wait_for_shutdown(shutdown_rx)),
    );

    stores.close().await;
    info!("Database connections closed");

    served?;
    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // A dropped sender means no signal can arrive, so keep serving
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
