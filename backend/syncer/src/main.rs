//! Kanemane sync service entry point.
//!
//! Starts a background task that polls the Kanemane backend for the user's
//! subscription status, assets, transactions and exchange rate, keeping the
//! latest snapshot in memory. Simultaneously exposes a small Axum REST API
//! that answers entitlement and routing questions and serves currency-aware
//! totals computed by `kanemane_core`.

mod api;
mod client;
mod config;
mod errors;
mod models;
mod sync;

#[cfg(test)]
mod test_backend;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use kanemane_core::entitlement::{RedirectTracker, RouteGuard};
use reqwest::Client;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use client::BackendClient;
use config::Config;
use sync::SyncState;

/// Receipt photos are compressed client-side; anything bigger is refused.
const MAX_RECEIPT_BYTES: usize = 10 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let http = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;
    let backend = BackendClient::new(http, &config.api_url, &config.auth_token)
        .with_backoff(Duration::from_secs(config.retry_backoff_secs));

    // ─── Background sync ──────────────────────────────────
    let sync_state = Arc::new(SyncState::new());
    tokio::spawn(sync::run(
        sync_state.clone(),
        backend.clone(),
        Duration::from_secs(config.poll_interval_secs),
    ));

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(api::ApiState {
        sync: sync_state,
        client: backend,
        guard: RouteGuard::new(config.subscription_path.clone(), config.exempt_paths.clone()),
        tracker: Mutex::new(RedirectTracker::new()),
    });

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/subscription", get(api::get_subscription))
        .route("/features/:feature", get(api::get_feature))
        .route("/route", get(api::get_route))
        .route("/assets", get(api::get_assets))
        .route("/assets/total", get(api::get_assets_total))
        .route("/transactions", get(api::get_transactions))
        .route("/transactions/summary", get(api::get_transactions_summary))
        .route("/transactions/:kind", post(api::post_transaction))
        .route("/refresh", post(api::post_refresh))
        .route("/logout", post(api::post_logout))
        .route("/checkout", post(api::post_checkout))
        .route("/plans", get(api::get_plans))
        .route("/payments/:order_id", get(api::get_payment_status))
        .route("/subscription/cancel", post(api::post_cancel))
        .route("/reports/export", get(api::get_report_export))
        .route(
            "/scan",
            post(api::post_scan).layer(DefaultBodyLimit::max(MAX_RECEIPT_BYTES)),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(api_state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr} (backend: {})", config.api_url);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
