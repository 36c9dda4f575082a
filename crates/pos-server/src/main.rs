//! NFC POS HTTP Server
//!
//! Axum-based server for the point-of-sale terminal: subscription checkout
//! with Stripe, simulated card capture and transaction history.

mod config;
mod error;
mod handlers;
mod identity;
mod routes;
mod state;

use std::sync::Arc;

use axum::http::HeaderValue;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pos_core::RecordStore;
use pos_payments::{
    CheckoutUrls, PaymentCapture, StripeClient, SubscriptionEngine, WebhookVerifier,
};
use pos_store::{MemoryRecordStore, RestRecordStore};

use crate::config::ServerConfig;
use crate::identity::TokenSigner;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;
    tracing::info!(mode = %config.mode, public_url = %config.public_url, "Configuration loaded");

    // Record store
    let store: Arc<dyn RecordStore> = match &config.store {
        Some(store_config) => {
            let store = RestRecordStore::new(store_config.clone())?;
            if store.health_check().await {
                tracing::info!("✓ Connected to record store at {}", store_config.base_url);
            } else {
                tracing::warn!("⚠ Record store at {} not reachable", store_config.base_url);
            }
            Arc::new(store)
        }
        None => {
            tracing::warn!("⚠ STORE_URL not set - using in-memory store, data is lost on restart");
            Arc::new(MemoryRecordStore::new())
        }
    };

    // Payments
    let subscriptions = match StripeClient::from_env() {
        Ok(stripe) => {
            tracing::info!("✓ Stripe configured");
            let verifier = WebhookVerifier::new(stripe.webhook_secret());
            Some(Arc::new(SubscriptionEngine::new(
                store.clone(),
                Arc::new(stripe),
                verifier,
                CheckoutUrls::new(&config.public_url),
            )))
        }
        Err(e) => {
            tracing::warn!("⚠ Stripe not configured - subscriptions disabled ({e})");
            tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
            None
        }
    };

    let identity = match &config.identity_secret {
        Some(secret) => TokenSigner::new(secret),
        None => {
            tracing::warn!("⚠ IDENTITY_SECRET not set - access tokens expire with this process");
            TokenSigner::ephemeral()
        }
    };

    // Build application state
    let state = AppState {
        capture: Arc::new(PaymentCapture::new(store.clone())),
        store,
        subscriptions,
        identity: Arc::new(identity),
        mode: config.mode,
    };

    // CORS configuration
    let origin = if config.mode.is_production() {
        AllowOrigin::exact(HeaderValue::from_str(&config.public_url)?)
    } else {
        AllowOrigin::any()
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 POS backend running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                          - Health check");
    tracing::info!("  POST /api/subscriptions/create-base   - Start Base plan checkout");
    tracing::info!("  GET  /api/subscriptions/check-session - Poll checkout result");
    tracing::info!("  GET  /api/subscriptions/status        - Current subscription");
    tracing::info!("  POST /api/create-payment-intent       - Start a card payment");
    tracing::info!("  POST /api/confirm-payment             - Capture a card payment");
    tracing::info!("  POST /api/cancel-payment              - Abort a card payment");
    tracing::info!("  GET  /api/transactions                - Transaction history");
    tracing::info!("  POST /api/webhooks/stripe             - Stripe events");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
