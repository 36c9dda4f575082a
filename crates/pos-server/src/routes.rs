//! Router

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{
    cancel_payment, check_session, confirm_payment, create_base_subscription,
    create_payment_intent, health_check, list_transactions, stripe_webhook, subscription_status,
};
use crate::state::AppState;

/// All API routes, without transport layers
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(health_check))
        // Subscriptions
        .route("/api/subscriptions/create-base", post(create_base_subscription))
        .route("/api/subscriptions/check-session", get(check_session))
        .route("/api/subscriptions/status", get(subscription_status))
        // Payments
        .route("/api/create-payment-intent", post(create_payment_intent))
        .route("/api/confirm-payment", post(confirm_payment))
        .route("/api/cancel-payment", post(cancel_payment))
        .route("/api/transactions", get(list_transactions))
        // Webhooks
        .route("/api/webhooks/stripe", post(stripe_webhook))
        .with_state(state)
}
