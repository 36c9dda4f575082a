//! Application State

use std::sync::Arc;

use pos_core::RecordStore;
use pos_payments::{PaymentCapture, SubscriptionEngine};

use crate::config::Mode;
use crate::identity::TokenSigner;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Record store (REST or in-memory)
    pub store: Arc<dyn RecordStore>,

    /// Subscription engine (None if Stripe is not configured)
    pub subscriptions: Option<Arc<SubscriptionEngine>>,

    /// Simulated card capture
    pub capture: Arc<PaymentCapture>,

    /// Access token issuer
    pub identity: Arc<TokenSigner>,

    pub mode: Mode,
}
