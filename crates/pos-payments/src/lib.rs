//! # pos-payments
//!
//! Subscription checkout and card capture for the NFC point-of-sale.
//!
//! ## Subscriptions (Stripe Checkout, hosted)
//!
//! ```text
//! ┌─────────────┐  initiate  ┌─────────────────┐  redirect  ┌─────────────┐
//! │   Pricing   │───────────▶│  Stripe Hosted  │───────────▶│   Pricing   │
//! │    page     │            │  Checkout Page  │            │  (polling)  │
//! └─────────────┘            └────────┬────────┘            └──────┬──────┘
//!                                     │ webhook                    │ check-session
//!                                     ▼                            ▼
//!                            ┌──────────────────────────────────────────┐
//!                            │           SubscriptionEngine             │
//!                            │  pending ──(paid + complete)──▶ active   │
//!                            └──────────────────────────────────────────┘
//! ```
//!
//! The poll and the webhook may arrive in any order; both feed one idempotent
//! activation step.
//!
//! ## Card capture (simulated NFC)
//!
//! [`PaymentCapture`] issues `pi_simulated_*` intents, records a pending
//! transaction and settles exactly that row on confirmation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pos_payments::{CheckoutUrls, StripeClient, SubscriptionEngine, WebhookVerifier};
//!
//! let stripe = Arc::new(StripeClient::from_env()?);
//! let verifier = WebhookVerifier::new(stripe.webhook_secret());
//! let engine = SubscriptionEngine::new(store, stripe, verifier, CheckoutUrls::new(public_url));
//!
//! let initiated = engine.initiate(request).await?;
//! // Redirect the browser to: initiated.checkout_url
//! ```

#![recursion_limit = "256"]

mod capture;
mod checkout;
mod error;
mod intent;
mod mock;
mod reconcile;
#[cfg(test)]
mod test_store;
mod webhook;

pub use capture::{IssuedIntent, PaymentCapture};
pub use checkout::{
    CheckoutGateway, CheckoutRequest, CheckoutSession, PaymentStatus, PlanPricing,
    SessionSnapshot, SessionStatus, StripeClient,
};
pub use error::{PaymentError, Result};
pub use intent::{IntentState, PaymentIntent, SimulatedTerminal};
pub use mock::MockCheckoutGateway;
pub use reconcile::{
    CheckoutUrls, InitiateRequest, Initiated, SessionCheck, SubscriptionEngine,
    SubscriptionSummary, WebhookOutcome,
};
pub use webhook::{WebhookEvent, WebhookVerifier, parse_event};

#[cfg(any(test, feature = "test-utils"))]
pub use webhook::testing;
