//! # pos-core
//!
//! Domain records and shared contracts for the NFC point-of-sale.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   poll / webhook   ┌────────────────────┐
//! │   pos-web    │───────────────────▶│     pos-server     │
//! │ (api, poll)  │                    │  (axum handlers)   │
//! └──────────────┘                    └─────────┬──────────┘
//!                                               │
//!                                     ┌─────────▼──────────┐
//!                                     │    pos-payments    │
//!                                     │ reconcile, capture │
//!                                     └────┬──────────┬────┘
//!                                          │          │
//!                              ┌───────────▼───┐  ┌───▼──────────┐
//!                              │  RecordStore  │  │   Stripe     │
//!                              │  (pos-store)  │  │  (checkout)  │
//!                              └───────────────┘  └──────────────┘
//! ```
//!
//! This crate holds what every layer agrees on: the record types, the
//! `RecordStore` trait, the JSON bodies of the HTTP API and the bounded poll
//! loop the front end uses after a checkout redirect.

pub mod api;
pub mod error;
pub mod model;
pub mod poll;
pub mod store;

pub use error::{Result, StoreError};
pub use model::{
    Activation, Customer, CustomerId, Plan, Subscription, SubscriptionId, SubscriptionStatus,
    Transaction, TransactionId, TransactionStatus, minor_to_major,
};
pub use poll::{PollOutcome, PollPolicy, poll_until};
pub use store::{RecordStore, TRANSACTION_PAGE_LIMIT};
pub use tokio_util::sync::CancellationToken;
