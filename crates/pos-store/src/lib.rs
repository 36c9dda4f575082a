//! # pos-store
//!
//! Record store adapters for the point-of-sale.
//!
//! ## Backends
//!
//! - **Memory**: process-local, for development and tests
//! - **REST**: hosted Postgres behind a PostgREST-compatible API (Supabase)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pos_store::{RestRecordStore, RestStoreConfig};
//!
//! let store = RestRecordStore::new(RestStoreConfig::new(url, api_key))?;
//! let rows = store.transactions_for(&customer_id, 50).await?;
//! ```

pub mod memory;
pub mod rest;

pub use memory::MemoryRecordStore;
pub use rest::{RestRecordStore, RestStoreConfig};

// Re-export core types for convenience
pub use pos_core::{RecordStore, Result, StoreError};
