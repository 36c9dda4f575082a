//! Record Store Abstraction
//!
//! Typed CRUD over the three record collections (customers, subscriptions,
//! transactions). Implementations live in `pos-store`; the payment flows only
//! ever see this trait, so a hosted REST store and the in-memory development
//! store are interchangeable.
//!
//! ```rust,ignore
//! let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
//! store.insert_customer(&customer).await?;
//! let current = store.current_subscription(&customer.id).await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    Customer, CustomerId, Subscription, SubscriptionStatus, Transaction, TransactionId,
    TransactionStatus,
};

/// Hard cap on transaction listings
pub const TRANSACTION_PAGE_LIMIT: usize = 50;

/// Record store trait (Strategy pattern)
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ---- customers -------------------------------------------------------

    /// Persist a new customer
    async fn insert_customer(&self, customer: &Customer) -> Result<()>;

    /// Customers registered under an email, newest first
    async fn customers_by_email(&self, email: &str) -> Result<Vec<Customer>>;

    // ---- subscriptions ---------------------------------------------------

    /// Persist a new subscription row
    async fn insert_subscription(&self, subscription: &Subscription) -> Result<()>;

    /// The customer's subscription created for a given checkout session
    async fn subscription_for_session(
        &self,
        customer_id: &CustomerId,
        session_id: &str,
    ) -> Result<Option<Subscription>>;

    /// The customer's most recently created subscription, any status
    async fn current_subscription(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<Subscription>>;

    /// The customer's most recent `active` subscription whose period ends after `now`
    async fn active_subscription(
        &self,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>>;

    /// Look up a subscription by the processor's subscription id
    async fn subscription_by_processor_id(
        &self,
        processor_subscription_id: &str,
    ) -> Result<Option<Subscription>>;

    /// Overwrite the mutable fields of a subscription row, provided the stored
    /// row is still in the `expected` status.
    ///
    /// Returns `false` when no row with that id exists or another writer moved
    /// it to a different status first.
    async fn update_subscription(
        &self,
        subscription: &Subscription,
        expected: SubscriptionStatus,
    ) -> Result<bool>;

    // ---- transactions ----------------------------------------------------

    /// Persist a new transaction
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<()>;

    /// Fetch a transaction by id
    async fn transaction(&self, id: &TransactionId) -> Result<Option<Transaction>>;

    /// Set a transaction's status. Returns `false` when no row matched.
    async fn update_transaction_status(
        &self,
        id: &TransactionId,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// The customer's transactions, newest first, at most `limit`
    async fn transactions_for(
        &self,
        customer_id: &CustomerId,
        limit: usize,
    ) -> Result<Vec<Transaction>>;

    // ---- housekeeping ----------------------------------------------------

    /// Check the store is reachable
    async fn health_check(&self) -> bool;

    /// Store backend name
    fn name(&self) -> &str;
}
