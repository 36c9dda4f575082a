//! Memory store with failure and interleaving hooks for tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use pos_core::{
    Customer, CustomerId, RecordStore, Result, StoreError, Subscription, SubscriptionStatus,
    Transaction, TransactionId, TransactionStatus,
};
use pos_store::MemoryRecordStore;

/// Handles for a paused subscription write
pub struct Paused {
    /// Resolves once the write has been reached and is waiting
    pub reached: oneshot::Receiver<()>,
    /// Send to let the write continue
    pub release: oneshot::Sender<()>,
}

struct Gate {
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

#[derive(Default)]
pub struct HookedStore {
    pub inner: MemoryRecordStore,
    fail_row_reads: AtomicBool,
    gate: Mutex<Option<Gate>>,
}

impl HookedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `transaction()` time out while every other call works
    pub fn fail_row_reads(&self, fail: bool) {
        self.fail_row_reads.store(fail, Ordering::SeqCst);
    }

    /// Hold the next `update_subscription` call until released
    pub fn pause_next_subscription_write(&self) -> Paused {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(Gate {
            reached: reached_tx,
            release: release_rx,
        });
        Paused {
            reached: reached_rx,
            release: release_tx,
        }
    }
}

#[async_trait]
impl RecordStore for HookedStore {
    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        self.inner.insert_customer(customer).await
    }

    async fn customers_by_email(&self, email: &str) -> Result<Vec<Customer>> {
        self.inner.customers_by_email(email).await
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.inner.insert_subscription(subscription).await
    }

    async fn subscription_for_session(
        &self,
        customer_id: &CustomerId,
        session_id: &str,
    ) -> Result<Option<Subscription>> {
        self.inner.subscription_for_session(customer_id, session_id).await
    }

    async fn current_subscription(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<Subscription>> {
        self.inner.current_subscription(customer_id).await
    }

    async fn active_subscription(
        &self,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>> {
        self.inner.active_subscription(customer_id, now).await
    }

    async fn subscription_by_processor_id(
        &self,
        processor_subscription_id: &str,
    ) -> Result<Option<Subscription>> {
        self.inner
            .subscription_by_processor_id(processor_subscription_id)
            .await
    }

    async fn update_subscription(
        &self,
        subscription: &Subscription,
        expected: SubscriptionStatus,
    ) -> Result<bool> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.reached.send(());
            let _ = gate.release.await;
        }
        self.inner.update_subscription(subscription, expected).await
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.inner.insert_transaction(transaction).await
    }

    async fn transaction(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        if self.fail_row_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("read timeout".into()));
        }
        self.inner.transaction(id).await
    }

    async fn update_transaction_status(
        &self,
        id: &TransactionId,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner.update_transaction_status(id, status, at).await
    }

    async fn transactions_for(
        &self,
        customer_id: &CustomerId,
        limit: usize,
    ) -> Result<Vec<Transaction>> {
        self.inner.transactions_for(customer_id, limit).await
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }

    fn name(&self) -> &str {
        "hooked"
    }
}
