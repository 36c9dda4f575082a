//! In-Memory Record Store
//!
//! For development and tests. Rows live in insertion order, so "most recent"
//! means "last inserted" when timestamps tie.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use pos_core::{
    Customer, CustomerId, RecordStore, Result, StoreError, Subscription, SubscriptionStatus,
    Transaction, TransactionId, TransactionStatus,
};

/// In-memory record store
pub struct MemoryRecordStore {
    customers: RwLock<Vec<Customer>>,
    subscriptions: RwLock<Vec<Subscription>>,
    transactions: RwLock<Vec<Transaction>>,

    /// When set, every call fails as if the store were unreachable
    offline: AtomicBool,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            customers: RwLock::new(Vec::new()),
            subscriptions: RwLock::new(Vec::new()),
            transactions: RwLock::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate an outage (or recovery) of the backing store
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".into()))
        } else {
            Ok(())
        }
    }

    /// Every subscription row, oldest first
    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.read().await.clone()
    }

    /// Every customer row, oldest first
    pub async fn customers(&self) -> Vec<Customer> {
        self.customers.read().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        self.ensure_online()?;
        self.customers.write().await.push(customer.clone());
        Ok(())
    }

    async fn customers_by_email(&self, email: &str) -> Result<Vec<Customer>> {
        self.ensure_online()?;
        let customers = self.customers.read().await;
        Ok(customers
            .iter()
            .rev()
            .filter(|c| c.email.eq_ignore_ascii_case(email))
            .cloned()
            .collect())
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.ensure_online()?;
        self.subscriptions.write().await.push(subscription.clone());
        Ok(())
    }

    async fn subscription_for_session(
        &self,
        customer_id: &CustomerId,
        session_id: &str,
    ) -> Result<Option<Subscription>> {
        self.ensure_online()?;
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .iter()
            .rev()
            .find(|s| &s.customer_id == customer_id && s.processor_session_id == session_id)
            .cloned())
    }

    async fn current_subscription(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<Subscription>> {
        self.ensure_online()?;
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .iter()
            .rev()
            .find(|s| &s.customer_id == customer_id)
            .cloned())
    }

    async fn active_subscription(
        &self,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>> {
        self.ensure_online()?;
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .iter()
            .rev()
            .find(|s| &s.customer_id == customer_id && s.is_current(now))
            .cloned())
    }

    async fn subscription_by_processor_id(
        &self,
        processor_subscription_id: &str,
    ) -> Result<Option<Subscription>> {
        self.ensure_online()?;
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .iter()
            .rev()
            .find(|s| s.processor_subscription_id.as_deref() == Some(processor_subscription_id))
            .cloned())
    }

    async fn update_subscription(
        &self,
        subscription: &Subscription,
        expected: SubscriptionStatus,
    ) -> Result<bool> {
        self.ensure_online()?;
        let mut subscriptions = self.subscriptions.write().await;
        match subscriptions
            .iter_mut()
            .find(|s| s.id == subscription.id && s.status == expected)
        {
            Some(row) => {
                *row = subscription.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.ensure_online()?;
        self.transactions.write().await.push(transaction.clone());
        Ok(())
    }

    async fn transaction(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        self.ensure_online()?;
        let transactions = self.transactions.read().await;
        Ok(transactions.iter().find(|t| &t.id == id).cloned())
    }

    async fn update_transaction_status(
        &self,
        id: &TransactionId,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.ensure_online()?;
        let mut transactions = self.transactions.write().await;
        match transactions.iter_mut().find(|t| &t.id == id) {
            Some(row) => {
                row.status = status;
                row.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn transactions_for(
        &self,
        customer_id: &CustomerId,
        limit: usize,
    ) -> Result<Vec<Transaction>> {
        self.ensure_online()?;
        let transactions = self.transactions.read().await;
        let mut rows: Vec<Transaction> = transactions
            .iter()
            .filter(|t| &t.customer_id == customer_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps; reverse for newest first
        rows.sort_by_key(|t| t.created_at);
        rows.reverse();
        rows.truncate(limit);
        Ok(rows)
    }

    async fn health_check(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pos_core::Plan;
    use rust_decimal_macros::dec;

    fn transaction(customer_id: &CustomerId, minor: i64, at: DateTime<Utc>) -> Transaction {
        Transaction::new(
            TransactionId::new(),
            customer_id.clone(),
            format!("pi_simulated_{minor}"),
            minor,
            "simulated",
            "nfc_simulated",
            TransactionStatus::Pending,
            at,
        )
    }

    #[tokio::test]
    async fn test_current_subscription_is_latest() {
        let store = MemoryRecordStore::new();
        let customer = CustomerId::new();
        let now = Utc::now();

        store
            .insert_subscription(&Subscription::pending(customer.clone(), "cs_1", Plan::Base, now))
            .await
            .unwrap();
        store
            .insert_subscription(&Subscription::pending(customer.clone(), "cs_2", Plan::Base, now))
            .await
            .unwrap();

        let current = store.current_subscription(&customer).await.unwrap().unwrap();
        assert_eq!(current.processor_session_id, "cs_2");

        let first = store
            .subscription_for_session(&customer, "cs_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.processor_session_id, "cs_1");

        let other = CustomerId::new();
        assert!(store.subscription_for_session(&other, "cs_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_active_subscription_filters_pending_and_expired() {
        let store = MemoryRecordStore::new();
        let customer = CustomerId::new();
        let now = Utc::now();

        let mut expired = Subscription::pending(customer.clone(), "cs_old", Plan::Base, now);
        expired.activate(None, None, now - Duration::days(60));
        store.insert_subscription(&expired).await.unwrap();
        let pending = Subscription::pending(customer.clone(), "cs_new", Plan::Base, now);
        store.insert_subscription(&pending).await.unwrap();

        assert!(store.active_subscription(&customer, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_subscription_reports_match() {
        let store = MemoryRecordStore::new();
        let now = Utc::now();
        let mut sub = Subscription::pending(CustomerId::new(), "cs_1", Plan::Base, now);

        let pending = SubscriptionStatus::Pending;
        assert!(!store.update_subscription(&sub, pending).await.unwrap());

        store.insert_subscription(&sub).await.unwrap();
        sub.activate(Some("cus_9".into()), Some("sub_9".into()), now);
        assert!(store.update_subscription(&sub, pending).await.unwrap());

        let found = store.subscription_by_processor_id("sub_9").await.unwrap().unwrap();
        assert_eq!(found.id, sub.id);
    }

    #[tokio::test]
    async fn test_update_subscription_refuses_moved_row() {
        let store = MemoryRecordStore::new();
        let now = Utc::now();
        let sub = Subscription::pending(CustomerId::new(), "cs_1", Plan::Base, now);
        store.insert_subscription(&sub).await.unwrap();

        let mut canceled = sub.clone();
        canceled.cancel(now);
        assert!(
            store
                .update_subscription(&canceled, SubscriptionStatus::Pending)
                .await
                .unwrap()
        );

        // A writer still holding the pending copy must not resurrect the row
        let mut stale = sub.clone();
        stale.activate(None, Some("sub_9".into()), now);
        assert!(
            !store
                .update_subscription(&stale, SubscriptionStatus::Pending)
                .await
                .unwrap()
        );

        let stored = store.current_subscription(&sub.customer_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn test_transactions_newest_first_and_capped() {
        let store = MemoryRecordStore::new();
        let customer = CustomerId::new();
        let start = Utc::now();

        for i in 0..5 {
            let tx = transaction(&customer, 100 * (i + 1), start + Duration::seconds(i));
            store.insert_transaction(&tx).await.unwrap();
        }
        store
            .insert_transaction(&transaction(&CustomerId::new(), 999, start))
            .await
            .unwrap();

        let rows = store.transactions_for(&customer, 3).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].amount, dec!(5.00));
        assert_eq!(rows[2].amount, dec!(3.00));
    }

    #[tokio::test]
    async fn test_update_transaction_status() {
        let store = MemoryRecordStore::new();
        let tx = transaction(&CustomerId::new(), 2550, Utc::now());

        assert!(
            !store
                .update_transaction_status(&tx.id, TransactionStatus::Completed, Utc::now())
                .await
                .unwrap()
        );

        store.insert_transaction(&tx).await.unwrap();
        assert!(
            store
                .update_transaction_status(&tx.id, TransactionStatus::Completed, Utc::now())
                .await
                .unwrap()
        );

        let row = store.transaction(&tx.id).await.unwrap().unwrap();
        assert_eq!(row.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_call() {
        let store = MemoryRecordStore::new();
        store.set_offline(true);

        let customer = Customer::new("Bar Roma", "roma@example.com", None);
        let err = store.insert_customer(&customer).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(!store.health_check().await);

        store.set_offline(false);
        store.insert_customer(&customer).await.unwrap();
        assert_eq!(store.customers_by_email("ROMA@example.com").await.unwrap().len(), 1);
    }
}
