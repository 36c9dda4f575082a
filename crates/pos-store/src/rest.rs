//! Hosted REST Record Store
//!
//! `RecordStore` over a PostgREST-compatible HTTP API (the interface Supabase
//! exposes for its Postgres tables). One table per collection:
//! `customers`, `subscriptions`, `transactions`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use pos_core::{
    Customer, CustomerId, RecordStore, Result, StoreError, Subscription, SubscriptionStatus,
    Transaction, TransactionId, TransactionStatus,
};

const CUSTOMERS: &str = "customers";
const SUBSCRIPTIONS: &str = "subscriptions";
const TRANSACTIONS: &str = "transactions";

/// REST store configuration
#[derive(Clone, Debug)]
pub struct RestStoreConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,

    /// Service API key, sent as both `apikey` and bearer token
    pub api_key: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl RestStoreConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout_secs: 10,
        }
    }
}

/// PostgREST-backed record store
pub struct RestRecordStore {
    client: Client,
    config: RestStoreConfig,
}

impl RestRecordStore {
    pub fn new(config: RestStoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, body = %body, "Record store request failed");

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(StoreError::Unavailable(format!("{status}: {body}")))
        } else {
            Err(StoreError::Rejected(format!("{status}: {body}")))
        }
    }

    async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<()> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(row);
        self.send(request).await?;
        Ok(())
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*")])
            .query(filters);
        let response = self.send(request).await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Option<T>> {
        let mut rows = self.select(table, filters).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }

    /// PATCH matching rows; returns how many rows changed
    async fn patch<T: Serialize + Sync>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        body: &T,
    ) -> Result<usize> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(filters)
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.send(request).await?;
        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(rows.len())
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn newest_first() -> (&'static str, String) {
    ("order", "created_at.desc".to_string())
}

fn limit(n: usize) -> (&'static str, String) {
    ("limit", n.to_string())
}

#[derive(Serialize)]
struct SubscriptionPatch<'a> {
    processor_customer_id: Option<&'a str>,
    processor_subscription_id: Option<&'a str>,
    status: SubscriptionStatus,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct TransactionStatusPatch {
    status: TransactionStatus,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        self.insert(CUSTOMERS, customer).await
    }

    async fn customers_by_email(&self, email: &str) -> Result<Vec<Customer>> {
        // Emails are stored lowercase; `ilike` would treat `_` and `%` as wildcards
        self.select(
            CUSTOMERS,
            &[("email", eq(email.trim().to_lowercase())), newest_first()],
        )
        .await
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.insert(SUBSCRIPTIONS, subscription).await
    }

    async fn subscription_for_session(
        &self,
        customer_id: &CustomerId,
        session_id: &str,
    ) -> Result<Option<Subscription>> {
        self.select_one(
            SUBSCRIPTIONS,
            &[
                ("customer_id", eq(customer_id)),
                ("processor_session_id", eq(session_id)),
                newest_first(),
                limit(1),
            ],
        )
        .await
    }

    async fn current_subscription(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<Subscription>> {
        self.select_one(
            SUBSCRIPTIONS,
            &[("customer_id", eq(customer_id)), newest_first(), limit(1)],
        )
        .await
    }

    async fn active_subscription(
        &self,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>> {
        self.select_one(
            SUBSCRIPTIONS,
            &[
                ("customer_id", eq(customer_id)),
                ("status", eq(SubscriptionStatus::Active)),
                ("period_end", format!("gt.{}", timestamp(now))),
                newest_first(),
                limit(1),
            ],
        )
        .await
    }

    async fn subscription_by_processor_id(
        &self,
        processor_subscription_id: &str,
    ) -> Result<Option<Subscription>> {
        self.select_one(
            SUBSCRIPTIONS,
            &[
                ("processor_subscription_id", eq(processor_subscription_id)),
                newest_first(),
                limit(1),
            ],
        )
        .await
    }

    async fn update_subscription(
        &self,
        subscription: &Subscription,
        expected: SubscriptionStatus,
    ) -> Result<bool> {
        let patch = SubscriptionPatch {
            processor_customer_id: subscription.processor_customer_id.as_deref(),
            processor_subscription_id: subscription.processor_subscription_id.as_deref(),
            status: subscription.status,
            period_start: subscription.period_start,
            period_end: subscription.period_end,
            updated_at: subscription.updated_at,
        };
        let changed = self
            .patch(
                SUBSCRIPTIONS,
                &[("id", eq(&subscription.id)), ("status", eq(expected))],
                &patch,
            )
            .await?;
        Ok(changed > 0)
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.insert(TRANSACTIONS, transaction).await
    }

    async fn transaction(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        self.select_one(TRANSACTIONS, &[("id", eq(id)), limit(1)]).await
    }

    async fn update_transaction_status(
        &self,
        id: &TransactionId,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self
            .patch(
                TRANSACTIONS,
                &[("id", eq(id))],
                &TransactionStatusPatch {
                    status,
                    updated_at: at,
                },
            )
            .await?;
        Ok(changed > 0)
    }

    async fn transactions_for(
        &self,
        customer_id: &CustomerId,
        max: usize,
    ) -> Result<Vec<Transaction>> {
        self.select(
            TRANSACTIONS,
            &[("customer_id", eq(customer_id)), newest_first(), limit(max)],
        )
        .await
    }

    async fn health_check(&self) -> bool {
        let request = self
            .client
            .get(self.table_url(CUSTOMERS))
            .query(&[("select", "id"), ("limit", "1")]);
        match self.send(request).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Record store health check failed: {}", e);
                false
            }
        }
    }

    fn name(&self) -> &str {
        "rest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pos_core::Plan;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store_at(server: &MockServer) -> RestRecordStore {
        RestRecordStore::new(RestStoreConfig::new(server.uri(), "service-key")).unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = RestStoreConfig::new("https://xyz.supabase.co/", "key");
        assert_eq!(config.base_url, "https://xyz.supabase.co");
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn test_table_url() {
        let store = RestRecordStore::new(RestStoreConfig::new("https://xyz.supabase.co", "key"))
            .unwrap();
        assert_eq!(
            store.table_url(TRANSACTIONS),
            "https://xyz.supabase.co/rest/v1/transactions"
        );
    }

    #[test]
    fn test_filter_helpers() {
        assert_eq!(eq(SubscriptionStatus::Active), "eq.active");
        let at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(at), "2026-01-02T03:04:05.000000Z");
    }

    #[tokio::test]
    async fn test_update_subscription_is_conditional_on_status() {
        let server = MockServer::start().await;
        let now = fixed_now();
        let mut sub = Subscription::pending(CustomerId::new(), "cs_1", Plan::Base, now);
        sub.activate(Some("cus_1".into()), Some("sub_1".into()), now);

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/subscriptions"))
            .and(query_param("id", format!("eq.{}", sub.id)))
            .and(query_param("status", "eq.pending"))
            .and(header("Prefer", "return=representation"))
            .and(header("apikey", "service-key"))
            .and(body_partial_json(json!({
                "status": "active",
                "processor_subscription_id": "sub_1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([sub])))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_at(&server).await;
        assert!(
            store
                .update_subscription(&sub, SubscriptionStatus::Pending)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_update_subscription_reports_no_match() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/subscriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let store = store_at(&server).await;
        let sub = Subscription::pending(CustomerId::new(), "cs_1", Plan::Base, fixed_now());
        assert!(
            !store
                .update_subscription(&sub, SubscriptionStatus::Pending)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_active_subscription_query_and_decoding() {
        let server = MockServer::start().await;
        let now = fixed_now();
        let customer = CustomerId::new();
        let mut sub = Subscription::pending(customer.clone(), "cs_live", Plan::Base, now);
        sub.activate(None, Some("sub_live".into()), now);

        Mock::given(method("GET"))
            .and(path("/rest/v1/subscriptions"))
            .and(query_param("select", "*"))
            .and(query_param("customer_id", format!("eq.{customer}")))
            .and(query_param("status", "eq.active"))
            .and(query_param("period_end", "gt.2026-03-01T12:00:00.000000Z"))
            .and(query_param("order", "created_at.desc"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([sub])))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_at(&server).await;
        let found = store.active_subscription(&customer, now).await.unwrap().unwrap();
        assert_eq!(found, sub);
    }

    #[tokio::test]
    async fn test_transactions_for_orders_and_limits() {
        let server = MockServer::start().await;
        let customer = CustomerId::new();
        let row = Transaction::new(
            TransactionId::new(),
            customer.clone(),
            "pi_simulated_1",
            2550,
            "simulated",
            "nfc_simulated",
            TransactionStatus::Completed,
            fixed_now(),
        );

        Mock::given(method("GET"))
            .and(path("/rest/v1/transactions"))
            .and(query_param("customer_id", format!("eq.{customer}")))
            .and(query_param("order", "created_at.desc"))
            .and(query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_at(&server).await;
        let rows = store.transactions_for(&customer, 50).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, dec!(25.50));
        assert_eq!(rows[0].status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_email_lookup_is_exact_and_lowercase() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/customers"))
            .and(query_param("email", "eq.bar_roma@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_at(&server).await;
        let found = store.customers_by_email(" Bar_Roma@Example.com").await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_status_codes_map_to_error_kinds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/transactions"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/transactions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = store_at(&server).await;
        let row = Transaction::new(
            TransactionId::new(),
            CustomerId::new(),
            "pi_simulated_2",
            100,
            "simulated",
            "nfc_simulated",
            TransactionStatus::Pending,
            fixed_now(),
        );
        let err = store.insert_transaction(&row).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));

        let err = store.transaction(&row.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_unreachable_store_is_unavailable() {
        let store = RestRecordStore::new(RestStoreConfig::new("http://127.0.0.1:9", "key"))
            .unwrap();
        let err = store.current_subscription(&CustomerId::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(!store.health_check().await);
    }
}
