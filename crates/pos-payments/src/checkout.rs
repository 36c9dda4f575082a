//! Stripe Checkout Integration
//!
//! The Payment Session Client for subscriptions: creates hosted checkout
//! sessions and reads back their payment/completion state.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionId, CheckoutSessionMode,
    CheckoutSessionPaymentStatus, CheckoutSessionStatus, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionLineItemsPriceDataRecurring,
    CreateCheckoutSessionLineItemsPriceDataRecurringInterval, Currency,
};

use pos_core::{CustomerId, Plan};

use crate::error::{PaymentError, Result};

/// Metadata key carrying our customer id through the processor
pub const CUSTOMER_ID_METADATA: &str = "customer_id";

/// Processor-side payment state of a checkout session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl PaymentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Unpaid => "unpaid",
            Self::NoPaymentRequired => "no_payment_required",
        }
    }
}

/// Processor-side completion state of a checkout session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Complete,
    Expired,
}

impl SessionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Complete => "complete",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the processor currently says about a checkout session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: String,
    pub payment_status: PaymentStatus,
    pub status: SessionStatus,

    /// Our customer id, read back from session metadata
    pub customer_id: Option<CustomerId>,

    /// Processor customer (`cus_...`)
    pub processor_customer_id: Option<String>,

    /// Processor subscription (`sub_...`)
    pub processor_subscription_id: Option<String>,
}

impl SessionSnapshot {
    /// The only input that may turn a subscription active
    pub fn is_paid_and_complete(&self) -> bool {
        self.payment_status == PaymentStatus::Paid && self.status == SessionStatus::Complete
    }
}

/// Request to create a checkout session
#[derive(Clone, Debug)]
pub struct CheckoutRequest {
    pub plan: Plan,
    pub customer_id: CustomerId,
    pub customer_email: String,

    /// URL to redirect after successful payment
    pub success_url: String,

    /// URL to redirect if checkout is cancelled
    pub cancel_url: String,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Processor session id (`cs_...`)
    pub id: String,

    /// URL to redirect the customer to
    pub checkout_url: String,
}

/// Payment Session Client (Strategy pattern)
///
/// `StripeClient` talks to Stripe; `MockCheckoutGateway` stands in for it in
/// tests and local runs.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    /// Create a hosted checkout session for a recurring plan
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession>;

    /// Read the current state of a checkout session
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSnapshot>;

    /// Gateway name
    fn name(&self) -> &str;
}

/// Pricing information
#[derive(Clone, Debug)]
pub struct PlanPricing {
    pub name: String,
    pub description: String,
    pub cents: i64,
}

impl PlanPricing {
    /// Fixed price descriptor for a plan
    pub fn for_plan(plan: Plan) -> Self {
        match plan {
            Plan::Base => Self {
                name: "POS Base".into(),
                description: "Unlimited NFC payments, POS app and transaction dashboard".into(),
                cents: 1900, // €19/month
            },
        }
    }
}

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    webhook_secret: String,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| PaymentError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;

        Ok(Self::new(&secret_key, &webhook_secret))
    }

    /// Get the webhook secret
    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }
}

/// Our view of a processor session; webhook events carry the same object
pub(crate) fn session_snapshot(session: &StripeCheckoutSession) -> SessionSnapshot {
    let payment_status = match session.payment_status {
        CheckoutSessionPaymentStatus::Paid => PaymentStatus::Paid,
        CheckoutSessionPaymentStatus::Unpaid => PaymentStatus::Unpaid,
        CheckoutSessionPaymentStatus::NoPaymentRequired => PaymentStatus::NoPaymentRequired,
    };
    let status = match session.status {
        Some(CheckoutSessionStatus::Complete) => SessionStatus::Complete,
        Some(CheckoutSessionStatus::Expired) => SessionStatus::Expired,
        Some(CheckoutSessionStatus::Open) | None => SessionStatus::Open,
    };

    SessionSnapshot {
        id: session.id.to_string(),
        payment_status,
        status,
        customer_id: session
            .metadata
            .as_ref()
            .and_then(|m| m.get(CUSTOMER_ID_METADATA))
            .filter(|id| !id.is_empty())
            .map(CustomerId::from_string),
        processor_customer_id: session.customer.as_ref().map(|c| c.id().to_string()),
        processor_subscription_id: session.subscription.as_ref().map(|s| s.id().to_string()),
    }
}

#[async_trait]
impl CheckoutGateway for StripeClient {
    /// Create a Stripe Checkout session (Hosted approach)
    ///
    /// Returns a URL to redirect the customer to Stripe's hosted checkout page.
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        let pricing = PlanPricing::for_plan(request.plan);

        let mut params = CreateCheckoutSession::new();
        params.customer_email = Some(&request.customer_email);
        params.client_reference_id = Some(request.customer_id.as_str());
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.mode = Some(CheckoutSessionMode::Subscription);

        // Reconciliation reads the customer back out of these
        let mut metadata = HashMap::new();
        metadata.insert("plan".to_string(), request.plan.as_str().to_string());
        metadata.insert(
            CUSTOMER_ID_METADATA.to_string(),
            request.customer_id.to_string(),
        );
        params.metadata = Some(metadata);

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::EUR,
                unit_amount: Some(pricing.cents),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: pricing.name.clone(),
                    description: Some(pricing.description.clone()),
                    ..Default::default()
                }),
                recurring: Some(CreateCheckoutSessionLineItemsPriceDataRecurring {
                    interval: CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Month,
                    interval_count: Some(1),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::RemoteService(e.to_string()))?;

        let checkout_url = session
            .url
            .ok_or_else(|| PaymentError::RemoteService("No checkout URL returned".into()))?;

        Ok(CheckoutSession {
            id: session.id.to_string(),
            checkout_url,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSnapshot> {
        let id: CheckoutSessionId = session_id
            .parse()
            .map_err(|_| PaymentError::Validation(format!("Malformed session id: {session_id}")))?;

        let session = StripeCheckoutSession::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| PaymentError::RemoteService(e.to_string()))?;

        Ok(session_snapshot(&session))
    }

    fn name(&self) -> &str {
        "stripe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_pricing() {
        let pricing = PlanPricing::for_plan(Plan::Base);
        assert_eq!(pricing.cents, 1900);
        assert_eq!(pricing.name, "POS Base");
    }

    #[test]
    fn test_activation_predicate() {
        let mut snapshot = SessionSnapshot {
            id: "cs_test_1".into(),
            payment_status: PaymentStatus::Paid,
            status: SessionStatus::Complete,
            customer_id: None,
            processor_customer_id: None,
            processor_subscription_id: None,
        };
        assert!(snapshot.is_paid_and_complete());

        snapshot.status = SessionStatus::Open;
        assert!(!snapshot.is_paid_and_complete());

        snapshot.status = SessionStatus::Complete;
        snapshot.payment_status = PaymentStatus::NoPaymentRequired;
        assert!(!snapshot.is_paid_and_complete());
    }

    #[tokio::test]
    async fn test_malformed_session_id_is_rejected_locally() {
        let client = StripeClient::new("sk_test_mock_key", "whsec_test");
        let err = client.retrieve_session("not-a-session").await.unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }
}
