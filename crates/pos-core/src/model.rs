//! Domain Records
//!
//! Customers, subscriptions and transactions as persisted in the record store.
//! Amounts are `rust_decimal::Decimal` in major currency units; they travel
//! over the wire as integer minor units (cents).

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of a subscription billing window
pub const BILLING_PERIOD_DAYS: i64 = 30;

/// Settlement currency for the terminal
pub const CURRENCY: &str = "eur";

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

record_id!(
    /// Customer identifier
    CustomerId
);
record_id!(
    /// Subscription row identifier
    SubscriptionId
);
record_id!(
    /// Transaction row identifier
    TransactionId
);

/// Convert integer minor units (cents) into major units
pub fn minor_to_major(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

// ============================================================================
// Customer
// ============================================================================

/// A merchant who signed up for the terminal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: String,
    pub business_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(
        business_name: impl Into<String>,
        email: impl Into<String>,
        phone: Option<String>,
    ) -> Self {
        Self {
            id: CustomerId::new(),
            email: email.into().trim().to_lowercase(),
            business_name: business_name.into(),
            phone: phone.filter(|p| !p.trim().is_empty()),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Subscription plan tiers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Base,
}

impl Plan {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
        }
    }
}

/// Lifecycle of a subscription row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Checkout started, payment not yet confirmed by the processor
    Pending,
    /// Processor confirmed payment for the session
    Active,
    /// Terminated by the processor; never reactivated
    Canceled,
}

impl SubscriptionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of applying an activation to a subscription
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    /// `pending -> active`; the billing window was opened
    Activated,
    /// Row was already active; only processor references were refreshed
    AlreadyActive,
    /// Row is canceled and stays canceled
    Refused,
}

/// A subscription record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub customer_id: CustomerId,

    /// Checkout session this row was created for
    pub processor_session_id: String,

    /// Processor-side customer (`cus_...`), known after activation
    #[serde(default)]
    pub processor_customer_id: Option<String>,

    /// Processor-side subscription (`sub_...`), known after activation
    #[serde(default)]
    pub processor_subscription_id: Option<String>,

    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// New `pending` row with a placeholder billing window starting at `now`
    pub fn pending(
        customer_id: CustomerId,
        processor_session_id: impl Into<String>,
        plan: Plan,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            customer_id,
            processor_session_id: processor_session_id.into(),
            processor_customer_id: None,
            processor_subscription_id: None,
            plan,
            status: SubscriptionStatus::Pending,
            period_start: now,
            period_end: now + Duration::days(BILLING_PERIOD_DAYS),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the subscription active.
    ///
    /// The billing window opens at the first activation only; repeated
    /// activations keep it and just refresh the processor references that
    /// were supplied. A canceled row is left untouched.
    pub fn activate(
        &mut self,
        processor_customer_id: Option<String>,
        processor_subscription_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Activation {
        let outcome = match self.status {
            SubscriptionStatus::Canceled => return Activation::Refused,
            SubscriptionStatus::Active => Activation::AlreadyActive,
            SubscriptionStatus::Pending => {
                self.status = SubscriptionStatus::Active;
                self.period_start = now;
                self.period_end = now + Duration::days(BILLING_PERIOD_DAYS);
                Activation::Activated
            }
        };

        if processor_customer_id.is_some() {
            self.processor_customer_id = processor_customer_id;
        }
        if processor_subscription_id.is_some() {
            self.processor_subscription_id = processor_subscription_id;
        }
        self.updated_at = now;

        outcome
    }

    /// Mark the subscription canceled. Returns `false` if it already was.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == SubscriptionStatus::Canceled {
            return false;
        }
        self.status = SubscriptionStatus::Canceled;
        self.updated_at = now;
        true
    }

    /// Active and inside its billing window
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.period_end > now
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// Lifecycle of a transaction row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A card payment taken on the terminal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub customer_id: CustomerId,

    /// Payment intent this row settles
    pub intent_id: String,

    /// Amount in major currency units
    pub amount: Decimal,

    pub currency: String,

    /// Gateway that processed the payment (e.g. `simulated`)
    pub gateway: String,

    /// How the card was presented (e.g. `nfc_simulated`)
    pub payment_method: String,

    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// New transaction in `status`, amount given in minor units
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TransactionId,
        customer_id: CustomerId,
        intent_id: impl Into<String>,
        amount_minor: i64,
        gateway: impl Into<String>,
        payment_method: impl Into<String>,
        status: TransactionStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_id,
            intent_id: intent_id.into(),
            amount: minor_to_major(amount_minor),
            currency: CURRENCY.into(),
            gateway: gateway.into(),
            payment_method: payment_method.into(),
            status,
            created_at: now,
            updated_at: now,
        }
    }
}
