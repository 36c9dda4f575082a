//! HTTP API Types
//!
//! Request and response bodies shared by `pos-server` and the `pos-web`
//! front end. Every response carries a `success` flag; failures use
//! [`ErrorResponse`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{Transaction, TransactionStatus};

// ============================================================================
// Health
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    /// `connected` or `unreachable`
    pub database: String,
    /// `development` or `production`
    pub mode: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.into(),
        }
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub business_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSubscriptionResponse {
    pub success: bool,
    pub checkout_url: String,
    pub session_id: String,
    pub customer_id: String,
    /// Bearer token identifying the new customer on later calls
    pub access_token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckSessionQuery {
    pub session_id: String,
    pub customer_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckSessionResponse {
    pub success: bool,
    /// `active`, or the processor's raw session status while unpaid
    pub status: String,
    pub message: String,
}

impl CheckSessionResponse {
    pub fn is_active(&self) -> bool {
        self.success && self.status == "active"
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscriptionStatusResponse {
    pub success: bool,
    pub has_subscription: bool,
    pub plan: Option<String>,
    pub status: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub is_trial: bool,
}

// ============================================================================
// Payments
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatePaymentIntentRequest {
    /// Amount in minor units (cents)
    pub amount: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatePaymentIntentResponse {
    pub success: bool,
    pub client_secret: String,
    pub payment_intent_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
    /// Amount in minor units (cents)
    pub amount: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfirmPaymentResponse {
    pub success: bool,
    pub transaction: TransactionView,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CancelPaymentRequest {
    pub payment_intent_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub success: bool,
    pub transactions: Vec<TransactionView>,
    pub total: usize,
}

/// Transaction as shown to the terminal operator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: String,
    /// Major units, serialized as a decimal string (`"25.50"`)
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub payment_method: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Transaction> for TransactionView {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            amount: tx.amount,
            currency: tx.currency.clone(),
            status: tx.status,
            payment_method: tx.payment_method.clone(),
            timestamp: tx.updated_at,
        }
    }
}

// ============================================================================
// Webhooks
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CustomerId, TransactionId};
    use rust_decimal_macros::dec;

    #[test]
    fn test_transaction_view_amount_is_decimal_string() {
        let tx = Transaction::new(
            TransactionId::new(),
            CustomerId::new(),
            "pi_simulated_1",
            2550,
            "simulated",
            "nfc_simulated",
            TransactionStatus::Completed,
            Utc::now(),
        );
        let view = TransactionView::from(&tx);
        assert_eq!(view.amount, dec!(25.50));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["amount"], "25.50");
        assert_eq!(json["status"], "completed");
    }

    #[test]
    fn test_check_session_active() {
        let response = CheckSessionResponse {
            success: true,
            status: "active".into(),
            message: String::new(),
        };
        assert!(response.is_active());

        let response = CheckSessionResponse {
            success: true,
            status: "open".into(),
            message: String::new(),
        };
        assert!(!response.is_active());
    }
}
