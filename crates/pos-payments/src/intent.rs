//! Simulated Payment Intents
//!
//! The terminal has no card reader; intents are issued locally and only ever
//! confirmed by this process. The registry remembers every intent it issued so
//! confirmation can reject ids it never handed out, ids issued to another
//! customer, and double captures.
//!
//! ```text
//! created ──▶ awaiting_card ──▶ captured
//!    │              │
//!    └──────────────┴──────────▶ failed
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use pos_core::{CustomerId, TransactionId};

use crate::error::{PaymentError, Result};

/// Prefix of every simulated intent id
pub const INTENT_PREFIX: &str = "pi_simulated_";

/// Prefix of every simulated client secret
pub const SECRET_PREFIX: &str = "simulated_secret_";

/// Gateway name recorded on simulated transactions
pub const SIMULATED_GATEWAY: &str = "simulated";

/// Payment method recorded for a simulated tap
pub const NFC_PAYMENT_METHOD: &str = "nfc_simulated";

/// How long finished intents are remembered
pub const DEFAULT_INTENT_TTL_HOURS: i64 = 24;

/// Lifecycle of one payment attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentState {
    Created,
    AwaitingCard,
    Captured,
    Failed,
}

impl IntentState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AwaitingCard => "awaiting_card",
            Self::Captured => "captured",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Captured | Self::Failed)
    }

    /// Whether `self -> next` is an edge of the intent state machine
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::AwaitingCard | Self::Failed)
                | (Self::AwaitingCard, Self::Captured | Self::Failed)
        )
    }
}

/// One issued intent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub customer_id: CustomerId,
    pub amount_minor: i64,

    /// Transaction row this intent settles
    pub transaction_id: TransactionId,

    pub state: IntentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Set while a confirmation owns the intent
    confirming: bool,
}

/// Registry of intents issued by this terminal
pub struct SimulatedTerminal {
    intents: RwLock<HashMap<String, PaymentIntent>>,
    ttl: Duration,
}

impl Default for SimulatedTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTerminal {
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(DEFAULT_INTENT_TTL_HOURS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            intents: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn unknown(intent_id: &str) -> PaymentError {
        PaymentError::InvalidIntent(format!("Unknown payment intent: {intent_id}"))
    }

    /// Issue a fresh intent in `created`.
    ///
    /// Finished intents older than the TTL are forgotten on the way.
    pub fn issue(
        &self,
        customer_id: CustomerId,
        amount_minor: i64,
        now: DateTime<Utc>,
    ) -> PaymentIntent {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let intent = PaymentIntent {
            id: format!("{INTENT_PREFIX}{token}"),
            client_secret: format!("{SECRET_PREFIX}{token}"),
            customer_id,
            amount_minor,
            transaction_id: TransactionId::new(),
            state: IntentState::Created,
            created_at: now,
            updated_at: now,
            confirming: false,
        };

        let mut intents = self.intents.write().unwrap_or_else(PoisonError::into_inner);
        let cutoff = now - self.ttl;
        intents.retain(|_, i| !(i.state.is_terminal() && i.updated_at < cutoff));
        intents.insert(intent.id.clone(), intent.clone());

        intent
    }

    /// Move an intent along one edge of the state machine
    pub fn transition(
        &self,
        intent_id: &str,
        next: IntentState,
        now: DateTime<Utc>,
    ) -> Result<PaymentIntent> {
        let mut intents = self.intents.write().unwrap_or_else(PoisonError::into_inner);
        let intent = intents.get_mut(intent_id).ok_or_else(|| Self::unknown(intent_id))?;
        Self::advance(intent, next, now)
    }

    fn advance(
        intent: &mut PaymentIntent,
        next: IntentState,
        now: DateTime<Utc>,
    ) -> Result<PaymentIntent> {
        if !intent.state.can_transition_to(next) {
            return Err(PaymentError::InvalidIntent(format!(
                "Payment intent {} cannot go from {} to {}",
                intent.id,
                intent.state.as_str(),
                next.as_str()
            )));
        }

        intent.state = next;
        intent.confirming = false;
        intent.updated_at = now;
        Ok(intent.clone())
    }

    /// Take ownership of an `awaiting_card` intent for confirmation.
    ///
    /// Exactly one caller wins; the intent stays claimed until it is moved to
    /// `captured` or `failed`.
    pub fn claim(
        &self,
        intent_id: &str,
        customer_id: &CustomerId,
        amount_minor: i64,
    ) -> Result<PaymentIntent> {
        let mut intents = self.intents.write().unwrap_or_else(PoisonError::into_inner);
        let intent = intents
            .get_mut(intent_id)
            .filter(|i| &i.customer_id == customer_id)
            .ok_or_else(|| Self::unknown(intent_id))?;

        if intent.state != IntentState::AwaitingCard || intent.confirming {
            return Err(PaymentError::InvalidIntent(format!(
                "Payment intent {intent_id} is {} and cannot be confirmed",
                if intent.confirming { "being confirmed" } else { intent.state.as_str() }
            )));
        }
        if intent.amount_minor != amount_minor {
            return Err(PaymentError::Validation(format!(
                "Amount {amount_minor} does not match the {} the intent was created for",
                intent.amount_minor
            )));
        }

        intent.confirming = true;
        Ok(intent.clone())
    }

    /// Abort an intent that has not been captured.
    ///
    /// Checked and applied under one write lock, so an abort and a claim on
    /// the same intent never both succeed.
    pub fn abort(
        &self,
        intent_id: &str,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<PaymentIntent> {
        let mut intents = self.intents.write().unwrap_or_else(PoisonError::into_inner);
        let intent = intents
            .get_mut(intent_id)
            .filter(|i| &i.customer_id == customer_id)
            .ok_or_else(|| Self::unknown(intent_id))?;

        if intent.confirming {
            return Err(PaymentError::InvalidIntent(format!(
                "Payment intent {intent_id} is being confirmed"
            )));
        }
        Self::advance(intent, IntentState::Failed, now)
    }

    /// Look up an intent
    pub fn get(&self, intent_id: &str) -> Option<PaymentIntent> {
        self.intents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(intent_id)
            .cloned()
    }

    /// Number of intents currently remembered
    pub fn len(&self) -> usize {
        self.intents.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn awaiting(
        terminal: &SimulatedTerminal,
        customer: &CustomerId,
        amount: i64,
    ) -> PaymentIntent {
        let now = Utc::now();
        let intent = terminal.issue(customer.clone(), amount, now);
        terminal
            .transition(&intent.id, IntentState::AwaitingCard, now)
            .unwrap()
    }

    #[test]
    fn test_issued_ids_are_prefixed_and_unique() {
        let terminal = SimulatedTerminal::new();
        let customer = CustomerId::new();
        let a = terminal.issue(customer.clone(), 100, Utc::now());
        let b = terminal.issue(customer, 100, Utc::now());

        assert!(a.id.starts_with(INTENT_PREFIX));
        assert!(a.client_secret.starts_with(SECRET_PREFIX));
        assert_ne!(a.id, b.id);
        assert_ne!(a.transaction_id, b.transaction_id);
        assert_eq!(a.state, IntentState::Created);
    }

    #[test]
    fn test_state_machine_edges() {
        use IntentState::*;
        assert!(Created.can_transition_to(AwaitingCard));
        assert!(Created.can_transition_to(Failed));
        assert!(AwaitingCard.can_transition_to(Captured));
        assert!(!Created.can_transition_to(Captured));
        assert!(!Captured.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(AwaitingCard));
    }

    #[test]
    fn test_claim_rejects_unknown_and_foreign_intents() {
        let terminal = SimulatedTerminal::new();
        let owner = CustomerId::new();
        let intent = awaiting(&terminal, &owner, 1000);

        let err = terminal.claim("pi_simulated_nope", &owner, 1000).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidIntent(_)));

        let err = terminal.claim(&intent.id, &CustomerId::new(), 1000).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidIntent(_)));
    }

    #[test]
    fn test_claim_checks_amount_and_is_exclusive() {
        let terminal = SimulatedTerminal::new();
        let owner = CustomerId::new();
        let intent = awaiting(&terminal, &owner, 1000);

        let err = terminal.claim(&intent.id, &owner, 999).unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));

        terminal.claim(&intent.id, &owner, 1000).unwrap();
        let err = terminal.claim(&intent.id, &owner, 1000).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidIntent(_)));

        terminal
            .transition(&intent.id, IntentState::Captured, Utc::now())
            .unwrap();
        assert!(terminal.claim(&intent.id, &owner, 1000).is_err());
    }

    #[test]
    fn test_abort_only_before_capture() {
        let terminal = SimulatedTerminal::new();
        let owner = CustomerId::new();
        let intent = awaiting(&terminal, &owner, 500);

        let aborted = terminal.abort(&intent.id, &owner, Utc::now()).unwrap();
        assert_eq!(aborted.state, IntentState::Failed);
        assert!(terminal.abort(&intent.id, &owner, Utc::now()).is_err());
    }

    #[test]
    fn test_abort_and_claim_exclude_each_other() {
        let terminal = SimulatedTerminal::new();
        let owner = CustomerId::new();

        let claimed = awaiting(&terminal, &owner, 700);
        terminal.claim(&claimed.id, &owner, 700).unwrap();
        let err = terminal.abort(&claimed.id, &owner, Utc::now()).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidIntent(_)));
        assert_eq!(terminal.get(&claimed.id).unwrap().state, IntentState::AwaitingCard);

        let aborted = awaiting(&terminal, &owner, 700);
        terminal.abort(&aborted.id, &owner, Utc::now()).unwrap();
        let err = terminal.claim(&aborted.id, &owner, 700).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidIntent(_)));
    }

    #[test]
    fn test_finished_intents_expire() {
        let terminal = SimulatedTerminal::with_ttl(Duration::minutes(10));
        let owner = CustomerId::new();
        let start = Utc::now();

        let old = terminal.issue(owner.clone(), 100, start);
        terminal.transition(&old.id, IntentState::Failed, start).unwrap();
        let open = terminal.issue(owner.clone(), 100, start);

        terminal.issue(owner, 100, start + Duration::minutes(11));
        assert!(terminal.get(&old.id).is_none());
        assert!(terminal.get(&open.id).is_some());
        assert_eq!(terminal.len(), 2);
    }
}
