//! Mock Checkout Gateway
//!
//! For testing and local runs without processor credentials. Sessions start
//! `open`/`unpaid`; tests drive them to completion with [`MockCheckoutGateway::complete`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::checkout::{
    CheckoutGateway, CheckoutRequest, CheckoutSession, PaymentStatus, SessionSnapshot,
    SessionStatus,
};
use crate::error::{PaymentError, Result};

/// In-memory stand-in for the hosted checkout processor
pub struct MockCheckoutGateway {
    sessions: RwLock<HashMap<String, SessionSnapshot>>,
    counter: AtomicU64,
    failing: AtomicBool,
}

impl Default for MockCheckoutGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCheckoutGateway {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            counter: AtomicU64::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail like an unreachable processor
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn ensure_up(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PaymentError::RemoteService("mock processor unavailable".into()))
        } else {
            Ok(())
        }
    }

    /// Simulate the customer paying: session becomes `paid` + `complete`
    pub async fn complete(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.set_state(session_id, PaymentStatus::Paid, SessionStatus::Complete)
            .await
    }

    /// Force an arbitrary session state
    pub async fn set_state(
        &self,
        session_id: &str,
        payment_status: PaymentStatus,
        status: SessionStatus,
    ) -> Option<SessionSnapshot> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id)?;
        session.payment_status = payment_status;
        session.status = status;
        if status == SessionStatus::Complete {
            let n = self.counter.load(Ordering::SeqCst);
            session
                .processor_customer_id
                .get_or_insert_with(|| format!("cus_mock_{n}"));
            session
                .processor_subscription_id
                .get_or_insert_with(|| format!("sub_mock_{n}"));
        }
        Some(session.clone())
    }

    /// Current state of a session, if it exists
    pub async fn session(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.sessions.read().await.get(session_id).cloned()
    }
}

#[async_trait]
impl CheckoutGateway for MockCheckoutGateway {
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        self.ensure_up()?;

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("cs_test_mock_{n}");

        self.sessions.write().await.insert(
            id.clone(),
            SessionSnapshot {
                id: id.clone(),
                payment_status: PaymentStatus::Unpaid,
                status: SessionStatus::Open,
                customer_id: Some(request.customer_id),
                processor_customer_id: None,
                processor_subscription_id: None,
            },
        );

        Ok(CheckoutSession {
            checkout_url: format!("https://checkout.mock/pay/{id}"),
            id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSnapshot> {
        self.ensure_up()?;
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| {
                PaymentError::RemoteService(format!("No such checkout session: {session_id}"))
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
