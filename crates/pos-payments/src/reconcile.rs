//! Subscription Reconciliation
//!
//! Brings a customer's subscription row into agreement with the processor's
//! checkout session. Two independent triggers feed the same activation step:
//!
//! ```text
//!   browser poll ──▶ reconcile_by_session ──┐
//!                                           ├──▶ activate ──▶ RecordStore
//!   processor push ─▶ reconcile_by_webhook ─┘
//! ```
//!
//! Both paths only activate on a session that is `paid` and `complete`,
//! activation is idempotent and `canceled` is terminal, so the end state is the
//! same whichever path arrives first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pos_core::{
    Activation, Customer, CustomerId, Plan, RecordStore, Subscription, SubscriptionStatus,
};

use crate::checkout::{CheckoutGateway, CheckoutRequest};
use crate::error::{PaymentError, Result};
use crate::webhook::{WebhookEvent, WebhookVerifier};

/// Redirect targets for the hosted checkout page
#[derive(Clone, Debug)]
pub struct CheckoutUrls {
    public_url: String,
}

impl CheckoutUrls {
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Return URL after payment; the processor fills in `{CHECKOUT_SESSION_ID}`
    pub fn success_url(&self, customer_id: &CustomerId) -> String {
        format!(
            "{}/pricing?session_id={{CHECKOUT_SESSION_ID}}&customer_id={customer_id}",
            self.public_url
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/pricing?canceled=true", self.public_url)
    }
}

/// Sign-up details for a new subscription
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitiateRequest {
    pub business_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Result of starting a checkout
#[derive(Clone, Debug)]
pub struct Initiated {
    pub customer_id: CustomerId,
    pub session_id: String,
    pub checkout_url: String,
}

/// Result of a poll
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCheck {
    /// `active`, `canceled`, or the processor's session status
    pub status: String,
    pub activation: Option<Activation>,
}

impl SessionCheck {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active.as_str()
    }
}

/// What the customer is currently entitled to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionSummary {
    pub has_subscription: bool,
    pub plan: Option<Plan>,
    pub status: Option<SubscriptionStatus>,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Effect of one webhook delivery
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    Activated { customer_id: CustomerId },
    AlreadyActive { customer_id: CustomerId },
    Canceled { customer_id: CustomerId },

    /// Verified and acknowledged without touching any row
    Ignored { event_type: String },
}

/// Conditional-write retries before a cancellation gives up
const CANCEL_ATTEMPTS: usize = 3;

/// Subscription reconciliation engine
pub struct SubscriptionEngine {
    store: Arc<dyn RecordStore>,
    gateway: Arc<dyn CheckoutGateway>,
    verifier: WebhookVerifier,
    urls: CheckoutUrls,
}

fn validate(request: &InitiateRequest) -> Result<()> {
    if request.business_name.trim().is_empty() {
        return Err(PaymentError::Validation("Business name is required".into()));
    }

    let email = request.email.trim();
    let plausible = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    });
    if !plausible {
        return Err(PaymentError::Validation(format!("Invalid email address: {email}")));
    }

    Ok(())
}

impl SubscriptionEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn CheckoutGateway>,
        verifier: WebhookVerifier,
        urls: CheckoutUrls,
    ) -> Self {
        Self {
            store,
            gateway,
            verifier,
            urls,
        }
    }

    /// Register a customer and open a hosted checkout for the Base plan.
    ///
    /// Nothing is asked of the processor until the customer row is stored; a
    /// processor failure afterwards leaves that row in place.
    pub async fn initiate(&self, request: InitiateRequest) -> Result<Initiated> {
        validate(&request)?;

        let email = request.email.trim().to_string();
        match self.store.customers_by_email(&email).await {
            Ok(existing) if !existing.is_empty() => {
                let ids: Vec<&str> = existing.iter().map(|c| c.id.as_str()).collect();
                tracing::warn!(
                    email = %email,
                    existing = ?ids,
                    "Email already registered; creating another customer"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Duplicate check skipped"),
        }

        let customer = Customer::new(request.business_name.trim(), email, request.phone);
        self.store.insert_customer(&customer).await?;

        let plan = Plan::Base;
        let session = self
            .gateway
            .create_checkout_session(CheckoutRequest {
                plan,
                customer_id: customer.id.clone(),
                customer_email: customer.email.clone(),
                success_url: self.urls.success_url(&customer.id),
                cancel_url: self.urls.cancel_url(),
            })
            .await
            .inspect_err(|e| {
                tracing::error!(
                    customer_id = %customer.id,
                    error = %e,
                    "Checkout session creation failed"
                );
            })?;

        let subscription =
            Subscription::pending(customer.id.clone(), &session.id, plan, Utc::now());
        self.store.insert_subscription(&subscription).await?;

        tracing::info!(
            customer_id = %customer.id,
            session_id = %session.id,
            gateway = self.gateway.name(),
            "Checkout initiated"
        );

        Ok(Initiated {
            customer_id: customer.id,
            session_id: session.id,
            checkout_url: session.checkout_url,
        })
    }

    /// Poll path: read the session from the processor and activate on payment.
    ///
    /// Returns the processor's session status unchanged while it is unpaid.
    pub async fn reconcile_by_session(
        &self,
        session_id: &str,
        customer_id: &CustomerId,
    ) -> Result<SessionCheck> {
        if session_id.trim().is_empty() || customer_id.as_str().trim().is_empty() {
            return Err(PaymentError::Validation(
                "session_id and customer_id are required".into(),
            ));
        }

        let session = self.gateway.retrieve_session(session_id).await?;

        if session.customer_id.as_ref().is_some_and(|owner| owner != customer_id) {
            tracing::warn!(
                session_id,
                customer_id = %customer_id,
                "Session belongs to another customer"
            );
            return Err(PaymentError::NotFound(format!(
                "No checkout session {session_id} for this customer"
            )));
        }

        if !session.is_paid_and_complete() {
            tracing::debug!(
                session_id,
                payment_status = session.payment_status.as_str(),
                status = %session.status,
                "Session not paid yet"
            );
            return Ok(SessionCheck {
                status: session.status.to_string(),
                activation: None,
            });
        }

        let activation = self
            .activate(
                customer_id,
                &session.id,
                session.processor_customer_id,
                session.processor_subscription_id,
                Utc::now(),
            )
            .await?;

        let status = match activation {
            Activation::Refused => SubscriptionStatus::Canceled,
            Activation::Activated | Activation::AlreadyActive => SubscriptionStatus::Active,
        };

        Ok(SessionCheck {
            status: status.to_string(),
            activation: Some(activation),
        })
    }

    /// Push path: verify, parse and apply one processor event.
    ///
    /// A missing or invalid signature rejects the delivery before any read or
    /// write.
    pub async fn reconcile_by_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome> {
        let now = Utc::now();
        let signature = signature.ok_or_else(|| {
            PaymentError::WebhookSignature("missing stripe-signature header".into())
        })?;
        let event = self.verifier.construct_event(payload, signature)?;

        match event {
            WebhookEvent::SessionCompleted { event_id, session } => {
                tracing::info!(
                    event_id = %event_id,
                    session_id = %session.id,
                    "Processing checkout completion"
                );

                if !session.is_paid_and_complete() {
                    tracing::info!(
                        session_id = %session.id,
                        payment_status = session.payment_status.as_str(),
                        "Checkout completed without payment; waiting for async payment"
                    );
                    return Ok(WebhookOutcome::Ignored {
                        event_type: "checkout.session.completed".into(),
                    });
                }

                let Some(customer_id) = session.customer_id.clone() else {
                    tracing::warn!(
                        session_id = %session.id,
                        "Session carries no customer_id metadata"
                    );
                    return Ok(WebhookOutcome::Ignored {
                        event_type: "checkout.session.completed".into(),
                    });
                };

                let activation = self
                    .activate(
                        &customer_id,
                        &session.id,
                        session.processor_customer_id,
                        session.processor_subscription_id,
                        now,
                    )
                    .await?;

                Ok(match activation {
                    Activation::Activated => WebhookOutcome::Activated { customer_id },
                    Activation::AlreadyActive => WebhookOutcome::AlreadyActive { customer_id },
                    Activation::Refused => WebhookOutcome::Ignored {
                        event_type: "checkout.session.completed".into(),
                    },
                })
            }

            WebhookEvent::SubscriptionCancelled {
                event_id,
                subscription_id,
            } => {
                let customer_id = self.cancel(&event_id, &subscription_id, now).await?;
                Ok(match customer_id {
                    Some(customer_id) => WebhookOutcome::Canceled { customer_id },
                    None => WebhookOutcome::Ignored {
                        event_type: "customer.subscription.deleted".into(),
                    },
                })
            }

            WebhookEvent::SessionExpired { event_id, session_id } => {
                tracing::info!(
                    event_id = %event_id,
                    session_id = %session_id,
                    "Checkout session expired"
                );
                Ok(WebhookOutcome::Ignored {
                    event_type: "checkout.session.expired".into(),
                })
            }

            WebhookEvent::Other { event_id, event_type } => {
                tracing::debug!(
                    event_id = %event_id,
                    event_type = %event_type,
                    "Unhandled webhook event"
                );
                Ok(WebhookOutcome::Ignored { event_type })
            }
        }
    }

    /// Current entitlement: the latest active subscription still inside its window
    pub async fn status(&self, customer_id: &CustomerId) -> Result<SubscriptionSummary> {
        let active = self
            .store
            .active_subscription(customer_id, Utc::now())
            .await?;

        Ok(match active {
            Some(subscription) => SubscriptionSummary {
                has_subscription: true,
                plan: Some(subscription.plan),
                status: Some(subscription.status),
                current_period_end: Some(subscription.period_end),
            },
            None => SubscriptionSummary {
                has_subscription: false,
                plan: None,
                status: None,
                current_period_end: None,
            },
        })
    }

    /// Shared activation step of both reconcile paths
    async fn activate(
        &self,
        customer_id: &CustomerId,
        session_id: &str,
        processor_customer_id: Option<String>,
        processor_subscription_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Activation> {
        let subscription = match self
            .store
            .subscription_for_session(customer_id, session_id)
            .await?
        {
            Some(subscription) => Some(subscription),
            None => self.store.current_subscription(customer_id).await?,
        };
        let mut subscription = subscription.ok_or_else(|| {
            PaymentError::NotFound(format!("No subscription for customer {customer_id}"))
        })?;

        let read_as = subscription.status;
        match subscription.activate(processor_customer_id, processor_subscription_id, now) {
            Activation::Refused => {
                tracing::warn!(
                    customer_id = %customer_id,
                    subscription_id = %subscription.id,
                    "Subscription is canceled; not reactivating"
                );
                Ok(Activation::Refused)
            }
            Activation::AlreadyActive => {
                tracing::debug!(
                    customer_id = %customer_id,
                    subscription_id = %subscription.id,
                    "Subscription already active"
                );
                Ok(Activation::AlreadyActive)
            }
            Activation::Activated => {
                if self
                    .store
                    .update_subscription(&subscription, read_as)
                    .await?
                {
                    tracing::info!(
                        customer_id = %customer_id,
                        subscription_id = %subscription.id,
                        period_end = %subscription.period_end,
                        "Subscription activated"
                    );
                    return Ok(Activation::Activated);
                }
                self.settle_lost_activation(customer_id, &subscription).await
            }
        }
    }

    /// Another writer moved the row between our read and write; report
    /// whatever it left behind
    async fn settle_lost_activation(
        &self,
        customer_id: &CustomerId,
        attempted: &Subscription,
    ) -> Result<Activation> {
        let current = self
            .store
            .current_subscription(customer_id)
            .await?
            .filter(|s| s.id == attempted.id)
            .ok_or_else(|| {
                PaymentError::NotFound(format!(
                    "Subscription {} disappeared during activation",
                    attempted.id
                ))
            })?;

        tracing::info!(
            customer_id = %customer_id,
            subscription_id = %current.id,
            status = %current.status,
            "Subscription changed while activating; keeping stored state"
        );

        Ok(match current.status {
            SubscriptionStatus::Canceled => Activation::Refused,
            SubscriptionStatus::Active => Activation::AlreadyActive,
            SubscriptionStatus::Pending => {
                return Err(PaymentError::Persistence(format!(
                    "Subscription {} could not be activated",
                    current.id
                )));
            }
        })
    }

    /// Mark the row behind a processor subscription canceled.
    ///
    /// Retries when a concurrent activation lands between the read and the
    /// conditional write. Returns the owning customer, or `None` for an
    /// unknown subscription.
    async fn cancel(
        &self,
        event_id: &str,
        subscription_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CustomerId>> {
        for _ in 0..CANCEL_ATTEMPTS {
            let Some(mut subscription) = self
                .store
                .subscription_by_processor_id(subscription_id)
                .await?
            else {
                tracing::warn!(
                    event_id,
                    subscription_id,
                    "Cancellation for unknown subscription"
                );
                return Ok(None);
            };

            let read_as = subscription.status;
            if !subscription.cancel(now) {
                return Ok(Some(subscription.customer_id));
            }
            if self
                .store
                .update_subscription(&subscription, read_as)
                .await?
            {
                tracing::info!(
                    customer_id = %subscription.customer_id,
                    subscription_id,
                    "Subscription canceled"
                );
                return Ok(Some(subscription.customer_id));
            }
        }

        Err(PaymentError::Persistence(format!(
            "Subscription {subscription_id} kept changing during cancellation"
        )))
    }
}
