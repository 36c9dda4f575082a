//! Stripe Webhook Handling
//!
//! Verifies the `stripe-signature` header with the processor's own webhook
//! helper and turns the typed event into the handful of events the
//! reconciliation engine reacts to.

use stripe::{Event, EventObject, EventType, Webhook, WebhookError};

use crate::checkout::{SessionSnapshot, session_snapshot};
use crate::error::{PaymentError, Result};

/// Parsed webhook event
#[derive(Clone, Debug)]
pub enum WebhookEvent {
    /// Checkout finished (`checkout.session.completed`) or a delayed payment
    /// for it cleared (`checkout.session.async_payment_succeeded`)
    SessionCompleted {
        event_id: String,
        session: SessionSnapshot,
    },

    /// Checkout abandoned until the processor expired it
    SessionExpired { event_id: String, session_id: String },

    /// Processor-side subscription ended (`customer.subscription.deleted`)
    SubscriptionCancelled {
        event_id: String,
        subscription_id: String,
    },

    /// Unhandled event type
    Other { event_id: String, event_type: String },
}

/// Webhook signature verifier
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verify a `stripe-signature` header against the raw body and decode it.
    ///
    /// A bad MAC, a malformed header or a timestamp outside the processor's
    /// tolerance window is a signature error; an authentic body we cannot
    /// decode is a parse error.
    pub fn construct_event(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent> {
        let payload = std::str::from_utf8(payload)
            .map_err(|e| PaymentError::WebhookSignature(format!("body is not UTF-8: {e}")))?;

        let event = Webhook::construct_event(payload, signature, &self.secret).map_err(|e| match e {
            WebhookError::BadParse(e) => PaymentError::WebhookParse(e.to_string()),
            other => PaymentError::WebhookSignature(other.to_string()),
        })?;

        parse_event(&event)
    }
}

/// Map a verified processor event onto our event type
pub fn parse_event(event: &Event) -> Result<WebhookEvent> {
    let event_id = event.id.to_string();

    match event.type_ {
        EventType::CheckoutSessionCompleted | EventType::CheckoutSessionAsyncPaymentSucceeded => {
            if let EventObject::CheckoutSession(session) = &event.data.object {
                Ok(WebhookEvent::SessionCompleted {
                    event_id,
                    session: session_snapshot(session),
                })
            } else {
                Err(PaymentError::WebhookParse("Invalid checkout session data".into()))
            }
        }

        EventType::CheckoutSessionExpired => {
            if let EventObject::CheckoutSession(session) = &event.data.object {
                Ok(WebhookEvent::SessionExpired {
                    event_id,
                    session_id: session.id.to_string(),
                })
            } else {
                Err(PaymentError::WebhookParse("Invalid checkout session data".into()))
            }
        }

        EventType::CustomerSubscriptionDeleted => {
            if let EventObject::Subscription(sub) = &event.data.object {
                Ok(WebhookEvent::SubscriptionCancelled {
                    event_id,
                    subscription_id: sub.id.to_string(),
                })
            } else {
                Err(PaymentError::WebhookParse("Invalid subscription data".into()))
            }
        }

        other => Ok(WebhookEvent::Other {
            event_id,
            event_type: other.to_string(),
        }),
    }
}

/// Signed event bodies shaped like the processor's deliveries
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use chrono::Utc;
    use hmac::{Hmac, Mac};
    use serde_json::{Value, json};
    use sha2::Sha256;

    const CREATED: i64 = 1_767_225_600;

    /// `stripe-signature` header for `payload`, timestamped now
    pub fn sign(secret: &str, payload: &[u8]) -> String {
        sign_at(secret, payload, Utc::now().timestamp())
    }

    /// `stripe-signature` header for `payload` signed at `timestamp`
    pub fn sign_at(secret: &str, payload: &[u8], timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        let signature = hex::encode(mac.finalize().into_bytes());
        format!("t={timestamp},v1={signature}")
    }

    fn envelope(event_id: &str, event_type: &str, object: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": event_id,
            "object": "event",
            "api_version": null,
            "account": null,
            "created": CREATED,
            "livemode": false,
            "pending_webhooks": 1,
            "request": { "id": null, "idempotency_key": null },
            "type": event_type,
            "data": { "object": object }
        }))
        .expect("event fixture serializes")
    }

    /// Checkout session event; `customer_id` lands in the session metadata
    pub fn session_event(
        event_type: &str,
        session_id: &str,
        payment_status: &str,
        status: &str,
        customer_id: Option<&str>,
    ) -> Vec<u8> {
        let mut metadata = json!({ "plan": "base" });
        if let Some(customer_id) = customer_id {
            metadata["customer_id"] = json!(customer_id);
        }

        let session = json!({
            "id": session_id,
            "object": "checkout.session",
            "after_expiration": null,
            "allow_promotion_codes": null,
            "amount_subtotal": 1900,
            "amount_total": 1900,
            "automatic_tax": { "enabled": false, "liability": null, "status": null },
            "billing_address_collection": null,
            "cancel_url": "http://localhost:3000/pricing?canceled=true",
            "client_reference_id": customer_id,
            "client_secret": null,
            "consent": null,
            "consent_collection": null,
            "created": CREATED,
            "currency": "eur",
            "currency_conversion": null,
            "custom_fields": [],
            "custom_text": {
                "after_submit": null,
                "shipping_address": null,
                "submit": null,
                "terms_of_service_acceptance": null
            },
            "customer": "cus_hook",
            "customer_creation": "always",
            "customer_details": null,
            "customer_email": "shop@example.com",
            "expires_at": CREATED + 86_400,
            "invoice": null,
            "invoice_creation": null,
            "livemode": false,
            "locale": null,
            "metadata": metadata,
            "mode": "subscription",
            "payment_intent": null,
            "payment_link": null,
            "payment_method_collection": "always",
            "payment_method_configuration_details": null,
            "payment_method_options": null,
            "payment_method_types": ["card"],
            "payment_status": payment_status,
            "phone_number_collection": { "enabled": false },
            "recovered_from": null,
            "setup_intent": null,
            "shipping_address_collection": null,
            "shipping_cost": null,
            "shipping_details": null,
            "shipping_options": [],
            "status": status,
            "submit_type": null,
            "subscription": "sub_hook",
            "success_url": "http://localhost:3000/pricing?session_id={CHECKOUT_SESSION_ID}",
            "total_details": { "amount_discount": 0, "amount_shipping": 0, "amount_tax": 0 },
            "ui_mode": "hosted",
            "url": null
        });

        envelope(&format!("evt_{session_id}"), event_type, session)
    }

    /// Paid and complete `checkout.session.completed`
    pub fn completed_event(session_id: &str, customer_id: &str) -> Vec<u8> {
        session_event(
            "checkout.session.completed",
            session_id,
            "paid",
            "complete",
            Some(customer_id),
        )
    }

    /// `customer.subscription.deleted` for the processor subscription `sub_id`
    pub fn subscription_deleted_event(sub_id: &str) -> Vec<u8> {
        let subscription = json!({
            "id": sub_id,
            "object": "subscription",
            "application": null,
            "application_fee_percent": null,
            "automatic_tax": { "enabled": false, "liability": null },
            "billing_cycle_anchor": CREATED,
            "billing_cycle_anchor_config": null,
            "billing_thresholds": null,
            "cancel_at": null,
            "cancel_at_period_end": false,
            "canceled_at": CREATED,
            "cancellation_details": {
                "comment": null,
                "feedback": null,
                "reason": "cancellation_requested"
            },
            "collection_method": "charge_automatically",
            "created": CREATED,
            "currency": "eur",
            "current_period_end": CREATED + 2_592_000,
            "current_period_start": CREATED,
            "customer": "cus_hook",
            "days_until_due": null,
            "default_payment_method": null,
            "default_source": null,
            "default_tax_rates": [],
            "description": null,
            "discount": null,
            "discounts": [],
            "ended_at": CREATED,
            "invoice_settings": { "account_tax_ids": null, "issuer": { "type": "self" } },
            "items": {
                "object": "list",
                "data": [],
                "has_more": false,
                "total_count": 0,
                "url": format!("/v1/subscription_items?subscription={sub_id}")
            },
            "latest_invoice": null,
            "livemode": false,
            "metadata": {},
            "next_pending_invoice_item_invoice": null,
            "on_behalf_of": null,
            "pause_collection": null,
            "payment_settings": {
                "payment_method_options": null,
                "payment_method_types": null,
                "save_default_payment_method": "off"
            },
            "pending_invoice_item_interval": null,
            "pending_setup_intent": null,
            "pending_update": null,
            "schedule": null,
            "start_date": CREATED,
            "status": "canceled",
            "test_clock": null,
            "transfer_data": null,
            "trial_end": null,
            "trial_settings": { "end_behavior": { "missing_payment_method": "create_invoice" } },
            "trial_start": null
        });

        envelope(&format!("evt_del_{sub_id}"), "customer.subscription.deleted", subscription)
    }
}
