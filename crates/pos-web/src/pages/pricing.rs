//! Plan Page
//!
//! Base plan sign-up. The form starts a hosted checkout; when the processor
//! redirects back with `session_id` and `customer_id` the page polls the
//! backend until the subscription is active or the session is settled.

use leptos::prelude::*;
use leptos_router::hooks::use_query_map;
use wasm_bindgen::JsValue;

use pos_core::api::{
    CheckSessionResponse, CreateSubscriptionRequest, SubscriptionStatusResponse,
};
use pos_core::{CancellationToken, PollOutcome, PollPolicy, poll_until};

use crate::api;
use crate::components::StatusMessage;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Checkout {
    Idle,
    Redirecting,
    Verifying,
    Active,
    Pending,
    Abandoned,
    Failed(String),
}

impl Checkout {
    /// Map a settled session check onto the page state
    fn from_session(check: &CheckSessionResponse) -> Self {
        if check.is_active() {
            return Self::Active;
        }
        match check.status.as_str() {
            "expired" | "canceled" => Self::Abandoned,
            other => Self::Failed(format!("Unexpected checkout status: {other}")),
        }
    }

    /// State after asking the browser to open the hosted checkout page
    fn after_redirect(opened: bool) -> Self {
        if opened {
            Self::Redirecting
        } else {
            Self::Failed("Could not open the checkout page".into())
        }
    }

    fn message(&self) -> Option<(&'static str, String)> {
        match self {
            Self::Idle => None,
            Self::Redirecting => Some(("info", "Redirecting to checkout...".into())),
            Self::Verifying => Some(("info", "Confirming your payment...".into())),
            Self::Active => Some(("success", "Your Base plan is active".into())),
            Self::Pending => Some((
                "info",
                "Payment is still processing. Refresh this page in a minute.".into(),
            )),
            Self::Abandoned => Some(("error", "Checkout was not completed".into())),
            Self::Failed(text) => Some(("error", text.clone())),
        }
    }
}

/// A session check worth stopping for: active, or a session that will never pay
fn settled(check: CheckSessionResponse) -> Option<CheckSessionResponse> {
    matches!(check.status.as_str(), "active" | "expired" | "canceled").then_some(check)
}

/// Drop the checkout query parameters so a reload does not poll again
fn clean_url() {
    if let Some(history) = web_sys::window().and_then(|w| w.history().ok()) {
        let _ = history.replace_state_with_url(&JsValue::NULL, "", Some("/pricing"));
    }
}

fn plan_summary(status: &SubscriptionStatusResponse) -> Option<String> {
    if !status.has_subscription {
        return None;
    }
    let plan = status.plan.as_deref().unwrap_or("base");
    let state = status.status.as_deref().unwrap_or("unknown");
    Some(match status.current_period_end {
        Some(end) => format!("Plan {plan} ({state}) until {}", end.format("%d/%m/%Y")),
        None => format!("Plan {plan} ({state})"),
    })
}

#[component]
pub fn PricingPage() -> impl IntoView {
    let (business_name, set_business_name) = signal(String::new());
    let (email, set_email) = signal(String::new());
    let (phone, set_phone) = signal(String::new());
    let (checkout, set_checkout) = signal(Checkout::Idle);
    let (current_plan, set_current_plan) = signal(None::<String>);

    let query = use_query_map();
    let returned = query.with_untracked(|q| {
        let session_id = q.get("session_id").map(|s| s.to_string());
        // Without `customer_id` in the URL, use the customer who signed up on this device
        let customer_id = q
            .get("customer_id")
            .map(|s| s.to_string())
            .or_else(api::saved_customer_id);
        let canceled = q.get("canceled").is_some_and(|v| v == "true");
        (session_id.zip(customer_id), canceled)
    });

    let poller = CancellationToken::new();
    on_cleanup({
        let poller = poller.clone();
        move || poller.cancel()
    });

    match returned {
        (Some((session_id, customer_id)), _) => {
            set_checkout.set(Checkout::Verifying);
            leptos::task::spawn_local(async move {
                let outcome = poll_until(
                    &PollPolicy::default(),
                    &poller,
                    |_| {
                        let session_id = session_id.clone();
                        let customer_id = customer_id.clone();
                        async move {
                            api::check_session(&session_id, &customer_id)
                                .await
                                .map(settled)
                        }
                    },
                    gloo_timers::future::sleep,
                )
                .await;

                match outcome {
                    PollOutcome::Ready(check) => {
                        clean_url();
                        set_checkout.set(Checkout::from_session(&check));
                    }
                    PollOutcome::Exhausted { .. } => set_checkout.set(Checkout::Pending),
                    PollOutcome::Cancelled => {}
                }
            });
        }
        (None, true) => {
            clean_url();
            set_checkout.set(Checkout::Abandoned);
        }
        (None, false) => {
            if api::access_token().is_some() {
                leptos::task::spawn_local(async move {
                    if let Ok(status) = api::subscription_status().await {
                        set_current_plan.set(plan_summary(&status));
                    }
                });
            }
        }
    }

    let subscribe = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        if checkout.with_untracked(|c| matches!(c, Checkout::Redirecting | Checkout::Verifying)) {
            return;
        }

        let phone = phone.get_untracked();
        let request = CreateSubscriptionRequest {
            business_name: business_name.get_untracked().trim().to_string(),
            email: email.get_untracked().trim().to_string(),
            phone: (!phone.trim().is_empty()).then(|| phone.trim().to_string()),
        };
        set_checkout.set(Checkout::Redirecting);

        leptos::task::spawn_local(async move {
            match api::create_subscription(&request).await {
                Ok(created) => {
                    api::save_identity(&created.customer_id, &created.access_token);
                    let opened = web_sys::window()
                        .is_some_and(|w| w.location().set_href(&created.checkout_url).is_ok());
                    set_checkout.set(Checkout::after_redirect(opened));
                }
                Err(e) => set_checkout.set(Checkout::Failed(e)),
            }
        });
    };

    let status = move || {
        checkout
            .with(Checkout::message)
            .map(|(kind, text)| view! { <StatusMessage kind=kind text=text /> })
    };

    view! {
        <div class="pricing">
            <h1>"Base Plan"</h1>
            <div class="price">"€19"<span>"/month"</span></div>
            <ul>
                <li>"Unlimited NFC payments"</li>
                <li>"Transaction history"</li>
            </ul>

            {move || current_plan.get().map(|text| view! { <p class="current-plan">{text}</p> })}

            <form class="signup" on:submit=subscribe>
                <div class="field">
                    <label>"Business name"</label>
                    <input
                        type="text"
                        required
                        prop:value=business_name
                        on:input=move |ev| set_business_name.set(event_target_value(&ev))
                    />
                </div>
                <div class="field">
                    <label>"Email"</label>
                    <input
                        type="email"
                        required
                        prop:value=email
                        on:input=move |ev| set_email.set(event_target_value(&ev))
                    />
                </div>
                <div class="field">
                    <label>"Phone (optional)"</label>
                    <input
                        type="tel"
                        prop:value=phone
                        on:input=move |ev| set_phone.set(event_target_value(&ev))
                    />
                </div>
                <button
                    type="submit"
                    class="btn btn-primary"
                    disabled=move || {
                        checkout.with(|c| matches!(c, Checkout::Redirecting | Checkout::Verifying))
                    }
                >
                    "Subscribe"
                </button>
            </form>

            {status}
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(status: &str) -> CheckSessionResponse {
        CheckSessionResponse {
            success: true,
            status: status.into(),
            message: String::new(),
        }
    }

    #[test]
    fn test_open_session_keeps_polling() {
        assert!(settled(check("open")).is_none());
        assert!(settled(check("complete")).is_none());
        assert!(settled(check("active")).is_some());
        assert!(settled(check("expired")).is_some());
    }

    #[test]
    fn test_settled_session_maps_to_page_state() {
        assert_eq!(Checkout::from_session(&check("active")), Checkout::Active);
        assert_eq!(Checkout::from_session(&check("canceled")), Checkout::Abandoned);
    }

    #[test]
    fn test_failed_redirect_does_not_hang() {
        assert_eq!(Checkout::after_redirect(true), Checkout::Redirecting);
        let failed = Checkout::after_redirect(false);
        assert!(matches!(failed, Checkout::Failed(_)));
        assert_eq!(failed.message().map(|(kind, _)| kind), Some("error"));
    }

    #[test]
    fn test_plan_summary() {
        let none = SubscriptionStatusResponse {
            success: true,
            has_subscription: false,
            plan: None,
            status: None,
            current_period_end: None,
            is_trial: false,
        };
        assert_eq!(plan_summary(&none), None);

        let active = SubscriptionStatusResponse {
            has_subscription: true,
            plan: Some("base".into()),
            status: Some("active".into()),
            ..none
        };
        assert_eq!(plan_summary(&active).as_deref(), Some("Plan base (active)"));
    }
}
