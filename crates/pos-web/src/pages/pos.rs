//! Charge Page
//!
//! Amount entry followed by a simulated card tap: the intent is created, the
//! reader waits for the card, then the capture is confirmed.

use std::future::Future;
use std::time::Duration;

use futures::future::{Either, select};
use leptos::prelude::*;
use pos_core::CancellationToken;

use crate::api;
use crate::components::{Keypad, StatusMessage};
use crate::keypad::AmountEntry;

/// Time the simulated reader takes to pick up a card
const NFC_TAP_DELAY: Duration = Duration::from_secs(3);

/// Wait until the card is read: after `delay`, or at once when `presented`
/// fires. Returns `false` if `abandoned` fires first.
async fn wait_for_card(
    delay: impl Future<Output = ()>,
    presented: &CancellationToken,
    abandoned: &CancellationToken,
) -> bool {
    let card_read = Box::pin(async {
        select(Box::pin(delay), Box::pin(presented.cancelled())).await;
    });
    matches!(
        select(card_read, Box::pin(abandoned.cancelled())).await,
        Either::Left(_)
    )
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Creating,
    AwaitingCard { intent_id: String },
    Capturing,
    Approved(String),
    Declined(String),
    Cancelled,
}

impl Phase {
    const fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Creating | Self::AwaitingCard { .. } | Self::Capturing
        )
    }

    const fn is_awaiting_card(&self) -> bool {
        matches!(self, Self::AwaitingCard { .. })
    }

    fn message(&self) -> Option<(&'static str, String)> {
        match self {
            Self::Idle => None,
            Self::Creating => Some(("info", "Preparing payment...".into())),
            Self::AwaitingCard { .. } => Some(("info", "Waiting for NFC card...".into())),
            Self::Capturing => Some(("info", "Processing...".into())),
            Self::Approved(text) => Some(("success", text.clone())),
            Self::Declined(text) => Some(("error", text.clone())),
            Self::Cancelled => Some(("error", "Payment cancelled".into())),
        }
    }
}

#[component]
pub fn PosPage() -> impl IntoView {
    let (entry, set_entry) = signal(AmountEntry::default());
    let (phase, set_phase) = signal(Phase::Idle);
    let pending_tap = StoredValue::new(None::<CancellationToken>);
    let card_presented = StoredValue::new(None::<CancellationToken>);

    // Leaving the page abandons any tap still in progress
    let page = CancellationToken::new();
    on_cleanup({
        let page = page.clone();
        move || page.cancel()
    });

    let charge = move |_| {
        let amount = entry.get_untracked();
        if amount.is_zero() || phase.with_untracked(Phase::is_busy) {
            return;
        }

        let tap = page.child_token();
        let card = CancellationToken::new();
        pending_tap.set_value(Some(tap.clone()));
        card_presented.set_value(Some(card.clone()));
        set_phase.set(Phase::Creating);

        leptos::task::spawn_local(async move {
            let intent = match api::create_payment_intent(amount.cents()).await {
                Ok(intent) => intent,
                Err(e) => {
                    set_phase.set(Phase::Declined(e));
                    return;
                }
            };
            set_phase.set(Phase::AwaitingCard {
                intent_id: intent.payment_intent_id.clone(),
            });

            let delay = gloo_timers::future::sleep(NFC_TAP_DELAY);
            if !wait_for_card(delay, &card, &tap).await {
                return;
            }

            set_phase.set(Phase::Capturing);
            match api::confirm_payment(&intent.payment_intent_id, amount.cents()).await {
                Ok(confirmed) => {
                    set_entry.set(AmountEntry::default());
                    set_phase.set(Phase::Approved(format!(
                        "Payment of €{} approved",
                        confirmed.transaction.amount
                    )));
                }
                Err(e) => set_phase.set(Phase::Declined(e)),
            }
        });
    };

    let cancel = move |_| {
        let Phase::AwaitingCard { intent_id } = phase.get_untracked() else {
            return;
        };
        pending_tap.with_value(|tap| {
            if let Some(tap) = tap {
                tap.cancel();
            }
        });
        set_phase.set(Phase::Cancelled);

        leptos::task::spawn_local(async move {
            if let Err(e) = api::cancel_payment(&intent_id).await {
                set_phase.set(Phase::Declined(e));
            }
        });
    };

    let tap_now = move |_| {
        if !phase.with_untracked(Phase::is_awaiting_card) {
            return;
        }
        card_presented.with_value(|card| {
            if let Some(card) = card {
                card.cancel();
            }
        });
    };

    let busy = Signal::derive(move || phase.with(Phase::is_busy));
    let status = move || {
        phase
            .with(Phase::message)
            .map(|(kind, text)| view! { <StatusMessage kind=kind text=text /> })
    };

    view! {
        <div class="pos">
            <div class="amount-display">
                <span class="currency">"€"</span>
                <span class="amount">{move || entry.get().display()}</span>
            </div>

            <Keypad
                on_digit=Callback::new(move |digit: u8| set_entry.update(|e| *e = e.push_digit(digit)))
                on_clear=Callback::new(move |()| set_entry.set(AmountEntry::default()))
                on_backspace=Callback::new(move |()| set_entry.update(|e| *e = e.backspace()))
                disabled=busy
            />

            <button
                class="btn btn-primary btn-charge"
                disabled=move || busy.get() || entry.get().is_zero()
                on:click=charge
            >
                "Charge"
            </button>

            <Show when=move || phase.with(Phase::is_awaiting_card)>
                <button class="btn btn-tap" on:click=tap_now>
                    "Tap now"
                </button>
                <button class="btn btn-cancel" on:click=cancel>
                    "Cancel"
                </button>
            </Show>

            {status}
        </div>
    }
}
