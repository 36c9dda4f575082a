//! History Page

use leptos::prelude::*;
use pos_core::api::TransactionView;
use pos_core::{TransactionStatus, minor_to_major};

use crate::api;
use crate::components::{StatusMessage, TransactionRow};

/// Total of the captured transactions, in major units
fn completed_total(transactions: &[TransactionView]) -> String {
    transactions
        .iter()
        .filter(|tx| tx.status == TransactionStatus::Completed)
        .fold(minor_to_major(0), |total, tx| total + tx.amount)
        .to_string()
}

/// Placeholder rows so the layout can be worked on without a backend
#[cfg(debug_assertions)]
fn sample_transactions() -> Vec<TransactionView> {
    let now = chrono::Utc::now();
    [
        ("sample-0000001", 2550, TransactionStatus::Completed, 5),
        ("sample-0000002", 1000, TransactionStatus::Completed, 42),
        ("sample-0000003", 499, TransactionStatus::Failed, 90),
    ]
    .into_iter()
    .map(|(id, cents, status, minutes_ago)| TransactionView {
        id: id.into(),
        amount: minor_to_major(cents),
        currency: "eur".into(),
        status,
        payment_method: "nfc_simulated".into(),
        timestamp: now - chrono::Duration::minutes(minutes_ago),
    })
    .collect()
}

#[component]
pub fn HistoryPage() -> impl IntoView {
    let (transactions, set_transactions) = signal(Vec::<TransactionView>::new());
    let (loading, set_loading) = signal(false);
    let (error, set_error) = signal(None::<String>);

    let load = move || {
        if loading.get_untracked() {
            return;
        }
        set_loading.set(true);

        leptos::task::spawn_local(async move {
            match api::transactions().await {
                Ok(response) => {
                    set_error.set(None);
                    set_transactions.set(response.transactions);
                }
                Err(e) => {
                    #[cfg(debug_assertions)]
                    {
                        set_error.set(Some(format!("{e} (showing sample data)")));
                        set_transactions.set(sample_transactions());
                    }
                    #[cfg(not(debug_assertions))]
                    set_error.set(Some(e));
                }
            }
            set_loading.set(false);
        });
    };

    load();

    view! {
        <div class="history">
            <header class="history-header">
                <h1>"Transactions"</h1>
                <button class="btn" disabled=move || loading.get() on:click=move |_| load()>
                    {move || if loading.get() { "Loading..." } else { "Refresh" }}
                </button>
            </header>

            {move || error.get().map(|text| view! { <StatusMessage kind="error" text=text /> })}

            <Show
                when=move || !transactions.with(Vec::is_empty)
                fallback=move || {
                    let text = move || if loading.get() { "" } else { "No transactions yet" };
                    view! { <p class="empty">{text}</p> }
                }
            >
                <ul class="tx-list">
                    <For
                        each=move || transactions.get()
                        key=|tx| tx.id.clone()
                        children=|tx| view! { <TransactionRow transaction=tx /> }
                    />
                </ul>
                <p class="tx-total">
                    "Total: €"{move || transactions.with(|txs| completed_total(txs))}
                </p>
            </Show>
        </div>
    }
}
