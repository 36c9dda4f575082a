//! UI Components

use leptos::prelude::*;
use pos_core::TransactionStatus;
use pos_core::api::TransactionView;

const DIGIT_ROWS: [[u8; 3]; 3] = [[1, 2, 3], [4, 5, 6], [7, 8, 9]];

/// Numeric keypad with clear, zero and backspace on the last row
#[component]
pub fn Keypad(
    #[prop(into)] on_digit: Callback<u8>,
    #[prop(into)] on_clear: Callback<()>,
    #[prop(into)] on_backspace: Callback<()>,
    #[prop(into)] disabled: Signal<bool>,
) -> impl IntoView {
    let digit_button = move |digit: u8| {
        view! {
            <button
                class="key"
                disabled=move || disabled.get()
                on:click=move |_| on_digit.run(digit)
            >
                {digit}
            </button>
        }
    };

    view! {
        <div class="keypad">
            {DIGIT_ROWS
                .iter()
                .map(|row| {
                    view! {
                        <div class="keypad-row">
                            {row.iter().map(|&digit| digit_button(digit)).collect_view()}
                        </div>
                    }
                })
                .collect_view()}
            <div class="keypad-row">
                <button
                    class="key key-clear"
                    disabled=move || disabled.get()
                    on:click=move |_| on_clear.run(())
                >
                    "C"
                </button>
                {digit_button(0)}
                <button
                    class="key"
                    disabled=move || disabled.get()
                    on:click=move |_| on_backspace.run(())
                >
                    "⌫"
                </button>
            </div>
        </div>
    }
}

/// One line of the history list
#[component]
pub fn TransactionRow(transaction: TransactionView) -> impl IntoView {
    let class = match transaction.status {
        TransactionStatus::Completed => "tx tx-completed",
        TransactionStatus::Pending => "tx tx-pending",
        TransactionStatus::Failed => "tx tx-failed",
    };
    let short_id: String = {
        let chars: Vec<char> = transaction.id.chars().collect();
        chars[chars.len().saturating_sub(8)..].iter().collect()
    };

    view! {
        <li class=class>
            <span class="tx-amount">{format!("€{}", transaction.amount)}</span>
            <span class="tx-status">{transaction.status.as_str()}</span>
            <span class="tx-date">
                {transaction.timestamp.format("%d/%m/%Y %H:%M").to_string()}
            </span>
            <span class="tx-id">{format!("#{short_id}")}</span>
        </li>
    }
}

/// Banner for progress, success and error feedback
#[component]
pub fn StatusMessage(#[prop(into)] kind: String, #[prop(into)] text: String) -> impl IntoView {
    view! { <p class=format!("status status-{kind}")>{text}</p> }
}
