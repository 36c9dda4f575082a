//! Payment Capture Flow
//!
//! Drives one card payment from intent creation to a recorded transaction.
//! The transaction row is created `pending` with the intent and addressed by
//! the id the intent carries, so concurrent payments of one customer never
//! settle each other's rows.

use std::sync::Arc;

use chrono::Utc;

use pos_core::{
    CustomerId, RecordStore, TRANSACTION_PAGE_LIMIT, Transaction, TransactionStatus,
};

use crate::error::{PaymentError, Result};
use crate::intent::{
    IntentState, NFC_PAYMENT_METHOD, PaymentIntent, SIMULATED_GATEWAY, SimulatedTerminal,
};

/// Handle returned to the terminal after creating an intent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedIntent {
    pub intent_id: String,
    pub client_secret: String,
}

/// Payment capture service
pub struct PaymentCapture {
    store: Arc<dyn RecordStore>,
    terminal: SimulatedTerminal,
}

impl PaymentCapture {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_terminal(store, SimulatedTerminal::new())
    }

    pub fn with_terminal(store: Arc<dyn RecordStore>, terminal: SimulatedTerminal) -> Self {
        Self { store, terminal }
    }

    pub fn terminal(&self) -> &SimulatedTerminal {
        &self.terminal
    }

    fn pending_row(intent: &PaymentIntent, status: TransactionStatus) -> Transaction {
        Transaction::new(
            intent.transaction_id.clone(),
            intent.customer_id.clone(),
            intent.id.clone(),
            intent.amount_minor,
            SIMULATED_GATEWAY,
            NFC_PAYMENT_METHOD,
            status,
            Utc::now(),
        )
    }

    /// Issue an intent for `amount_minor` cents and record a pending row.
    ///
    /// A failed row write is logged; the intent is still handed out.
    pub async fn create(
        &self,
        customer_id: &CustomerId,
        amount_minor: i64,
    ) -> Result<IssuedIntent> {
        if amount_minor <= 0 {
            return Err(PaymentError::Validation(format!(
                "Amount must be a positive number of cents, got {amount_minor}"
            )));
        }

        let now = Utc::now();
        let intent = self.terminal.issue(customer_id.clone(), amount_minor, now);

        if let Err(e) = self
            .store
            .insert_transaction(&Self::pending_row(&intent, TransactionStatus::Pending))
            .await
        {
            tracing::warn!(
                intent_id = %intent.id,
                transaction_id = %intent.transaction_id,
                error = %e,
                "Could not record pending transaction; continuing with intent"
            );
        }

        let intent = self
            .terminal
            .transition(&intent.id, IntentState::AwaitingCard, now)?;

        tracing::info!(intent_id = %intent.id, amount_minor, "Payment intent created");

        Ok(IssuedIntent {
            intent_id: intent.id,
            client_secret: intent.client_secret,
        })
    }

    /// Capture a presented card: settle the intent's transaction as completed
    pub async fn confirm(
        &self,
        customer_id: &CustomerId,
        intent_id: &str,
        amount_minor: i64,
    ) -> Result<Transaction> {
        let intent = self.terminal.claim(intent_id, customer_id, amount_minor)?;
        let now = Utc::now();

        let written = match self
            .store
            .update_transaction_status(&intent.transaction_id, TransactionStatus::Completed, now)
            .await
        {
            Ok(true) => Ok(None),
            Ok(false) => {
                // Pending row was never written; record the capture now
                tracing::warn!(
                    transaction_id = %intent.transaction_id,
                    "No pending transaction for intent; inserting completed row"
                );
                let row = Self::pending_row(&intent, TransactionStatus::Completed);
                self.store.insert_transaction(&row).await.map(|()| Some(row))
            }
            Err(e) => Err(e),
        };

        let inserted = match written {
            Ok(inserted) => inserted,
            Err(e) => {
                tracing::warn!(intent_id, error = %e, "Payment capture failed");
                self.terminal.transition(intent_id, IntentState::Failed, now)?;
                return Err(e.into());
            }
        };

        // The row is settled from here on; the intent follows it
        self.terminal
            .transition(intent_id, IntentState::Captured, now)?;

        let stored = match inserted {
            Some(row) => Some(row),
            None => match self.store.transaction(&intent.transaction_id).await {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!(
                        transaction_id = %intent.transaction_id,
                        error = %e,
                        "Could not read back captured transaction"
                    );
                    None
                }
            },
        };
        let transaction = stored.unwrap_or_else(|| {
            let mut settled = Self::pending_row(&intent, TransactionStatus::Completed);
            settled.updated_at = now;
            settled
        });

        tracing::info!(
            intent_id,
            transaction_id = %transaction.id,
            amount = %transaction.amount,
            "Payment captured"
        );
        Ok(transaction)
    }

    /// Abort a payment before the card is captured
    pub async fn cancel(&self, customer_id: &CustomerId, intent_id: &str) -> Result<()> {
        let now = Utc::now();
        let intent = self.terminal.abort(intent_id, customer_id, now)?;

        match self
            .store
            .update_transaction_status(&intent.transaction_id, TransactionStatus::Failed, now)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    transaction_id = %intent.transaction_id,
                    "No transaction row to fail"
                );
            }
            Err(e) => tracing::warn!(
                transaction_id = %intent.transaction_id,
                error = %e,
                "Could not mark transaction failed"
            ),
        }

        tracing::info!(intent_id, "Payment cancelled");
        Ok(())
    }

    /// The customer's transactions, newest first
    pub async fn list(&self, customer_id: &CustomerId) -> Result<Vec<Transaction>> {
        Ok(self
            .store
            .transactions_for(customer_id, TRANSACTION_PAGE_LIMIT)
            .await?)
    }
}
