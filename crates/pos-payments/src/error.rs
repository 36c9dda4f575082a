//! Payment Error Types

use pos_core::StoreError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Malformed amount or missing/invalid required field
    #[error("Validation error: {0}")]
    Validation(String),

    /// Record store read or write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Payment processor call failed
    #[error("Payment processor error: {0}")]
    RemoteService(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Confirm/cancel called with an intent this terminal never issued
    /// (or one that can no longer move)
    #[error("Invalid payment intent: {0}")]
    InvalidIntent(String),

    /// No matching subscription or transaction row
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for PaymentError {
    fn from(err: StoreError) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteService(_) | Self::Persistence(_))
    }

    /// Whether the caller (not the system) is at fault
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::InvalidIntent(_)
                | Self::WebhookSignature(_)
                | Self::WebhookParse(_)
        )
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::InvalidIntent(msg) => msg.clone(),
            Self::Persistence(_) => "Could not save your data. Please try again.".into(),
            Self::RemoteService(_) => "Payment processing failed. Please try again.".into(),
            Self::WebhookSignature(_) => "Invalid signature.".into(),
            Self::WebhookParse(_) => "Malformed event payload.".into(),
            Self::NotFound(msg) => format!("Not found: {msg}"),
            Self::Config(_) => "Service configuration error.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_become_persistence() {
        let err: PaymentError = StoreError::Unavailable("timeout".into()).into();
        assert!(matches!(err, PaymentError::Persistence(_)));
        assert!(err.is_retryable());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_invalid_intent_is_client_error() {
        let err = PaymentError::InvalidIntent("unknown intent pi_x".into());
        assert!(err.is_client_error());
        assert_eq!(err.user_message(), "unknown intent pi_x");
    }
}
