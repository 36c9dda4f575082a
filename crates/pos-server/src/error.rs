//! HTTP error mapping

use axum::{Json, http::StatusCode};

use pos_core::api::ErrorResponse;
use pos_payments::PaymentError;

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (status, Json(ErrorResponse::new(error, code)))
}

/// Status code and machine-readable code for a payment error
pub const fn classify(err: &PaymentError) -> (StatusCode, &'static str) {
    match err {
        PaymentError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        PaymentError::InvalidIntent(_) => (StatusCode::BAD_REQUEST, "INVALID_INTENT"),
        PaymentError::WebhookSignature(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
        PaymentError::WebhookParse(_) => (StatusCode::BAD_REQUEST, "INVALID_PAYLOAD"),
        PaymentError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        PaymentError::RemoteService(_) => (StatusCode::BAD_GATEWAY, "PROCESSOR_ERROR"),
        PaymentError::Persistence(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
        PaymentError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
    }
}

/// Map a payment error onto the wire, logging it at a level that fits
pub fn payment_error(err: PaymentError) -> ApiError {
    let (status, code) = classify(&err);
    if err.is_client_error() {
        tracing::info!(code, error = %err, "Request rejected");
    } else if err.is_retryable() {
        tracing::warn!(code, error = %err, "Request failed; caller may retry");
    } else {
        tracing::error!(code, error = %err, "Request failed");
    }
    api_error(status, err.user_message(), code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let cases = [
            (PaymentError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (PaymentError::InvalidIntent("x".into()), StatusCode::BAD_REQUEST),
            (PaymentError::WebhookSignature("x".into()), StatusCode::BAD_REQUEST),
            (PaymentError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (PaymentError::RemoteService("x".into()), StatusCode::BAD_GATEWAY),
            (PaymentError::Persistence("x".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(classify(&err).0, status, "{err}");
        }
    }

    #[test]
    fn test_body_uses_user_message() {
        let (status, Json(body)) =
            payment_error(PaymentError::Persistence("socket closed".into()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!body.success);
        assert_eq!(body.code, "STORE_UNAVAILABLE");
        assert!(!body.error.contains("socket"));
    }
}
