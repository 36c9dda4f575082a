//! API Client
//!
//! Thin wrappers over the backend's JSON endpoints. The access token issued at
//! sign-up lives in `localStorage` and is sent as a bearer token on every call
//! that acts for a customer.

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use pos_core::api::{
    AckResponse, CancelPaymentRequest, CheckSessionResponse, ConfirmPaymentRequest,
    ConfirmPaymentResponse, CreatePaymentIntentRequest, CreatePaymentIntentResponse,
    CreateSubscriptionRequest, CreateSubscriptionResponse, ErrorResponse,
    SubscriptionStatusResponse, TransactionsResponse,
};

/// Backend origin, overridable at build time
pub const BACKEND_URL: &str = match option_env!("POS_BACKEND_URL") {
    Some(url) => url,
    None => "http://localhost:3001",
};

const TOKEN_KEY: &str = "pos_access_token";
const CUSTOMER_KEY: &str = "pos_customer_id";

fn endpoint(path: &str) -> String {
    format!("{BACKEND_URL}{path}")
}

fn storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok()?
}

/// Remember who signed up on this device
pub fn save_identity(customer_id: &str, access_token: &str) {
    if let Some(storage) = storage() {
        let _ = storage.set_item(CUSTOMER_KEY, customer_id);
        let _ = storage.set_item(TOKEN_KEY, access_token);
    }
}

pub fn access_token() -> Option<String> {
    storage()?.get_item(TOKEN_KEY).ok()?
}

pub fn saved_customer_id() -> Option<String> {
    storage()?.get_item(CUSTOMER_KEY).ok()?
}

fn authorized(builder: RequestBuilder) -> RequestBuilder {
    match access_token() {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, String> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(|e| e.to_string());
    }

    match response.json::<ErrorResponse>().await {
        Ok(error) => Err(error.error),
        Err(_) => Err(format!("Request failed ({status})")),
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Register the business and get a hosted checkout URL
pub async fn create_subscription(
    request: &CreateSubscriptionRequest,
) -> Result<CreateSubscriptionResponse, String> {
    let response = reqwest::Client::new()
        .post(endpoint("/api/subscriptions/create-base"))
        .json(request)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    decode(response).await
}

pub async fn check_session(
    session_id: &str,
    customer_id: &str,
) -> Result<CheckSessionResponse, String> {
    let response = reqwest::Client::new()
        .get(endpoint("/api/subscriptions/check-session"))
        .query(&[("session_id", session_id), ("customer_id", customer_id)])
        .send()
        .await
        .map_err(|e| e.to_string())?;

    decode(response).await
}

pub async fn subscription_status() -> Result<SubscriptionStatusResponse, String> {
    let response = authorized(reqwest::Client::new().get(endpoint("/api/subscriptions/status")))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    decode(response).await
}

// ============================================================================
// Payments
// ============================================================================

pub async fn create_payment_intent(amount: i64) -> Result<CreatePaymentIntentResponse, String> {
    let response = authorized(reqwest::Client::new().post(endpoint("/api/create-payment-intent")))
        .json(&CreatePaymentIntentRequest { amount })
        .send()
        .await
        .map_err(|e| e.to_string())?;

    decode(response).await
}

pub async fn confirm_payment(
    payment_intent_id: &str,
    amount: i64,
) -> Result<ConfirmPaymentResponse, String> {
    let response = authorized(reqwest::Client::new().post(endpoint("/api/confirm-payment")))
        .json(&ConfirmPaymentRequest {
            payment_intent_id: payment_intent_id.to_string(),
            amount,
        })
        .send()
        .await
        .map_err(|e| e.to_string())?;

    decode(response).await
}

pub async fn cancel_payment(payment_intent_id: &str) -> Result<AckResponse, String> {
    let response = authorized(reqwest::Client::new().post(endpoint("/api/cancel-payment")))
        .json(&CancelPaymentRequest {
            payment_intent_id: payment_intent_id.to_string(),
        })
        .send()
        .await
        .map_err(|e| e.to_string())?;

    decode(response).await
}

pub async fn transactions() -> Result<TransactionsResponse, String> {
    let response = authorized(reqwest::Client::new().get(endpoint("/api/transactions")))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    decode(response).await
}
