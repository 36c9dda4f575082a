//! HTTP Handlers

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
};

use pos_core::CustomerId;
use pos_core::api::{
    AckResponse, CancelPaymentRequest, CheckSessionQuery, CheckSessionResponse,
    ConfirmPaymentRequest, ConfirmPaymentResponse, CreatePaymentIntentRequest,
    CreatePaymentIntentResponse, CreateSubscriptionRequest, CreateSubscriptionResponse,
    HealthResponse, SubscriptionStatusResponse, TransactionView, TransactionsResponse,
    WebhookAck,
};
use pos_payments::{InitiateRequest, SubscriptionEngine, WebhookOutcome};

use crate::error::{ApiError, api_error, payment_error};
use crate::identity::CustomerIdentity;
use crate::state::AppState;

/// Header carrying the processor's webhook signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

fn subscriptions(state: &AppState) -> Result<&Arc<SubscriptionEngine>, ApiError> {
    state.subscriptions.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Payments not configured",
            "PAYMENTS_DISABLED",
        )
    })
}

fn bad_body(rejection: &impl std::fmt::Display) -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        format!("Invalid request: {rejection}"),
        "VALIDATION_ERROR",
    )
}

// ============================================================================
// Health
// ============================================================================

/// Liveness plus store reachability
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = if state.store.health_check().await {
        "connected"
    } else {
        "unreachable"
    };

    Json(HealthResponse {
        status: "OK".into(),
        message: "POS Backend running".into(),
        database: database.into(),
        mode: state.mode.to_string(),
    })
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Register a business and start a Base plan checkout
pub async fn create_base_subscription(
    State(state): State<AppState>,
    payload: Result<Json<CreateSubscriptionRequest>, JsonRejection>,
) -> Result<Json<CreateSubscriptionResponse>, ApiError> {
    let engine = subscriptions(&state)?;
    let Json(payload) = payload.map_err(|e| bad_body(&e))?;

    let initiated = engine
        .initiate(InitiateRequest {
            business_name: payload.business_name,
            email: payload.email,
            phone: payload.phone,
        })
        .await
        .map_err(payment_error)?;

    let access_token = state.identity.issue(&initiated.customer_id).ok_or_else(|| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not issue access token",
            "IDENTITY_ERROR",
        )
    })?;

    Ok(Json(CreateSubscriptionResponse {
        success: true,
        checkout_url: initiated.checkout_url,
        session_id: initiated.session_id,
        customer_id: initiated.customer_id.to_string(),
        access_token,
    }))
}

/// Poll path after the checkout redirect
pub async fn check_session(
    State(state): State<AppState>,
    query: Result<Query<CheckSessionQuery>, QueryRejection>,
) -> Result<Json<CheckSessionResponse>, ApiError> {
    let engine = subscriptions(&state)?;
    let Query(query) = query.map_err(|e| bad_body(&e))?;

    let check = engine
        .reconcile_by_session(&query.session_id, &CustomerId::from_string(query.customer_id))
        .await
        .map_err(payment_error)?;

    let message = if check.is_active() {
        "Subscription active".to_string()
    } else {
        format!("Payment not completed yet (session {})", check.status)
    };

    Ok(Json(CheckSessionResponse {
        success: true,
        status: check.status,
        message,
    }))
}

/// Current entitlement of the calling customer
pub async fn subscription_status(
    State(state): State<AppState>,
    CustomerIdentity(customer_id): CustomerIdentity,
) -> Result<Json<SubscriptionStatusResponse>, ApiError> {
    let engine = subscriptions(&state)?;
    let summary = engine.status(&customer_id).await.map_err(payment_error)?;

    Ok(Json(SubscriptionStatusResponse {
        success: true,
        has_subscription: summary.has_subscription,
        plan: summary.plan.map(|p| p.as_str().to_string()),
        status: summary.status.map(|s| s.as_str().to_string()),
        current_period_end: summary.current_period_end,
        is_trial: false,
    }))
}

// ============================================================================
// Payments
// ============================================================================

pub async fn create_payment_intent(
    State(state): State<AppState>,
    CustomerIdentity(customer_id): CustomerIdentity,
    payload: Result<Json<CreatePaymentIntentRequest>, JsonRejection>,
) -> Result<Json<CreatePaymentIntentResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| bad_body(&e))?;

    let issued = state
        .capture
        .create(&customer_id, payload.amount)
        .await
        .map_err(payment_error)?;

    Ok(Json(CreatePaymentIntentResponse {
        success: true,
        client_secret: issued.client_secret,
        payment_intent_id: issued.intent_id,
    }))
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    CustomerIdentity(customer_id): CustomerIdentity,
    payload: Result<Json<ConfirmPaymentRequest>, JsonRejection>,
) -> Result<Json<ConfirmPaymentResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| bad_body(&e))?;

    let transaction = state
        .capture
        .confirm(&customer_id, &payload.payment_intent_id, payload.amount)
        .await
        .map_err(payment_error)?;

    Ok(Json(ConfirmPaymentResponse {
        success: true,
        transaction: TransactionView::from(&transaction),
    }))
}

pub async fn cancel_payment(
    State(state): State<AppState>,
    CustomerIdentity(customer_id): CustomerIdentity,
    payload: Result<Json<CancelPaymentRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| bad_body(&e))?;

    state
        .capture
        .cancel(&customer_id, &payload.payment_intent_id)
        .await
        .map_err(payment_error)?;

    Ok(Json(AckResponse { success: true }))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    CustomerIdentity(customer_id): CustomerIdentity,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let transactions: Vec<TransactionView> = state
        .capture
        .list(&customer_id)
        .await
        .map_err(payment_error)?
        .iter()
        .map(TransactionView::from)
        .collect();

    Ok(Json(TransactionsResponse {
        success: true,
        total: transactions.len(),
        transactions,
    }))
}

// ============================================================================
// Webhooks
// ============================================================================

/// Stripe webhook receiver; needs the raw body for signature verification
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let engine = subscriptions(&state)?;

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    let outcome = engine
        .reconcile_by_webhook(&body, signature)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Webhook rejected");
            payment_error(e)
        })?;

    match &outcome {
        WebhookOutcome::Activated { customer_id } => {
            tracing::info!(customer_id = %customer_id, "Webhook activated subscription");
        }
        WebhookOutcome::Canceled { customer_id } => {
            tracing::info!(customer_id = %customer_id, "Webhook canceled subscription");
        }
        WebhookOutcome::AlreadyActive { .. } | WebhookOutcome::Ignored { .. } => {
            tracing::debug!(outcome = ?outcome, "Webhook acknowledged");
        }
    }

    Ok(Json(WebhookAck { received: true }))
}
