//! Customer Identity
//!
//! Customers are identified by a bearer token issued at sign-up:
//! `Authorization: Bearer <customer_id>.<hex hmac-sha256(customer_id)>`.
//!
//! In development mode a request without a token may name its customer in the
//! `customer_id` header (falling back to `dev-customer-id`) so the terminal
//! can be driven before a subscription exists.

use axum::extract::FromRequestParts;
use axum::http::{StatusCode, header, request::Parts};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use pos_core::CustomerId;

use crate::error::{ApiError, api_error};
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Header accepted in development mode in place of a token
pub const DEV_CUSTOMER_HEADER: &str = "customer_id";

/// Customer assumed in development mode when nothing identifies the caller
pub const DEV_CUSTOMER_ID: &str = "dev-customer-id";

/// Issues and checks customer access tokens
pub struct TokenSigner {
    key: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
        }
    }

    /// Signer with a key that only lives as long as the process
    pub fn ephemeral() -> Self {
        Self::new(uuid::Uuid::new_v4().as_bytes())
    }

    fn mac(&self, customer_id: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key).ok()?;
        mac.update(customer_id.as_bytes());
        Some(mac)
    }

    pub fn issue(&self, customer_id: &CustomerId) -> Option<String> {
        let tag = self.mac(customer_id.as_str())?.finalize().into_bytes();
        Some(format!("{customer_id}.{}", hex::encode(tag)))
    }

    /// Resolve a token to its customer; `None` for anything forged or malformed
    pub fn verify(&self, token: &str) -> Option<CustomerId> {
        let (customer_id, tag) = token.rsplit_once('.')?;
        if customer_id.is_empty() {
            return None;
        }
        let tag = hex::decode(tag).ok()?;
        self.mac(customer_id)?.verify_slice(&tag).ok()?;
        Some(CustomerId::from_string(customer_id))
    }
}

/// The customer a request acts for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomerIdentity(pub CustomerId);

fn unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
}

impl FromRequestParts<AppState> for CustomerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(value) = parts.headers.get(header::AUTHORIZATION) {
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or_else(|| unauthorized("Malformed authorization header"))?;

            return state
                .identity
                .verify(token.trim())
                .map(Self)
                .ok_or_else(|| {
                    tracing::warn!("Rejected access token");
                    unauthorized("Invalid access token")
                });
        }

        if state.mode.is_production() {
            return Err(unauthorized("Missing access token"));
        }

        let customer_id = parts
            .headers
            .get(DEV_CUSTOMER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEV_CUSTOMER_ID);

        Ok(Self(CustomerId::from_string(customer_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let signer = TokenSigner::new("identity-secret");
        let customer = CustomerId::new();
        let token = signer.issue(&customer).unwrap();

        assert!(token.starts_with(customer.as_str()));
        assert_eq!(signer.verify(&token), Some(customer));
    }

    #[test]
    fn test_forged_tokens_rejected() {
        let signer = TokenSigner::new("identity-secret");
        let other = TokenSigner::new("other-secret");
        let customer = CustomerId::new();

        let foreign = other.issue(&customer).unwrap();
        assert_eq!(signer.verify(&foreign), None);

        let token = signer.issue(&customer).unwrap();
        let (_, tag) = token.rsplit_once('.').unwrap();
        assert_eq!(signer.verify(&format!("someone-else.{tag}")), None);

        assert_eq!(signer.verify("no-dot"), None);
        assert_eq!(signer.verify(".abcd"), None);
        assert_eq!(signer.verify("cust.not-hex"), None);
    }

    #[test]
    fn test_ephemeral_signers_differ() {
        let customer = CustomerId::new();
        let token = TokenSigner::ephemeral().issue(&customer).unwrap();
        assert_eq!(TokenSigner::ephemeral().verify(&token), None);
    }
}
