pub mod http;

pub use http::HttpPaymentGateway;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Maximum length the processor accepts for free-text fields (item titles and
/// descriptions). Longer values are clamped before the request is built.
pub const MAX_TEXT_FIELD_LEN: usize = 256;

/// One line of a hosted-checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionItem {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub currency: String,
}

/// Everything the processor needs to host a checkout page for one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSpec {
    /// The order id; echoed back by the gateway on every payment query and
    /// used as the authoritative correlation key.
    pub external_reference: String,
    pub items: Vec<SessionItem>,
    pub payer_name: String,
    pub payer_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_phone: Option<String>,
    pub success_url: String,
    pub failure_url: String,
    pub pending_url: String,
    pub notification_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSession {
    pub session_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInfo {
    pub id: String,
    /// Raw gateway vocabulary ("approved", "rejected", ...); normalization
    /// happens in the reconciliation service.
    pub status: String,
    pub external_reference: Option<String>,
}

/// Boundary to the external payment processor. Both operations are simple
/// pass-throughs with typed results; any transport failure, rejection, or
/// timeout surfaces as `ServiceError::GatewayError`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, spec: &SessionSpec) -> Result<CreatedSession, ServiceError>;

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentInfo, ServiceError>;
}

/// Clamps a free-text value to the processor's field-length limit.
pub fn clamp_text(value: &str, max_len: usize) -> String {
    value.chars().take(max_len).collect()
}
