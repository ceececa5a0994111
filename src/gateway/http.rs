use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{CreatedSession, PaymentGateway, PaymentInfo, SessionSpec};
use crate::config::AppConfig;
use crate::errors::ServiceError;

/// HTTP client for the hosted-checkout processor. Every request carries a
/// bounded timeout; a timeout is indistinguishable from a rejection at the
/// call site and maps to `GatewayError`.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: String,
    status: String,
    external_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    message: Option<String>,
}

impl HttpPaymentGateway {
    pub fn from_config(cfg: &AppConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.gateway_timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("gateway client init: {}", e)))?;

        Ok(Self {
            client,
            base_url: cfg.gateway_base_url.trim_end_matches('/').to_string(),
            access_token: cfg.gateway_access_token.clone(),
        })
    }

    fn map_transport_error(err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::GatewayError("payment gateway timed out".to_string())
        } else {
            ServiceError::GatewayError(format!("payment gateway unreachable: {}", err))
        }
    }

    /// Pulls the processor's own message out of a non-2xx response when one
    /// is present, falling back to the HTTP status.
    async fn error_from_response(response: reqwest::Response) -> ServiceError {
        let status = response.status();
        let message = response
            .json::<GatewayErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| format!("gateway returned {}", status));
        ServiceError::GatewayError(message)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, spec), fields(external_reference = %spec.external_reference))]
    async fn create_session(&self, spec: &SessionSpec) -> Result<CreatedSession, ServiceError> {
        let url = format!("{}/v1/checkout/sessions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(spec)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: SessionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("malformed session response: {}", e)))?;

        debug!(session_id = %body.id, "checkout session created");
        Ok(CreatedSession {
            session_id: body.id,
            redirect_url: body.redirect_url,
        })
    }

    #[instrument(skip(self))]
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentInfo, ServiceError> {
        let url = format!("{}/v1/payments/{}", self.base_url, payment_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: PaymentResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("malformed payment response: {}", e)))?;

        Ok(PaymentInfo {
            id: body.id,
            status: body.status,
            external_reference: body.external_reference,
        })
    }
}
