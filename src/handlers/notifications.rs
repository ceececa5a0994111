use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::services::reconciliation::PaymentNotification;
use crate::AppState;

/// Query parameters the gateway puts on its callback. `order_id` is the
/// fallback correlation hint embedded in the notification URL at checkout
/// time.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct NotificationParams {
    pub topic: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "data.id")]
    pub data_id: Option<String>,
    pub order_id: Option<Uuid>,
}

/// Body shape some gateway versions send instead of (or in addition to) the
/// query parameters. Ids may arrive as strings or numbers.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NotificationBody {
    pub topic: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub id: Option<serde_json::Value>,
    pub data: Option<NotificationData>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NotificationData {
    pub id: Option<serde_json::Value>,
}

fn value_to_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// POST /payment-notifications
///
/// Always answers 200: the gateway retries on any non-2xx, so every failure
/// is handled (and logged) internally instead of surfaced.
#[utoipa::path(
    post,
    path = "/payment-notifications",
    params(NotificationParams),
    responses(
        (status = 200, description = "Notification acknowledged")
    ),
    tag = "Payments"
)]
pub async fn payment_notification(
    State(state): State<AppState>,
    Query(params): Query<NotificationParams>,
    body: Option<Json<NotificationBody>>,
) -> StatusCode {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let payment_id = params
        .data_id
        .or(params.id)
        .or_else(|| body.data.as_ref().and_then(|d| d.id.as_ref()).and_then(value_to_id))
        .or_else(|| body.id.as_ref().and_then(value_to_id));

    let notification = PaymentNotification {
        topic: params.topic.or(body.topic),
        event_type: params.event_type.or(body.event_type),
        payment_id,
        order_id_hint: params.order_id,
    };

    if let Err(e) = state
        .services
        .reconciliation
        .handle_notification(notification)
        .await
    {
        // Acknowledged anyway; the gateway will redeliver transient cases
        // and permanent ones must not loop forever.
        warn!(error = %e, "payment notification processing failed");
    }

    StatusCode::OK
}
