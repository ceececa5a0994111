use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::services::auth::DispatcherClaims;
use crate::services::dispatch::DispatchQueue;
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct DispatchListQuery {
    pub status: DispatchQueue,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ShipRequest {
    pub tracking_number: Option<String>,
}

/// GET /dispatch/orders?status=pending|shipped
#[utoipa::path(
    get,
    path = "/dispatch/orders",
    params(DispatchListQuery),
    responses(
        (status = 200, description = "Orders in the requested queue, newest first", body = [crate::services::dispatch::DispatchOrderView]),
        (status = 401, description = "Missing or invalid session token", body = crate::errors::ErrorResponse)
    ),
    tag = "Dispatch"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<DispatcherClaims>,
    Query(query): Query<DispatchListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    debug!(dispatcher = %claims.sub, queue = ?query.status, "listing dispatch queue");
    let orders = state.services.dispatch.list(query.status).await?;
    Ok(success_response(orders))
}

/// PATCH /dispatch/orders/{id}/ship
#[utoipa::path(
    patch,
    path = "/dispatch/orders/{id}/ship",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = ShipRequest,
    responses(
        (status = 200, description = "Order marked shipped", body = crate::services::dispatch::DispatchOrderView),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order is not in the paid state", body = crate::errors::ErrorResponse)
    ),
    tag = "Dispatch"
)]
pub async fn ship_order(
    State(state): State<AppState>,
    Extension(claims): Extension<DispatcherClaims>,
    Path(order_id): Path<Uuid>,
    body: Option<Json<ShipRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    debug!(dispatcher = %claims.sub, %order_id, "shipping order");
    let tracking_number = body.and_then(|Json(b)| b.tracking_number);
    let order = state
        .services
        .dispatch
        .ship(order_id, tracking_number)
        .await?;
    Ok(success_response(order))
}

/// PATCH /dispatch/orders/{id}/unship
#[utoipa::path(
    patch,
    path = "/dispatch/orders/{id}/unship",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order returned to the paid queue", body = crate::services::dispatch::DispatchOrderView),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order is not in the shipped state", body = crate::errors::ErrorResponse)
    ),
    tag = "Dispatch"
)]
pub async fn unship_order(
    State(state): State<AppState>,
    Extension(claims): Extension<DispatcherClaims>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    debug!(dispatcher = %claims.sub, %order_id, "reverting shipment");
    let order = state.services.dispatch.unship(order_id).await?;
    Ok(success_response(order))
}
