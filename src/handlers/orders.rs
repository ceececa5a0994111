use axum::{extract::State, response::IntoResponse, Json};

use crate::errors::ServiceError;
use crate::handlers::common::created_response;
use crate::services::checkout::CreateOrderRequest;
use crate::AppState;

/// POST /orders
///
/// Creates an order, reserves stock, and returns the gateway-hosted checkout
/// URL the buyer should be redirected to.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created, redirect to hosted checkout", body = crate::services::checkout::CheckoutResponse),
        (status = 400, description = "Invalid input or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.services.checkout.create_order(request).await?;
    Ok(created_response(response))
}
