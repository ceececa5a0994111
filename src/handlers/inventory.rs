use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct StockLookupRequest {
    pub product_ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockLookupResponse {
    /// Product id to available stock; ids without a record map to 0.
    pub stock: HashMap<String, i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetStockRequest {
    pub new_stock: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockLevelResponse {
    pub product_id: String,
    pub stock: i32,
}

/// POST /inventory/stock-lookup
#[utoipa::path(
    post,
    path = "/inventory/stock-lookup",
    request_body = StockLookupRequest,
    responses(
        (status = 200, description = "Current stock per product", body = StockLookupResponse)
    ),
    tag = "Inventory"
)]
pub async fn stock_lookup(
    State(state): State<AppState>,
    Json(request): Json<StockLookupRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let stock = state
        .services
        .inventory
        .stock_levels(&request.product_ids)
        .await?;
    Ok(success_response(StockLookupResponse { stock }))
}

/// PUT /inventory/{product_id}/stock
#[utoipa::path(
    put,
    path = "/inventory/{product_id}/stock",
    params(("product_id" = String, Path, description = "Product identifier")),
    request_body = SetStockRequest,
    responses(
        (status = 200, description = "Stock level upserted", body = StockLevelResponse),
        (status = 400, description = "Negative stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Inventory"
)]
pub async fn set_stock(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(request): Json<SetStockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let level = state
        .services
        .inventory
        .set_stock(&product_id, request.new_stock)
        .await?;
    Ok(success_response(StockLevelResponse {
        product_id: level.product_id,
        stock: level.stock,
    }))
}
