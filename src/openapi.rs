use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::orders::create_order,
        handlers::notifications::payment_notification,
        handlers::dispatch::list_orders,
        handlers::dispatch::ship_order,
        handlers::dispatch::unship_order,
        handlers::inventory::stock_lookup,
        handlers::inventory::set_stock,
        handlers::auth::dispatcher_login,
        handlers::health::health_check,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::entities::order::OrderStatus,
        crate::services::checkout::CreateOrderRequest,
        crate::services::checkout::CustomerDetails,
        crate::services::checkout::CartItem,
        crate::services::checkout::CheckoutResponse,
        crate::services::dispatch::DispatchOrderView,
        crate::services::dispatch::DispatchQueue,
        crate::services::auth::LoginResponse,
        handlers::auth::LoginRequest,
        handlers::dispatch::ShipRequest,
        handlers::inventory::StockLookupRequest,
        handlers::inventory::StockLookupResponse,
        handlers::notifications::NotificationBody,
        handlers::notifications::NotificationData,
        handlers::inventory::SetStockRequest,
        handlers::inventory::StockLevelResponse,
        handlers::health::HealthResponse,
    )),
    tags(
        (name = "Orders", description = "Order creation and hosted checkout"),
        (name = "Payments", description = "Gateway payment notifications"),
        (name = "Dispatch", description = "Warehouse shipping workflow"),
        (name = "Inventory", description = "Stock levels"),
        (name = "Auth", description = "Dispatcher sessions"),
        (name = "Health", description = "Liveness")
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
