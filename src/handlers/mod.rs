pub mod auth;
pub mod common;
pub mod dispatch;
pub mod health;
pub mod inventory;
pub mod notifications;
pub mod orders;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use crate::services::auth::DispatcherAuthService;
use crate::services::checkout::CheckoutService;
use crate::services::dispatch::DispatchService;
use crate::services::inventory::InventoryService;
use crate::services::reconciliation::ReconciliationService;
use crate::AppState;

/// Aggregated services used by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<CheckoutService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub inventory: Arc<InventoryService>,
    pub dispatch: Arc<DispatchService>,
    pub auth: Arc<DispatcherAuthService>,
}

/// Full API surface. The `/dispatch` subtree is gated by the dispatcher
/// bearer-token middleware; everything else is public or gateway-facing.
pub fn routes(state: &AppState) -> Router<AppState> {
    let dispatch_routes = Router::new()
        .route("/orders", get(dispatch::list_orders))
        .route("/orders/:id/ship", patch(dispatch::ship_order))
        .route("/orders/:id/unship", patch(dispatch::unship_order))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_dispatcher,
        ));

    Router::new()
        .route("/orders", post(orders::create_order))
        .route(
            "/payment-notifications",
            post(notifications::payment_notification),
        )
        .nest("/dispatch", dispatch_routes)
        .route("/inventory/stock-lookup", post(inventory::stock_lookup))
        .route("/inventory/:product_id/stock", put(inventory::set_stock))
        .route("/auth/dispatcher-login", post(auth::dispatcher_login))
        .route("/health", get(health::health_check))
}
