//! shopfront-api
//!
//! Order and payment backend: hosted-checkout order creation, asynchronous
//! payment-status reconciliation, conditional inventory reservation, and the
//! warehouse dispatch workflow.
#![forbid(unsafe_code)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

pub use handlers::AppServices;

/// Shared application state, constructed once in `main` (or a test harness)
/// and handed to the router. No ambient singletons: the database handle and
/// every service are explicit members.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: AppServices,
}

impl AppState {
    /// Wires the full service graph over a connected database and a payment
    /// gateway implementation.
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        gateway: Arc<dyn gateway::PaymentGateway>,
        event_sender: events::EventSender,
    ) -> Self {
        let inventory = Arc::new(services::inventory::InventoryService::new(db.clone()));
        let checkout = Arc::new(services::checkout::CheckoutService::new(
            db.clone(),
            gateway.clone(),
            config.clone(),
            event_sender.clone(),
        ));
        let reconciliation = Arc::new(services::reconciliation::ReconciliationService::new(
            db.clone(),
            gateway,
            event_sender.clone(),
        ));
        let dispatch = Arc::new(services::dispatch::DispatchService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let auth = Arc::new(services::auth::DispatcherAuthService::new(
            db.clone(),
            config.jwt_secret.clone(),
            config.jwt_expiration_secs,
        ));

        Self {
            db,
            config,
            event_sender,
            services: AppServices {
                checkout,
                reconciliation,
                inventory,
                dispatch,
                auth,
            },
        }
    }
}

/// Builds the application router with the API surface and Swagger UI.
pub fn app_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .merge(handlers::routes(&state))
        .merge(openapi::swagger_ui())
        .with_state(state)
}
