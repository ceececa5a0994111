use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::config::AppConfig;
use crate::entities::order::{self, Entity as Orders, OrderStatus};
use crate::entities::order_item;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::{clamp_text, PaymentGateway, SessionItem, SessionSpec, MAX_TEXT_FIELD_LEN};
use crate::services::inventory::{InventoryService, ReserveOutcome};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CustomerDetails {
    #[validate(length(min = 1, message = "customer name is required"))]
    pub name: String,
    #[validate(email(message = "customer email must be a valid address"))]
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CartItem {
    #[validate(length(min = 1, message = "product id is required"))]
    pub product_id: String,
    #[validate(length(min = 1, message = "item name is required"))]
    pub name: String,
    pub presentation: Option<String>,
    #[validate(range(min = 1, message = "quantity must be a positive integer"))]
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate]
    pub customer: CustomerDetails,
    pub items: Vec<CartItem>,
    pub total_amount: Decimal,
    pub referral_code: Option<String>,
    pub shipping_method: Option<String>,
    #[serde(default)]
    pub shipping_cost: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    /// Gateway-hosted checkout page the buyer should be redirected to.
    pub redirect_url: String,
}

/// Orchestrates order creation: reserve stock and persist the order in one
/// transaction, then create the external checkout session, compensating the
/// reservation when the gateway fails. The gateway cannot participate in the
/// store transaction, hence the two-phase shape.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    config: AppConfig,
    event_sender: EventSender,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        config: AppConfig,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            gateway,
            config,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(customer = %request.customer.email, items = request.items.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<CheckoutResponse, ServiceError> {
        Self::validate_request(&request)?;

        let order_id = Uuid::new_v4();
        let now = Utc::now();

        // Phase one: reservation and order insert, all-or-nothing.
        let txn = self.db.begin().await?;

        for item in &request.items {
            match InventoryService::reserve(&txn, &item.product_id, item.quantity).await? {
                ReserveOutcome::Reserved => {}
                ReserveOutcome::Insufficient { available } => {
                    txn.rollback().await?;
                    info!(
                        product_id = %item.product_id,
                        requested = item.quantity,
                        available,
                        "checkout rejected: insufficient stock"
                    );
                    return Err(ServiceError::InsufficientStock {
                        product_id: item.product_id.clone(),
                        requested: item.quantity,
                        available,
                    });
                }
            }
        }

        let order_model = order::ActiveModel {
            id: Set(order_id),
            customer_name: Set(request.customer.name.clone()),
            customer_email: Set(request.customer.email.clone()),
            customer_phone: Set(request.customer.phone.clone()),
            status: Set(OrderStatus::PendingPreference.as_ref().to_string()),
            total_amount: Set(request.total_amount),
            currency: Set(self.config.currency.clone()),
            payment_method: Set(Some("hosted_checkout".to_string())),
            preference_id: Set(None),
            payment_id: Set(None),
            gateway_status: Set(None),
            paid_at: Set(None),
            shipping_method: Set(request.shipping_method.clone()),
            shipping_cost: Set(request.shipping_cost.unwrap_or_default()),
            tracking_number: Set(None),
            referral_code: Set(request.referral_code.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            shipped_at: Set(None),
        };
        order_model.insert(&txn).await?;

        for item in &request.items {
            let item_model = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(item.product_id.clone()),
                name: Set(item.name.clone()),
                presentation: Set(item.presentation.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                line_total: Set(item.line_total()),
            };
            item_model.insert(&txn).await?;
        }

        txn.commit().await?;
        self.event_sender
            .send_or_log(Event::OrderCreated(order_id));

        // Phase two: the external call. From here on, any failure must give
        // the reserved stock back.
        let spec = self.session_spec(order_id, &request);
        match self.gateway.create_session(&spec).await {
            Ok(session) => {
                // Conditional on the status committed above: a webhook can
                // land before this update (the gateway notifies faster than
                // it answers), terminalize the order, and release its stock.
                // Flipping unconditionally here would resurrect such an order
                // and let a redelivered notification release a second time.
                let flipped = Orders::update_many()
                    .col_expr(
                        order::Column::Status,
                        Expr::value(OrderStatus::PendingPayment.as_ref()),
                    )
                    .col_expr(
                        order::Column::PreferenceId,
                        Expr::value(session.session_id.clone()),
                    )
                    .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(order::Column::Id.eq(order_id))
                    .filter(
                        order::Column::Status.eq(OrderStatus::PendingPreference.as_ref()),
                    )
                    .exec(&*self.db)
                    .await?;

                if flipped.rows_affected == 0 {
                    let status = Orders::find_by_id(order_id)
                        .one(&*self.db)
                        .await?
                        .map(|o| o.status)
                        .unwrap_or_else(|| "missing".to_string());
                    warn!(
                        %order_id,
                        %status,
                        "order resolved concurrently before the checkout session was persisted"
                    );
                    return Err(ServiceError::StateConflict(format!(
                        "order {} was resolved as '{}' before checkout could start",
                        order_id, status
                    )));
                }

                self.event_sender
                    .send_or_log(Event::CheckoutSessionCreated {
                        order_id,
                        session_id: session.session_id,
                    });

                info!(%order_id, "order created, redirecting to hosted checkout");
                Ok(CheckoutResponse {
                    order_id,
                    redirect_url: session.redirect_url,
                })
            }
            Err(gateway_err) => {
                error!(%order_id, error = %gateway_err, "checkout session creation failed, compensating reservation");
                self.compensate(order_id, &request.items).await;
                Err(gateway_err)
            }
        }
    }

    /// Validation happens before any mutation. Unchecked numeric fields are
    /// rejected rather than coerced, and the total is recomputed from line
    /// items instead of trusted from the client.
    fn validate_request(request: &CreateOrderRequest) -> Result<(), ServiceError> {
        request.validate()?;

        if request.items.is_empty() {
            return Err(ServiceError::InvalidInput(
                "order must contain at least one item".to_string(),
            ));
        }

        let mut computed_total = Decimal::ZERO;
        for item in &request.items {
            item.validate()?;
            if item.unit_price < Decimal::ZERO {
                return Err(ServiceError::InvalidInput(format!(
                    "unit price for product {} must be non-negative",
                    item.product_id
                )));
            }
            computed_total += item.line_total();
        }

        if let Some(cost) = request.shipping_cost {
            if cost < Decimal::ZERO {
                return Err(ServiceError::InvalidInput(
                    "shipping cost must be non-negative".to_string(),
                ));
            }
            computed_total += cost;
        }

        if computed_total != request.total_amount {
            return Err(ServiceError::InvalidInput(format!(
                "total_amount {} does not match the sum of line totals {}",
                request.total_amount, computed_total
            )));
        }

        Ok(())
    }

    fn session_spec(&self, order_id: Uuid, request: &CreateOrderRequest) -> SessionSpec {
        let items = request
            .items
            .iter()
            .map(|item| SessionItem {
                id: item.product_id.clone(),
                title: clamp_text(&item.name, MAX_TEXT_FIELD_LEN),
                description: item
                    .presentation
                    .as_deref()
                    .map(|p| clamp_text(p, MAX_TEXT_FIELD_LEN)),
                quantity: item.quantity,
                unit_price: item.unit_price,
                currency: self.config.currency.clone(),
            })
            .collect();

        SessionSpec {
            external_reference: order_id.to_string(),
            items,
            payer_name: request.customer.name.clone(),
            payer_email: request.customer.email.clone(),
            payer_phone: request.customer.phone.clone(),
            success_url: self.config.redirect_url("success", order_id),
            failure_url: self.config.redirect_url("failure", order_id),
            pending_url: self.config.redirect_url("pending", order_id),
            notification_url: self.config.notification_url(order_id),
        }
    }

    /// Best-effort compensation after a post-commit gateway failure: flip the
    /// order to `failed` and restore every reserved line in one transaction.
    /// The conditional status flip makes the release exactly-once — a retry
    /// or a racing notification finds no reservation-holding order and skips.
    /// An irrecoverable failure here is logged for manual review instead of
    /// blocking the response.
    async fn compensate(&self, order_id: Uuid, items: &[CartItem]) {
        let result: Result<bool, ServiceError> = async {
            let txn = self.db.begin().await?;

            let flipped = Orders::update_many()
                .col_expr(
                    order::Column::Status,
                    Expr::value(OrderStatus::Failed.as_ref()),
                )
                .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(order::Column::Id.eq(order_id))
                .filter(order::Column::Status.is_in([
                    OrderStatus::PendingPreference.as_ref(),
                    OrderStatus::PendingPayment.as_ref(),
                ]))
                .exec(&txn)
                .await?;

            if flipped.rows_affected == 0 {
                // Already terminal; the stock was handled elsewhere.
                txn.rollback().await?;
                return Ok(false);
            }

            for item in items {
                InventoryService::release(&txn, &item.product_id, item.quantity).await?;
            }
            txn.commit().await?;
            Ok(true)
        }
        .await;

        match result {
            Ok(true) => {
                self.event_sender
                    .send_or_log(Event::StockReleased {
                        order_id,
                        line_items: items.len(),
                    });
            }
            Ok(false) => {
                info!(%order_id, "compensation skipped, order already terminal");
            }
            Err(e) => {
                error!(
                    %order_id,
                    error = %e,
                    "CRITICAL: failed to restore reserved stock, manual review required"
                );
            }
        }
    }
}
