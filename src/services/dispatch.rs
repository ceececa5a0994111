use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::order::{self, Entity as Orders, OrderStatus};
use crate::entities::sales_agent;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Which dispatch queue to list: orders paid and awaiting shipment, or
/// orders already shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DispatchQueue {
    Pending,
    Shipped,
}

/// An order as the warehouse sees it, left-joined with the referring agent's
/// display name.
#[derive(Debug, Serialize, ToSchema)]
pub struct DispatchOrderView {
    pub id: Uuid,
    pub status: OrderStatus,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub total_amount: Decimal,
    pub currency: String,
    pub shipping_method: Option<String>,
    pub shipping_cost: Decimal,
    pub tracking_number: Option<String>,
    pub referral_code: Option<String>,
    pub referring_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
}

impl DispatchOrderView {
    fn from_joined(
        order: order::Model,
        agent: Option<sales_agent::Model>,
    ) -> Result<Self, ServiceError> {
        let status = order
            .parsed_status()
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;
        Ok(Self {
            id: order.id,
            status,
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            customer_phone: order.customer_phone,
            total_amount: order.total_amount,
            currency: order.currency,
            shipping_method: order.shipping_method,
            shipping_cost: order.shipping_cost,
            tracking_number: order.tracking_number,
            referral_code: order.referral_code,
            referring_agent: agent.map(|a| a.display_name),
            created_at: order.created_at,
            paid_at: order.paid_at,
            shipped_at: order.shipped_at,
        })
    }
}

/// Warehouse workflow: `paid ⇄ shipped`. Both transitions are conditional
/// updates targeting `{id, expected status}` so a race can never double-ship
/// or double-revert.
#[derive(Clone)]
pub struct DispatchService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl DispatchService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, queue: DispatchQueue) -> Result<Vec<DispatchOrderView>, ServiceError> {
        let query = match queue {
            DispatchQueue::Pending => Orders::find()
                .filter(order::Column::Status.eq(OrderStatus::Paid.as_ref()))
                .order_by_desc(order::Column::PaidAt),
            DispatchQueue::Shipped => Orders::find()
                .filter(order::Column::Status.eq(OrderStatus::Shipped.as_ref()))
                .order_by_desc(order::Column::ShippedAt),
        };

        let rows = query
            .find_also_related(sales_agent::Entity)
            .all(&*self.db)
            .await?;

        rows.into_iter()
            .map(|(order, agent)| DispatchOrderView::from_joined(order, agent))
            .collect()
    }

    /// Marks a paid order shipped, stamping `shipped_at` and storing the
    /// optional tracking number.
    #[instrument(skip(self))]
    pub async fn ship(
        &self,
        order_id: Uuid,
        tracking_number: Option<String>,
    ) -> Result<DispatchOrderView, ServiceError> {
        let now = Utc::now();
        let updated = Orders::update_many()
            .col_expr(
                order::Column::Status,
                Expr::value(OrderStatus::Shipped.as_ref()),
            )
            .col_expr(order::Column::ShippedAt, Expr::value(now))
            .col_expr(
                order::Column::TrackingNumber,
                Expr::value(tracking_number.clone()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Paid.as_ref()))
            .exec(&*self.db)
            .await?;

        if updated.rows_affected == 0 {
            return Err(self.transition_conflict(order_id, OrderStatus::Paid).await?);
        }

        self.event_sender
            .send_or_log(Event::OrderShipped(order_id));
        info!(%order_id, "order marked shipped");
        self.joined_view(order_id).await
    }

    /// Exact inverse of `ship`: returns a shipped order to the paid queue.
    #[instrument(skip(self))]
    pub async fn unship(&self, order_id: Uuid) -> Result<DispatchOrderView, ServiceError> {
        let now = Utc::now();
        let updated = Orders::update_many()
            .col_expr(
                order::Column::Status,
                Expr::value(OrderStatus::Paid.as_ref()),
            )
            .col_expr(order::Column::ShippedAt, Expr::value(None::<DateTime<Utc>>))
            .col_expr(order::Column::TrackingNumber, Expr::value(None::<String>))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Shipped.as_ref()))
            .exec(&*self.db)
            .await?;

        if updated.rows_affected == 0 {
            return Err(self
                .transition_conflict(order_id, OrderStatus::Shipped)
                .await?);
        }

        self.event_sender
            .send_or_log(Event::OrderUnshipped(order_id));
        info!(%order_id, "order returned to paid");
        self.joined_view(order_id).await
    }

    /// Distinguishes "no such order" from "order exists in the wrong state"
    /// after a conditional update matched nothing.
    async fn transition_conflict(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
    ) -> Result<ServiceError, ServiceError> {
        match Orders::find_by_id(order_id).one(&*self.db).await? {
            None => Ok(ServiceError::NotFound(format!(
                "order {} not found",
                order_id
            ))),
            Some(order) => Ok(ServiceError::StateConflict(format!(
                "order {} is '{}', expected '{}'",
                order_id, order.status, expected
            ))),
        }
    }

    async fn joined_view(&self, order_id: Uuid) -> Result<DispatchOrderView, ServiceError> {
        let (order, agent) = Orders::find_by_id(order_id)
            .find_also_related(sales_agent::Entity)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;
        DispatchOrderView::from_joined(order, agent)
    }
}
