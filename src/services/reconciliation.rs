use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::order::{self, Entity as Orders, OrderStatus};
use crate::entities::order_item::{self, Entity as OrderItems};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::PaymentGateway;
use crate::services::inventory::InventoryService;

/// An inbound gateway notification, already flattened from query/body by the
/// handler. Delivery is at-least-once and possibly out of order; nothing in
/// here is trusted beyond the payment id used for the authoritative lookup.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PaymentNotification {
    pub topic: Option<String>,
    pub event_type: Option<String>,
    pub payment_id: Option<String>,
    /// Correlation hint carried on the callback URL; only used when the
    /// gateway fails to echo an external reference.
    pub order_id_hint: Option<Uuid>,
}

impl PaymentNotification {
    fn concerns_payment(&self) -> bool {
        let matches_payment = |value: &Option<String>| {
            value
                .as_deref()
                .map(|v| v.starts_with("payment"))
                .unwrap_or(false)
        };
        matches_payment(&self.topic) || matches_payment(&self.event_type)
    }
}

/// Maps the gateway's vocabulary onto an order-status transition. `None`
/// means "mirror the raw status, change nothing".
fn target_status(gateway_status: &str) -> Option<OrderStatus> {
    match gateway_status {
        "approved" => Some(OrderStatus::Paid),
        "rejected" | "cancelled" | "refunded" | "charged_back" => Some(OrderStatus::Failed),
        "in_process" | "pending" => Some(OrderStatus::PendingPayment),
        _ => None,
    }
}

/// Applies asynchronous payment notifications to orders. Idempotent under
/// duplicate delivery, tolerant of out-of-order delivery, and the only other
/// writer of inventory besides the checkout orchestrator.
#[derive(Clone)]
pub struct ReconciliationService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: EventSender,
}

impl ReconciliationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            gateway,
            event_sender,
        }
    }

    /// Processes one notification. Errors returned here are logged by the
    /// HTTP boundary, which acknowledges with 200 regardless so the gateway
    /// does not retry forever on a permanently-broken notification; a
    /// transient failure before any mutation simply waits for redelivery.
    #[instrument(skip(self, notification), fields(payment_id = ?notification.payment_id))]
    pub async fn handle_notification(
        &self,
        notification: PaymentNotification,
    ) -> Result<(), ServiceError> {
        if !notification.concerns_payment() {
            debug!(topic = ?notification.topic, "ignoring non-payment notification");
            return Ok(());
        }

        let Some(payment_id) = notification.payment_id.clone() else {
            debug!("notification carries no payment id, acknowledging");
            return Ok(());
        };

        // Authoritative status, straight from the gateway. Failure here is
        // safe: no state has been touched and the gateway will redeliver.
        let payment = self.gateway.get_payment(&payment_id).await?;

        // The echoed external reference is the correlation key; the hint on
        // the request is an untrusted fallback.
        let order_id = payment
            .external_reference
            .as_deref()
            .and_then(|r| Uuid::parse_str(r).ok())
            .or(notification.order_id_hint);
        let Some(order_id) = order_id else {
            warn!(%payment_id, "payment has no resolvable order reference");
            return Ok(());
        };

        let txn = self.db.begin().await?;

        let Some(order) = Orders::find_by_id(order_id).one(&txn).await? else {
            warn!(%order_id, %payment_id, "notification for unknown order");
            return Ok(());
        };

        let current = order
            .parsed_status()
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        // Forbid regressions out of a settled state: a stray late
        // `in_process` must not drag a paid or failed order back to
        // pending_payment. The raw gateway status is still mirrored.
        let target = match target_status(&payment.status) {
            Some(OrderStatus::PendingPayment)
                if matches!(current, OrderStatus::Paid | OrderStatus::Failed) =>
            {
                None
            }
            other => other,
        };
        let new_status = target.unwrap_or(current);

        // Idempotence guard: this notification has already been applied.
        if new_status == current && order.gateway_status.as_deref() == Some(payment.status.as_str())
        {
            debug!(%order_id, status = %payment.status, "notification already applied");
            txn.commit().await?;
            return Ok(());
        }

        // Conditional flip on the status observed in this transaction. A
        // concurrent duplicate blocks on the row lock, then matches zero
        // rows and backs off, so stock can never be released twice.
        let now = Utc::now();
        let mut update = Orders::update_many()
            .col_expr(order::Column::Status, Expr::value(new_status.as_ref()))
            .col_expr(
                order::Column::GatewayStatus,
                Expr::value(payment.status.clone()),
            )
            .col_expr(order::Column::PaymentId, Expr::value(payment.id.clone()))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(current.as_ref()));

        if new_status == OrderStatus::Paid && current != OrderStatus::Paid {
            update = update.col_expr(order::Column::PaidAt, Expr::value(now));
        }

        let flipped = update.exec(&txn).await?;
        if flipped.rows_affected == 0 {
            txn.rollback().await?;
            info!(%order_id, "order changed concurrently, deferring to redelivery");
            return Ok(());
        }

        // A failure transition out of a reservation-holding state is the one
        // case that gives stock back, in the same transaction as the flip.
        let mut released_lines = 0usize;
        if new_status == OrderStatus::Failed && current.holds_reservation() {
            let items = OrderItems::find()
                .filter(order_item::Column::OrderId.eq(order_id))
                .all(&txn)
                .await?;
            for item in &items {
                InventoryService::release(&txn, &item.product_id, item.quantity).await?;
            }
            released_lines = items.len();
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PaymentReconciled {
                order_id,
                old_status: current.to_string(),
                new_status: new_status.to_string(),
                gateway_status: payment.status.clone(),
            });
        if released_lines > 0 {
            self.event_sender
                .send_or_log(Event::StockReleased {
                    order_id,
                    line_items: released_lines,
                });
        }

        info!(
            %order_id,
            %payment_id,
            gateway_status = %payment.status,
            old_status = %current,
            new_status = %new_status,
            "payment notification reconciled"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approved_maps_to_paid() {
        assert_eq!(target_status("approved"), Some(OrderStatus::Paid));
    }

    #[test]
    fn all_failure_vocabulary_maps_to_failed() {
        for raw in ["rejected", "cancelled", "refunded", "charged_back"] {
            assert_eq!(target_status(raw), Some(OrderStatus::Failed), "{}", raw);
        }
    }

    #[test]
    fn in_flight_vocabulary_maps_to_pending_payment() {
        for raw in ["in_process", "pending"] {
            assert_eq!(target_status(raw), Some(OrderStatus::PendingPayment));
        }
    }

    #[test]
    fn unknown_vocabulary_changes_nothing() {
        assert_eq!(target_status("authorized_partial"), None);
    }

    #[test]
    fn payment_topics_are_recognized() {
        let n = PaymentNotification {
            topic: Some("payment".to_string()),
            ..Default::default()
        };
        assert!(n.concerns_payment());

        let n = PaymentNotification {
            event_type: Some("payment.updated".to_string()),
            ..Default::default()
        };
        assert!(n.concerns_payment());

        let n = PaymentNotification {
            topic: Some("merchant_order".to_string()),
            ..Default::default()
        };
        assert!(!n.concerns_payment());
    }
}
