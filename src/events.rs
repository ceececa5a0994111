use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the order workflow after a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    CheckoutSessionCreated {
        order_id: Uuid,
        session_id: String,
    },
    PaymentReconciled {
        order_id: Uuid,
        old_status: String,
        new_status: String,
        gateway_status: String,
    },
    StockReleased {
        order_id: Uuid,
        line_items: usize,
    },
    OrderShipped(Uuid),
    OrderUnshipped(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Fire-and-forget: a full or closed channel drops the event with a
    /// warning instead of blocking the request path. Events are
    /// observational, never load-bearing.
    pub fn send_or_log(&self, event: Event) {
        if let Err(e) = self.sender.try_send(event) {
            warn!(error = %e, "event channel rejected event");
        }
    }
}

/// Background consumer that turns workflow events into structured log lines.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(%order_id, "order created");
            }
            Event::CheckoutSessionCreated {
                order_id,
                session_id,
            } => {
                info!(%order_id, %session_id, "checkout session created");
            }
            Event::PaymentReconciled {
                order_id,
                old_status,
                new_status,
                gateway_status,
            } => {
                info!(%order_id, %old_status, %new_status, %gateway_status, "payment reconciled");
            }
            Event::StockReleased {
                order_id,
                line_items,
            } => {
                info!(%order_id, line_items, "reserved stock released");
            }
            Event::OrderShipped(order_id) => {
                info!(%order_id, "order shipped");
            }
            Event::OrderUnshipped(order_id) => {
                info!(%order_id, "order returned to paid");
            }
        }
    }
}
