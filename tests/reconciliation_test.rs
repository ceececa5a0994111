mod common;

use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use uuid::Uuid;

use shopfront_api::entities::order::{Entity as Orders, Model as Order, OrderStatus};
use shopfront_api::errors::ServiceError;
use shopfront_api::services::reconciliation::PaymentNotification;

use common::{cart_item, order_request, setup, TestApp};

async fn place_order(app: &TestApp, product_id: &str, quantity: i32) -> Uuid {
    let request = order_request(vec![cart_item(product_id, quantity, dec!(10.00))]);
    app.state
        .services
        .checkout
        .create_order(request)
        .await
        .expect("checkout should succeed")
        .order_id
}

async fn order(app: &TestApp, order_id: Uuid) -> Order {
    Orders::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("order persisted")
}

fn notification(payment_id: &str) -> PaymentNotification {
    PaymentNotification {
        topic: Some("payment".to_string()),
        event_type: None,
        payment_id: Some(payment_id.to_string()),
        order_id_hint: None,
    }
}

#[tokio::test]
async fn approved_notification_marks_the_order_paid() {
    let app = setup().await;
    app.seed_stock("yerba-500", 5).await;
    let order_id = place_order(&app, "yerba-500", 2).await;
    app.gateway.set_payment("pay-1", "approved", Some(order_id));

    app.state
        .services
        .reconciliation
        .handle_notification(notification("pay-1"))
        .await
        .unwrap();

    let row = order(&app, order_id).await;
    assert_eq!(row.parsed_status().unwrap(), OrderStatus::Paid);
    assert_eq!(row.gateway_status.as_deref(), Some("approved"));
    assert_eq!(row.payment_id.as_deref(), Some("pay-1"));
    assert!(row.paid_at.is_some());
    // Paid orders keep their reservation.
    assert_eq!(app.stock("yerba-500").await, 3);
}

#[tokio::test]
async fn rejected_notification_fails_the_order_and_restores_stock() {
    let app = setup().await;
    app.seed_stock("yerba-500", 5).await;
    let order_id = place_order(&app, "yerba-500", 2).await;
    assert_eq!(app.stock("yerba-500").await, 3);

    app.gateway.set_payment("pay-1", "rejected", Some(order_id));
    app.state
        .services
        .reconciliation
        .handle_notification(notification("pay-1"))
        .await
        .unwrap();

    let row = order(&app, order_id).await;
    assert_eq!(row.parsed_status().unwrap(), OrderStatus::Failed);
    assert_eq!(row.gateway_status.as_deref(), Some("rejected"));
    assert_eq!(app.stock("yerba-500").await, 5);
}

#[tokio::test]
async fn duplicate_failure_notifications_release_stock_once() {
    let app = setup().await;
    app.seed_stock("yerba-500", 5).await;
    let order_id = place_order(&app, "yerba-500", 2).await;
    app.gateway.set_payment("pay-1", "rejected", Some(order_id));

    for _ in 0..3 {
        app.state
            .services
            .reconciliation
            .handle_notification(notification("pay-1"))
            .await
            .unwrap();
    }

    assert_eq!(app.stock("yerba-500").await, 5);
    let row = order(&app, order_id).await;
    assert_eq!(row.parsed_status().unwrap(), OrderStatus::Failed);
}

#[tokio::test]
async fn stray_in_process_does_not_regress_a_paid_order() {
    let app = setup().await;
    app.seed_stock("yerba-500", 5).await;
    let order_id = place_order(&app, "yerba-500", 2).await;

    app.gateway.set_payment("pay-1", "approved", Some(order_id));
    app.state
        .services
        .reconciliation
        .handle_notification(notification("pay-1"))
        .await
        .unwrap();

    // An out-of-order in-flight notification arrives after settlement.
    app.gateway.set_payment("pay-1", "in_process", Some(order_id));
    app.state
        .services
        .reconciliation
        .handle_notification(notification("pay-1"))
        .await
        .unwrap();

    let row = order(&app, order_id).await;
    assert_eq!(row.parsed_status().unwrap(), OrderStatus::Paid);
    // The raw gateway status is still mirrored for the audit trail.
    assert_eq!(row.gateway_status.as_deref(), Some("in_process"));
    assert_eq!(app.stock("yerba-500").await, 3);
}

#[tokio::test]
async fn refund_after_payment_fails_the_order_without_touching_stock() {
    let app = setup().await;
    app.seed_stock("yerba-500", 5).await;
    let order_id = place_order(&app, "yerba-500", 2).await;

    app.gateway.set_payment("pay-1", "approved", Some(order_id));
    app.state
        .services
        .reconciliation
        .handle_notification(notification("pay-1"))
        .await
        .unwrap();

    app.gateway.set_payment("pay-1", "refunded", Some(order_id));
    app.state
        .services
        .reconciliation
        .handle_notification(notification("pay-1"))
        .await
        .unwrap();

    let row = order(&app, order_id).await;
    assert_eq!(row.parsed_status().unwrap(), OrderStatus::Failed);
    // Only reservation-holding states release on failure; the paid order's
    // units already left the ledger's pending count.
    assert_eq!(app.stock("yerba-500").await, 3);
}

#[tokio::test]
async fn external_reference_wins_over_the_url_hint() {
    let app = setup().await;
    app.seed_stock("yerba-500", 10).await;
    let referenced = place_order(&app, "yerba-500", 1).await;
    let hinted = place_order(&app, "yerba-500", 1).await;

    app.gateway.set_payment("pay-1", "approved", Some(referenced));
    let mut n = notification("pay-1");
    n.order_id_hint = Some(hinted);
    app.state
        .services
        .reconciliation
        .handle_notification(n)
        .await
        .unwrap();

    assert_eq!(
        order(&app, referenced).await.parsed_status().unwrap(),
        OrderStatus::Paid
    );
    assert_eq!(
        order(&app, hinted).await.parsed_status().unwrap(),
        OrderStatus::PendingPayment
    );
}

#[tokio::test]
async fn hint_is_used_when_the_gateway_echoes_no_reference() {
    let app = setup().await;
    app.seed_stock("yerba-500", 5).await;
    let order_id = place_order(&app, "yerba-500", 1).await;

    app.gateway.set_payment("pay-1", "approved", None);
    let mut n = notification("pay-1");
    n.order_id_hint = Some(order_id);
    app.state
        .services
        .reconciliation
        .handle_notification(n)
        .await
        .unwrap();

    assert_eq!(
        order(&app, order_id).await.parsed_status().unwrap(),
        OrderStatus::Paid
    );
}

#[tokio::test]
async fn notifications_for_unknown_orders_are_acknowledged() {
    let app = setup().await;
    app.gateway
        .set_payment("pay-9", "approved", Some(Uuid::new_v4()));

    let result = app
        .state
        .services
        .reconciliation
        .handle_notification(notification("pay-9"))
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn non_payment_topics_change_nothing() {
    let app = setup().await;
    app.seed_stock("yerba-500", 5).await;
    let order_id = place_order(&app, "yerba-500", 1).await;
    app.gateway.set_payment("pay-1", "approved", Some(order_id));

    let n = PaymentNotification {
        topic: Some("merchant_order".to_string()),
        event_type: None,
        payment_id: Some("pay-1".to_string()),
        order_id_hint: None,
    };
    app.state
        .services
        .reconciliation
        .handle_notification(n)
        .await
        .unwrap();

    assert_eq!(
        order(&app, order_id).await.parsed_status().unwrap(),
        OrderStatus::PendingPayment
    );
}

#[tokio::test]
async fn gateway_lookup_failure_surfaces_and_defers() {
    let app = setup().await;
    app.seed_stock("yerba-500", 5).await;
    let order_id = place_order(&app, "yerba-500", 1).await;

    // "pay-404" was never scripted, so the authoritative lookup fails.
    let err = app
        .state
        .services
        .reconciliation
        .handle_notification(notification("pay-404"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::GatewayError(_)));

    let row = order(&app, order_id).await;
    assert_eq!(row.parsed_status().unwrap(), OrderStatus::PendingPayment);
    assert_eq!(app.stock("yerba-500").await, 4);
}
