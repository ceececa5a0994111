mod common;

use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use shopfront_api::entities::order::OrderStatus;
use shopfront_api::entities::sales_agent;
use shopfront_api::errors::ServiceError;
use shopfront_api::services::dispatch::DispatchQueue;
use shopfront_api::services::reconciliation::PaymentNotification;

use common::{cart_item, order_request, setup, TestApp};

async fn place_order(app: &TestApp, referral_code: Option<&str>) -> Uuid {
    let mut request = order_request(vec![cart_item("yerba-500", 1, dec!(10.00))]);
    request.referral_code = referral_code.map(str::to_string);
    app.state
        .services
        .checkout
        .create_order(request)
        .await
        .expect("checkout should succeed")
        .order_id
}

async fn pay_order(app: &TestApp, order_id: Uuid, payment_id: &str) {
    app.gateway.set_payment(payment_id, "approved", Some(order_id));
    app.state
        .services
        .reconciliation
        .handle_notification(PaymentNotification {
            topic: Some("payment".to_string()),
            event_type: None,
            payment_id: Some(payment_id.to_string()),
            order_id_hint: None,
        })
        .await
        .expect("reconciliation should succeed");
}

#[tokio::test]
async fn pending_queue_lists_paid_orders_only() {
    let app = setup().await;
    app.seed_stock("yerba-500", 10).await;

    let unpaid = place_order(&app, None).await;
    let paid = place_order(&app, None).await;
    pay_order(&app, paid, "pay-1").await;

    let pending = app
        .state
        .services
        .dispatch
        .list(DispatchQueue::Pending)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, paid);
    assert!(pending.iter().all(|o| o.id != unpaid));

    let shipped = app
        .state
        .services
        .dispatch
        .list(DispatchQueue::Shipped)
        .await
        .unwrap();
    assert!(shipped.is_empty());
}

#[tokio::test]
async fn ship_and_unship_round_trip() {
    let app = setup().await;
    app.seed_stock("yerba-500", 10).await;
    let order_id = place_order(&app, None).await;
    pay_order(&app, order_id, "pay-1").await;

    let shipped = app
        .state
        .services
        .dispatch
        .ship(order_id, Some("TRK-001".to_string()))
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert_eq!(shipped.tracking_number.as_deref(), Some("TRK-001"));
    assert!(shipped.shipped_at.is_some());

    let queue = app
        .state
        .services
        .dispatch
        .list(DispatchQueue::Shipped)
        .await
        .unwrap();
    assert_eq!(queue.len(), 1);

    let reverted = app.state.services.dispatch.unship(order_id).await.unwrap();
    assert_eq!(reverted.status, OrderStatus::Paid);
    assert!(reverted.tracking_number.is_none());
    assert!(reverted.shipped_at.is_none());
    // Back in the pending queue.
    let pending = app
        .state
        .services
        .dispatch
        .list(DispatchQueue::Pending)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, order_id);
}

#[tokio::test]
async fn shipping_an_unpaid_order_is_a_state_conflict() {
    let app = setup().await;
    app.seed_stock("yerba-500", 10).await;
    let order_id = place_order(&app, None).await;

    let err = app
        .state
        .services
        .dispatch
        .ship(order_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::StateConflict(_)));
    assert!(err.to_string().contains("pending_payment"));
}

#[tokio::test]
async fn unshipping_a_paid_order_is_a_state_conflict() {
    let app = setup().await;
    app.seed_stock("yerba-500", 10).await;
    let order_id = place_order(&app, None).await;
    pay_order(&app, order_id, "pay-1").await;

    let err = app.state.services.dispatch.unship(order_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::StateConflict(_)));
}

#[tokio::test]
async fn shipping_an_unknown_order_is_not_found() {
    let app = setup().await;
    let err = app
        .state
        .services
        .dispatch
        .ship(Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn double_ship_loses_the_race() {
    let app = setup().await;
    app.seed_stock("yerba-500", 10).await;
    let order_id = place_order(&app, None).await;
    pay_order(&app, order_id, "pay-1").await;

    let first = app.state.services.dispatch.ship(order_id, None);
    let second = app.state.services.dispatch.ship(order_id, None);
    let (a, b) = tokio::join!(first, second);
    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn referring_agent_name_is_joined_into_the_view() {
    let app = setup().await;
    app.seed_stock("yerba-500", 10).await;

    sales_agent::ActiveModel {
        code: Set("AG-7".to_string()),
        display_name: Set("Carla Méndez".to_string()),
    }
    .insert(&*app.state.db)
    .await
    .unwrap();

    let with_agent = place_order(&app, Some("AG-7")).await;
    let without = place_order(&app, None).await;
    pay_order(&app, with_agent, "pay-1").await;
    pay_order(&app, without, "pay-2").await;

    let pending = app
        .state
        .services
        .dispatch
        .list(DispatchQueue::Pending)
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);

    let referred = pending.iter().find(|o| o.id == with_agent).unwrap();
    assert_eq!(referred.referral_code.as_deref(), Some("AG-7"));
    assert_eq!(referred.referring_agent.as_deref(), Some("Carla Méndez"));

    let plain = pending.iter().find(|o| o.id == without).unwrap();
    assert!(plain.referring_agent.is_none());
}

#[tokio::test]
async fn unknown_referral_codes_join_to_nothing() {
    let app = setup().await;
    app.seed_stock("yerba-500", 10).await;
    let order_id = place_order(&app, Some("NO-SUCH-AGENT")).await;
    pay_order(&app, order_id, "pay-1").await;

    let pending = app
        .state
        .services
        .dispatch
        .list(DispatchQueue::Pending)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].referral_code.as_deref(), Some("NO-SUCH-AGENT"));
    assert!(pending[0].referring_agent.is_none());
}
