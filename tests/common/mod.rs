#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

use shopfront_api::config::AppConfig;
use shopfront_api::errors::ServiceError;
use shopfront_api::events::EventSender;
use shopfront_api::gateway::{CreatedSession, PaymentGateway, PaymentInfo, SessionSpec};
use shopfront_api::services::checkout::{CartItem, CreateOrderRequest, CustomerDetails};
use shopfront_api::{db, AppState};

/// In-memory stand-in for the payment processor. Sessions are recorded for
/// inspection; payment lookups answer from a scripted map.
pub struct MockGateway {
    session_counter: AtomicU64,
    pub fail_create: AtomicBool,
    pub sessions: Mutex<Vec<SessionSpec>>,
    pub payments: Mutex<HashMap<String, PaymentInfo>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            session_counter: AtomicU64::new(0),
            fail_create: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
            payments: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail_next_sessions(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    /// Scripts the authoritative answer for a payment id.
    pub fn set_payment(&self, payment_id: &str, status: &str, external_reference: Option<Uuid>) {
        self.payments.lock().unwrap().insert(
            payment_id.to_string(),
            PaymentInfo {
                id: payment_id.to_string(),
                status: status.to_string(),
                external_reference: external_reference.map(|id| id.to_string()),
            },
        );
    }

    pub fn recorded_sessions(&self) -> Vec<SessionSpec> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(&self, spec: &SessionSpec) -> Result<CreatedSession, ServiceError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ServiceError::GatewayError(
                "cc_rejected_other_reason".to_string(),
            ));
        }
        let n = self.session_counter.fetch_add(1, Ordering::SeqCst);
        self.sessions.lock().unwrap().push(spec.clone());
        Ok(CreatedSession {
            session_id: format!("sess-{}", n),
            redirect_url: format!(
                "https://gateway.test/checkout/{}",
                spec.external_reference
            ),
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentInfo, ServiceError> {
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| ServiceError::GatewayError(format!("payment {} not found", payment_id)))
    }
}

pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        auto_migrate: true,
        host: "127.0.0.1".to_string(),
        port: 0,
        log_level: "debug".to_string(),
        log_json: false,
        jwt_secret: "test-secret-key-for-testing-purposes-only".to_string(),
        jwt_expiration_secs: 3600,
        gateway_base_url: "https://gateway.test".to_string(),
        gateway_access_token: "test-token".to_string(),
        gateway_timeout_secs: 5,
        storefront_base_url: "https://shop.test".to_string(),
        api_base_url: "https://api.shop.test".to_string(),
        currency: "USD".to_string(),
        cors_allowed_origins: None,
    }
}

/// Fresh in-memory database with migrations applied, mock gateway, and the
/// full service graph.
pub async fn setup() -> TestApp {
    let cfg = test_config();
    let pool = db::establish_connection(&cfg).await.expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");

    let (event_tx, event_rx) = mpsc::channel(256);
    let event_sender = EventSender::new(event_tx);
    tokio::spawn(shopfront_api::events::process_events(event_rx));

    let gateway = Arc::new(MockGateway::new());
    let state = AppState::build(Arc::new(pool), cfg, gateway.clone(), event_sender);

    TestApp { state, gateway }
}

impl TestApp {
    pub async fn seed_stock(&self, product_id: &str, stock: i32) {
        self.state
            .services
            .inventory
            .set_stock(product_id, stock)
            .await
            .expect("seed stock");
    }

    pub async fn stock(&self, product_id: &str) -> i32 {
        self.state
            .services
            .inventory
            .get_stock(product_id)
            .await
            .expect("read stock")
    }
}

pub fn customer() -> CustomerDetails {
    CustomerDetails {
        name: "Ana García".to_string(),
        email: "ana@example.com".to_string(),
        phone: Some("+54 11 5555-0001".to_string()),
    }
}

pub fn cart_item(product_id: &str, quantity: i32, unit_price: Decimal) -> CartItem {
    CartItem {
        product_id: product_id.to_string(),
        name: format!("Product {}", product_id),
        presentation: Some("500g".to_string()),
        quantity,
        unit_price,
    }
}

pub fn order_request(items: Vec<CartItem>) -> CreateOrderRequest {
    let total = items
        .iter()
        .map(|item| item.unit_price * Decimal::from(item.quantity))
        .sum();
    CreateOrderRequest {
        customer: customer(),
        items,
        total_amount: total,
        referral_code: None,
        shipping_method: None,
        shipping_cost: None,
    }
}
