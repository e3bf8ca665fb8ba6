// app/tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use flowline::ContextData;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use storefront_payments::config::AppConfig;
use storefront_payments::errors::{AppError, Result};
use storefront_payments::events::EventOutcome;
use storefront_payments::models::{Address, CheckoutRequest, NewOrder, NewOrderItem, Order};
use storefront_payments::pipelines::contexts::WebhookCtxData;
use storefront_payments::services::{CheckoutGateway, CheckoutSession, CheckoutSessionRequest};
use storefront_payments::store::{MemoryOrderStore, OrderStore};
use storefront_payments::AppState;
use tracing::Level;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

/// Gateway double that records every request and hands out sequential sessions.
#[derive(Default)]
pub struct MockGateway {
  pub requests: Mutex<Vec<CheckoutSessionRequest>>,
  fail: AtomicBool,
}

impl MockGateway {
  pub fn failing() -> Self {
    let gateway = Self::default();
    gateway.fail.store(true, Ordering::SeqCst);
    gateway
  }

  pub fn last_request(&self) -> Option<CheckoutSessionRequest> {
    self.requests.lock().last().cloned()
  }
}

#[async_trait]
impl CheckoutGateway for MockGateway {
  async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> Result<CheckoutSession> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(AppError::PaymentProvider("Stripe returned 500 Internal Server Error".to_string()));
    }
    let mut requests = self.requests.lock();
    requests.push(request);
    let id = format!("cs_test_{}", requests.len());
    Ok(CheckoutSession {
      url: format!("https://checkout.stripe.test/pay/{}", id),
      id,
    })
  }
}

pub fn test_config(webhook_secret: Option<&str>) -> AppConfig {
  let mut vars: HashMap<&str, String> = HashMap::from([
    ("DATABASE_URL", "postgres://localhost/storefront_test".to_string()),
    ("DATABASE_SERVICE_KEY", "service-key".to_string()),
    ("STRIPE_SECRET_KEY", "sk_test_123".to_string()),
  ]);
  if let Some(secret) = webhook_secret {
    vars.insert("STRIPE_WEBHOOK_SECRET", secret.to_string());
  }
  AppConfig::from_lookup(|name| vars.get(name).cloned()).expect("test config")
}

pub struct TestApp {
  pub state: AppState,
  pub store: Arc<MemoryOrderStore>,
  pub gateway: Arc<MockGateway>,
}

pub fn test_app_with(config: AppConfig, gateway: MockGateway) -> TestApp {
  let store = Arc::new(MemoryOrderStore::new());
  let gateway = Arc::new(gateway);
  let state = AppState::new(config, store.clone(), gateway.clone());
  TestApp { state, store, gateway }
}

pub fn test_app() -> TestApp {
  test_app_with(test_config(None), MockGateway::default())
}

pub fn address() -> Value {
  json!({
    "name": "Ada Lovelace",
    "line1": "12 Analytical Way",
    "city": "London",
    "postal_code": "N1 9GU",
    "country": "GB"
  })
}

pub fn item_json(name: &str, variant: Option<&str>, quantity: i32, unit_price: i64) -> Value {
  json!({
    "product_id": Uuid::new_v4(),
    "product_variant_id": variant.map(|_| Uuid::new_v4()),
    "product_name": name,
    "variant_name": variant,
    "quantity": quantity,
    "unit_price": unit_price,
    "total_price": unit_price * i64::from(quantity)
  })
}

pub fn checkout_json(items: Vec<Value>) -> Value {
  let total: i64 = items.iter().map(|i| i["total_price"].as_i64().unwrap_or(0)).sum();
  json!({
    "orderData": {
      "user_id": Uuid::new_v4(),
      "total_amount": total,
      "shipping_address": address(),
      "order_items": items
    },
    "successUrl": "https://shop.test/checkout/success",
    "cancelUrl": "https://shop.test/cart"
  })
}

pub fn checkout_request(items: Vec<Value>) -> CheckoutRequest {
  serde_json::from_value(checkout_json(items)).expect("valid checkout json")
}

/// Stores a `pending/pending` order directly, optionally with a session id.
pub async fn seed_pending_order(store: &MemoryOrderStore, session_id: Option<&str>) -> Order {
  let address: Address = serde_json::from_value(address()).expect("address");
  let (order, _) = store
    .create_order_with_items(
      NewOrder {
        user_id: Uuid::new_v4(),
        total_amount: 1500,
        currency: "usd".to_string(),
        shipping_address: address.clone(),
        billing_address: address,
        notes: None,
      },
      vec![NewOrderItem {
        product_id: Uuid::new_v4(),
        product_variant_id: None,
        product_name: "Notebook".to_string(),
        variant_name: None,
        quantity: 3,
        unit_price: 500,
        total_price: 1500,
      }],
    )
    .await
    .expect("seed order");
  if let Some(session_id) = session_id {
    store.attach_checkout_session(order.id, session_id).await.expect("attach session");
  }
  store.find_order(order.id).await.expect("lookup").expect("seeded order")
}

pub fn event_body(event_id: Option<&str>, event_type: &str, object: Value) -> Vec<u8> {
  let mut event = json!({ "type": event_type, "data": { "object": object } });
  if let Some(id) = event_id {
    event["id"] = json!(id);
  }
  serde_json::to_vec(&event).expect("event json")
}

pub fn session_object(session_id: &str, order_id: Option<Uuid>) -> Value {
  match order_id {
    Some(id) => json!({
      "id": session_id,
      "client_reference_id": id.to_string(),
      "metadata": { "order_id": id.to_string() }
    }),
    None => json!({ "id": session_id, "metadata": {} }),
  }
}

/// Runs the webhook pipeline directly and returns the settled outcome.
pub async fn deliver(state: &AppState, body: Vec<u8>, signature: Option<&str>) -> Result<EventOutcome> {
  let ctx_data = ContextData::new(WebhookCtxData::new(
    state.clone(),
    body,
    signature.map(String::from),
    chrono::Utc::now().timestamp(),
  ));
  state.flows.run(ctx_data.clone()).await?;
  let outcome = ctx_data.read().outcome.clone();
  outcome.ok_or_else(|| AppError::Internal("no outcome".to_string()))
}
