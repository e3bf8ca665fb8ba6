// app/tests/postgres_store_tests.rs
//
// Exercise the SQL behind `PgOrderStore` against a real database. Run with
// `DATABASE_URL=postgres://... cargo test -- --ignored`.
mod common;

use chrono::Utc;
use common::setup_tracing;
use serial_test::serial;
use sqlx::PgPool;
use storefront_payments::models::{Address, NewOrder, NewOrderItem, OrderState, ProcessedEvent, SaveResult};
use storefront_payments::store::postgres::run_migrations;
use storefront_payments::store::{OrderStore, PgOrderStore, TransitionOutcome};
use uuid::Uuid;

async fn pg_store() -> (PgOrderStore, PgPool) {
  setup_tracing();
  let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a scratch database");
  let pool = PgPool::connect(&url).await.expect("connect to DATABASE_URL");
  run_migrations(&pool).await.expect("migrations apply");
  (PgOrderStore::new(pool.clone()), pool)
}

fn new_order(user_id: Uuid, total_amount: i64) -> NewOrder {
  let address = Address {
    line1: "1 Main St".into(),
    city: "Springfield".into(),
    postal_code: "12345".into(),
    country: "US".into(),
    ..Default::default()
  };
  NewOrder {
    user_id,
    total_amount,
    currency: "usd".into(),
    shipping_address: address.clone(),
    billing_address: address,
    notes: Some("leave at the door".into()),
  }
}

fn new_item(name: &str, quantity: i32, unit_price: i64) -> NewOrderItem {
  NewOrderItem {
    product_id: Uuid::new_v4(),
    product_variant_id: None,
    product_name: name.into(),
    variant_name: None,
    quantity,
    unit_price,
    total_price: unit_price * i64::from(quantity),
  }
}

async fn orders_for_user(pool: &PgPool, user_id: Uuid) -> i64 {
  sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
    .bind(user_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
#[ignore]
#[serial]
async fn order_and_items_are_written_together() {
  let (store, pool) = pg_store().await;
  let user_id = Uuid::new_v4();

  let (order, items) = store
    .create_order_with_items(
      new_order(user_id, 2 * 500 + 300),
      vec![new_item("Mug", 2, 500), new_item("Pen", 1, 300)],
    )
    .await
    .unwrap();
  assert_eq!(order.state(), OrderState::PENDING);
  assert!(order.stripe_session_id.is_none());
  assert_eq!(order.shipping_address.city, "Springfield");
  assert_eq!(items.iter().map(|i| i.position).collect::<Vec<_>>(), vec![0, 1]);

  let listed = store.list_order_items(order.id).await.unwrap();
  let names: Vec<_> = listed.iter().map(|i| i.product_name.as_str()).collect();
  assert_eq!(names, vec!["Mug", "Pen"]);

  // The item CHECK constraint fails on the second row; the order row must roll back with it.
  let other_user = Uuid::new_v4();
  let mut broken = new_item("Lamp", 2, 4000);
  broken.total_price = 7000;
  let result = store
    .create_order_with_items(new_order(other_user, 1000 + 7000), vec![new_item("Bulb", 1, 1000), broken])
    .await;
  assert!(result.is_err());
  assert_eq!(orders_for_user(&pool, other_user).await, 0);
  assert_eq!(orders_for_user(&pool, user_id).await, 1);
}

#[tokio::test]
#[ignore]
#[serial]
async fn guarded_transition_classifies_misses() {
  let (store, _pool) = pg_store().await;
  let (order, _) = store
    .create_order_with_items(new_order(Uuid::new_v4(), 500), vec![new_item("Mug", 1, 500)])
    .await
    .unwrap();

  let applied = store
    .transition_order(order.id, OrderState::PENDING, OrderState::CONFIRMED_PAID)
    .await
    .unwrap();
  assert_eq!(applied, TransitionOutcome::Applied);
  let stored = store.find_order(order.id).await.unwrap().unwrap();
  assert_eq!(stored.state(), OrderState::CONFIRMED_PAID);
  assert!(stored.updated_at >= order.updated_at);

  let again = store
    .transition_order(order.id, OrderState::PENDING, OrderState::CONFIRMED_PAID)
    .await
    .unwrap();
  assert_eq!(again, TransitionOutcome::AlreadyApplied);

  let stale = store
    .transition_order(order.id, OrderState::PENDING, OrderState::CANCELLED_FAILED)
    .await
    .unwrap();
  assert_eq!(
    stale,
    TransitionOutcome::Rejected {
      current: OrderState::CONFIRMED_PAID
    }
  );

  let missing = store
    .transition_order(Uuid::new_v4(), OrderState::PENDING, OrderState::CONFIRMED_PAID)
    .await
    .unwrap();
  assert_eq!(missing, TransitionOutcome::NotFound);
}

#[tokio::test]
#[ignore]
#[serial]
async fn session_id_resolves_back_to_order() {
  let (store, _pool) = pg_store().await;
  let (order, _) = store
    .create_order_with_items(new_order(Uuid::new_v4(), 300), vec![new_item("Pen", 1, 300)])
    .await
    .unwrap();
  let session_id = format!("cs_test_{}", Uuid::new_v4().simple());

  assert!(store.find_order_by_session(&session_id).await.unwrap().is_none());
  store.attach_checkout_session(order.id, &session_id).await.unwrap();

  let found = store.find_order_by_session(&session_id).await.unwrap().unwrap();
  assert_eq!(found.id, order.id);
  assert_eq!(found.stripe_session_id.as_deref(), Some(session_id.as_str()));
}

#[tokio::test]
#[ignore]
#[serial]
async fn ledger_insert_is_first_writer_wins() {
  let (store, _pool) = pg_store().await;
  let (order, _) = store
    .create_order_with_items(new_order(Uuid::new_v4(), 300), vec![new_item("Pen", 1, 300)])
    .await
    .unwrap();
  let event_id = format!("evt_{}", Uuid::new_v4().simple());
  let entry = |detail: &str| ProcessedEvent {
    event_id: event_id.clone(),
    event_type: "checkout.session.completed".into(),
    order_id: Some(order.id),
    outcome: "handled".into(),
    detail: Some(detail.into()),
    processed_at: Utc::now(),
  };

  assert!(store.find_processed_event(&event_id).await.unwrap().is_none());
  assert_eq!(store.record_processed_event(entry("applied")).await.unwrap(), SaveResult::Inserted);
  assert_eq!(
    store.record_processed_event(entry("already applied")).await.unwrap(),
    SaveResult::AlreadyExists
  );

  let stored = store.find_processed_event(&event_id).await.unwrap().unwrap();
  assert_eq!(stored.order_id, Some(order.id));
  assert_eq!(stored.detail.as_deref(), Some("applied"));
}
