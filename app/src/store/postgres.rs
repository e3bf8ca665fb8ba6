// app/src/store/postgres.rs

use crate::config::AppConfig;
use crate::errors::Result;
use crate::models::{
  NewOrder, NewOrderItem, Order, OrderItem, OrderState, OrderStatus, PaymentStatus, ProcessedEvent, SaveResult,
};
use crate::store::{classify_missed_transition, OrderStore, TransitionOutcome};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::str::FromStr;
use tracing::{info, instrument};
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, order_number, user_id, total_amount, currency, status, payment_status, \
   shipping_address, billing_address, notes, stripe_session_id, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, position, product_id, product_variant_id, product_name, variant_name, \
   quantity, unit_price, total_price, created_at";

/// Opens the pool with the privileged service credential as the password.
pub async fn connect(config: &AppConfig) -> Result<PgPool> {
  let options = PgConnectOptions::from_str(&config.database_url)?.password(&config.database_service_key);
  let pool = PgPoolOptions::new()
    .max_connections(config.database_max_connections)
    .connect_with(options)
    .await?;
  info!("Successfully connected to the database.");
  Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
  sqlx::migrate!("./migrations").run(pool).await?;
  info!("Database migrations applied.");
  Ok(())
}

#[derive(Clone)]
pub struct PgOrderStore {
  pool: PgPool,
}

impl PgOrderStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl OrderStore for PgOrderStore {
  #[instrument(skip_all, fields(user_id = %order.user_id, item_count = items.len()))]
  async fn create_order_with_items(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<(Order, Vec<OrderItem>)> {
    let mut tx = self.pool.begin().await?;

    let insert_order = format!(
      "INSERT INTO orders (id, user_id, total_amount, currency, status, payment_status, shipping_address, billing_address, notes) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
      ORDER_COLUMNS
    );
    let created = sqlx::query_as::<_, Order>(&insert_order)
      .bind(Uuid::new_v4())
      .bind(order.user_id)
      .bind(order.total_amount)
      .bind(&order.currency)
      .bind(OrderStatus::Pending)
      .bind(PaymentStatus::Pending)
      .bind(Json(&order.shipping_address))
      .bind(Json(&order.billing_address))
      .bind(&order.notes)
      .fetch_one(&mut *tx)
      .await?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
      "INSERT INTO order_items (id, order_id, position, product_id, product_variant_id, product_name, variant_name, quantity, unit_price, total_price) ",
    );
    builder.push_values(items.into_iter().enumerate(), |mut row, (position, item)| {
      row
        .push_bind(Uuid::new_v4())
        .push_bind(created.id)
        .push_bind(position as i32)
        .push_bind(item.product_id)
        .push_bind(item.product_variant_id)
        .push_bind(item.product_name)
        .push_bind(item.variant_name)
        .push_bind(item.quantity)
        .push_bind(item.unit_price)
        .push_bind(item.total_price);
    });
    builder.push(" RETURNING ");
    builder.push(ITEM_COLUMNS);
    let mut stored_items = builder.build_query_as::<OrderItem>().fetch_all(&mut *tx).await?;
    stored_items.sort_by_key(|item| item.position);

    tx.commit().await?;
    Ok((created, stored_items))
  }

  async fn attach_checkout_session(&self, order_id: Uuid, session_id: &str) -> Result<()> {
    sqlx::query("UPDATE orders SET stripe_session_id = $2, updated_at = NOW() WHERE id = $1")
      .bind(order_id)
      .bind(session_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>> {
    let query = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
    Ok(sqlx::query_as::<_, Order>(&query).bind(order_id).fetch_optional(&self.pool).await?)
  }

  async fn find_order_by_session(&self, session_id: &str) -> Result<Option<Order>> {
    let query = format!("SELECT {} FROM orders WHERE stripe_session_id = $1", ORDER_COLUMNS);
    Ok(sqlx::query_as::<_, Order>(&query).bind(session_id).fetch_optional(&self.pool).await?)
  }

  async fn list_order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
    let query = format!("SELECT {} FROM order_items WHERE order_id = $1 ORDER BY position", ITEM_COLUMNS);
    Ok(sqlx::query_as::<_, OrderItem>(&query).bind(order_id).fetch_all(&self.pool).await?)
  }

  #[instrument(skip(self), fields(from = %from, to = %to))]
  async fn transition_order(&self, order_id: Uuid, from: OrderState, to: OrderState) -> Result<TransitionOutcome> {
    let updated: Option<(Uuid,)> = sqlx::query_as(
      "UPDATE orders SET status = $2, payment_status = $3, updated_at = NOW() \
       WHERE id = $1 AND status = $4 AND payment_status = $5 RETURNING id",
    )
    .bind(order_id)
    .bind(to.status)
    .bind(to.payment_status)
    .bind(from.status)
    .bind(from.payment_status)
    .fetch_optional(&self.pool)
    .await?;

    if updated.is_some() {
      return Ok(TransitionOutcome::Applied);
    }

    let current: Option<(OrderStatus, PaymentStatus)> =
      sqlx::query_as("SELECT status, payment_status FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
    Ok(classify_missed_transition(
      current.map(|(status, payment_status)| OrderState { status, payment_status }),
      to,
    ))
  }

  async fn find_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEvent>> {
    Ok(
      sqlx::query_as::<_, ProcessedEvent>(
        "SELECT event_id, event_type, order_id, outcome, detail, processed_at \
         FROM processed_webhook_events WHERE event_id = $1",
      )
      .bind(event_id)
      .fetch_optional(&self.pool)
      .await?,
    )
  }

  async fn record_processed_event(&self, event: ProcessedEvent) -> Result<SaveResult> {
    let result = sqlx::query(
      "INSERT INTO processed_webhook_events (event_id, event_type, order_id, outcome, detail, processed_at) \
       VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (event_id) DO NOTHING",
    )
    .bind(&event.event_id)
    .bind(&event.event_type)
    .bind(event.order_id)
    .bind(&event.outcome)
    .bind(&event.detail)
    .bind(event.processed_at)
    .execute(&self.pool)
    .await?;

    Ok(if result.rows_affected() == 1 {
      SaveResult::Inserted
    } else {
      SaveResult::AlreadyExists
    })
  }
}
