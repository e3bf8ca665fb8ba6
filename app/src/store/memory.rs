// app/src/store/memory.rs

use crate::errors::{AppError, Result};
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem, OrderState, ProcessedEvent, SaveResult};
use crate::store::{classify_missed_transition, OrderStore, TransitionOutcome};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
  next_order_number: i64,
  orders: HashMap<Uuid, Order>,
  items: HashMap<Uuid, Vec<OrderItem>>,
  processed: HashMap<String, ProcessedEvent>,
}

/// Process-local [`OrderStore`] with the same atomicity and conditional
/// update semantics as the Postgres store. Used by the test suites.
#[derive(Default)]
pub struct MemoryOrderStore {
  state: RwLock<MemoryState>,
  writes: AtomicUsize,
  fail_item_inserts: AtomicBool,
  fail_session_attach: AtomicBool,
}

impl MemoryOrderStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of successful mutating calls so far.
  pub fn write_count(&self) -> usize {
    self.writes.load(Ordering::SeqCst)
  }

  /// Makes the item insert of `create_order_with_items` fail, rolling back the order.
  pub fn fail_item_inserts(&self, fail: bool) {
    self.fail_item_inserts.store(fail, Ordering::SeqCst);
  }

  pub fn fail_session_attach(&self, fail: bool) {
    self.fail_session_attach.store(fail, Ordering::SeqCst);
  }

  pub fn order_count(&self) -> usize {
    self.state.read().orders.len()
  }

  pub fn item_count(&self) -> usize {
    self.state.read().items.values().map(Vec::len).sum()
  }

  pub fn processed_event_count(&self) -> usize {
    self.state.read().processed.len()
  }

  fn bump_writes(&self) {
    self.writes.fetch_add(1, Ordering::SeqCst);
  }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
  async fn create_order_with_items(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<(Order, Vec<OrderItem>)> {
    if self.fail_item_inserts.load(Ordering::SeqCst) {
      return Err(AppError::Internal("injected order item insert failure".to_string()));
    }

    let now = Utc::now();
    let mut state = self.state.write();
    state.next_order_number += 1;

    let created = Order {
      id: Uuid::new_v4(),
      order_number: state.next_order_number,
      user_id: order.user_id,
      total_amount: order.total_amount,
      currency: order.currency,
      status: OrderState::PENDING.status,
      payment_status: OrderState::PENDING.payment_status,
      shipping_address: Json(order.shipping_address),
      billing_address: Json(order.billing_address),
      notes: order.notes,
      stripe_session_id: None,
      created_at: now,
      updated_at: now,
    };

    let stored_items: Vec<OrderItem> = items
      .into_iter()
      .enumerate()
      .map(|(position, item)| OrderItem {
        id: Uuid::new_v4(),
        order_id: created.id,
        position: position as i32,
        product_id: item.product_id,
        product_variant_id: item.product_variant_id,
        product_name: item.product_name,
        variant_name: item.variant_name,
        quantity: item.quantity,
        unit_price: item.unit_price,
        total_price: item.total_price,
        created_at: now,
      })
      .collect();

    state.orders.insert(created.id, created.clone());
    state.items.insert(created.id, stored_items.clone());
    drop(state);

    self.bump_writes();
    Ok((created, stored_items))
  }

  async fn attach_checkout_session(&self, order_id: Uuid, session_id: &str) -> Result<()> {
    if self.fail_session_attach.load(Ordering::SeqCst) {
      return Err(AppError::Internal("injected session attach failure".to_string()));
    }
    let mut state = self.state.write();
    let Some(order) = state.orders.get_mut(&order_id) else {
      return Ok(());
    };
    order.stripe_session_id = Some(session_id.to_string());
    order.updated_at = Utc::now();
    drop(state);
    self.bump_writes();
    Ok(())
  }

  async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>> {
    Ok(self.state.read().orders.get(&order_id).cloned())
  }

  async fn find_order_by_session(&self, session_id: &str) -> Result<Option<Order>> {
    Ok(
      self
        .state
        .read()
        .orders
        .values()
        .find(|o| o.stripe_session_id.as_deref() == Some(session_id))
        .cloned(),
    )
  }

  async fn list_order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
    Ok(self.state.read().items.get(&order_id).cloned().unwrap_or_default())
  }

  async fn transition_order(&self, order_id: Uuid, from: OrderState, to: OrderState) -> Result<TransitionOutcome> {
    let mut state = self.state.write();
    let current = state.orders.get(&order_id).map(Order::state);
    if current != Some(from) {
      return Ok(classify_missed_transition(current, to));
    }
    if let Some(order) = state.orders.get_mut(&order_id) {
      order.status = to.status;
      order.payment_status = to.payment_status;
      order.updated_at = Utc::now();
    }
    drop(state);
    self.bump_writes();
    Ok(TransitionOutcome::Applied)
  }

  async fn find_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEvent>> {
    Ok(self.state.read().processed.get(event_id).cloned())
  }

  async fn record_processed_event(&self, event: ProcessedEvent) -> Result<SaveResult> {
    let mut state = self.state.write();
    if state.processed.contains_key(&event.event_id) {
      return Ok(SaveResult::AlreadyExists);
    }
    state.processed.insert(event.event_id.clone(), event);
    drop(state);
    self.bump_writes();
    Ok(SaveResult::Inserted)
  }
}
