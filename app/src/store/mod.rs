// app/src/store/mod.rs

//! Persistence seam for orders, order items and the processed-event ledger.
//!
//! The pipelines only talk to [`OrderStore`]; `PgOrderStore` backs it in
//! production and `MemoryOrderStore` in tests.

pub mod memory;
pub mod postgres;

use crate::errors::Result;
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem, OrderState, ProcessedEvent, SaveResult};
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryOrderStore;
pub use postgres::PgOrderStore;

/// Result of a guarded `(status, payment_status)` update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
  /// The row was in the expected state and now holds the target state.
  Applied,
  /// The row already holds the target state (redelivery).
  AlreadyApplied,
  /// The row is in some other state; nothing was written.
  Rejected { current: OrderState },
  NotFound,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Writes the order (`pending/pending`, no session id) and all of its
  /// items atomically. Items come back in submission order.
  async fn create_order_with_items(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<(Order, Vec<OrderItem>)>;

  async fn attach_checkout_session(&self, order_id: Uuid, session_id: &str) -> Result<()>;

  async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>>;

  async fn find_order_by_session(&self, session_id: &str) -> Result<Option<Order>>;

  async fn list_order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>>;

  /// Moves the order from `from` to `to` in a single conditional update.
  async fn transition_order(&self, order_id: Uuid, from: OrderState, to: OrderState) -> Result<TransitionOutcome>;

  async fn find_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEvent>>;

  /// Insert-if-absent on the event id.
  async fn record_processed_event(&self, event: ProcessedEvent) -> Result<SaveResult>;
}

/// Classifies a missed conditional update given the row's current state.
pub(crate) fn classify_missed_transition(current: Option<OrderState>, to: OrderState) -> TransitionOutcome {
  match current {
    None => TransitionOutcome::NotFound,
    Some(state) if state == to => TransitionOutcome::AlreadyApplied,
    Some(state) => TransitionOutcome::Rejected { current: state },
  }
}
