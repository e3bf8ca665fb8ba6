// app/src/models/processed_event.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Ledger row marking a provider event id as already applied.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProcessedEvent {
  pub event_id: String,
  pub event_type: String,
  pub order_id: Option<Uuid>,
  /// `handled` or `ignored`.
  pub outcome: String,
  pub detail: Option<String>,
  pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
  Inserted,
  /// Another delivery of the same event got there first.
  AlreadyExists,
}
