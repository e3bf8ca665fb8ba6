// app/src/models/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Type as SqlxType};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Confirmed,
  Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_status_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Paid,
  Failed,
}

/// The `(status, payment_status)` pair the reconciler reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderState {
  pub status: OrderStatus,
  pub payment_status: PaymentStatus,
}

impl OrderState {
  pub const PENDING: OrderState = OrderState {
    status: OrderStatus::Pending,
    payment_status: PaymentStatus::Pending,
  };
  pub const CONFIRMED_PAID: OrderState = OrderState {
    status: OrderStatus::Confirmed,
    payment_status: PaymentStatus::Paid,
  };
  pub const CANCELLED_FAILED: OrderState = OrderState {
    status: OrderStatus::Cancelled,
    payment_status: PaymentStatus::Failed,
  };

  pub fn is_terminal(&self) -> bool {
    *self != OrderState::PENDING
  }
}

impl fmt::Display for OrderState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let status = match self.status {
      OrderStatus::Pending => "pending",
      OrderStatus::Confirmed => "confirmed",
      OrderStatus::Cancelled => "cancelled",
    };
    let payment = match self.payment_status {
      PaymentStatus::Pending => "pending",
      PaymentStatus::Paid => "paid",
      PaymentStatus::Failed => "failed",
    };
    write!(f, "{}/{}", status, payment)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
  #[serde(default)]
  pub name: Option<String>,
  pub line1: String,
  #[serde(default)]
  pub line2: Option<String>,
  pub city: String,
  #[serde(default)]
  pub state: Option<String>,
  pub postal_code: String,
  pub country: String,
  #[serde(default)]
  pub phone: Option<String>,
}

impl Address {
  /// Names of required fields that are blank.
  pub fn missing_fields(&self) -> Vec<&'static str> {
    [
      ("line1", &self.line1),
      ("city", &self.city),
      ("postal_code", &self.postal_code),
      ("country", &self.country),
    ]
    .into_iter()
    .filter(|(_, v)| v.trim().is_empty())
    .map(|(k, _)| k)
    .collect()
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
  pub id: Uuid,
  /// Human-facing sequence number. Never used to correlate provider events.
  pub order_number: i64,
  pub user_id: Uuid,
  /// Minor currency units.
  pub total_amount: i64,
  pub currency: String,
  pub status: OrderStatus,
  pub payment_status: PaymentStatus,
  pub shipping_address: Json<Address>,
  pub billing_address: Json<Address>,
  pub notes: Option<String>,
  pub stripe_session_id: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  pub fn state(&self) -> OrderState {
    OrderState {
      status: self.status,
      payment_status: self.payment_status,
    }
  }
}

/// Insert payload for an order; status fields are always `pending/pending`.
#[derive(Debug, Clone)]
pub struct NewOrder {
  pub user_id: Uuid,
  pub total_amount: i64,
  pub currency: String,
  pub shipping_address: Address,
  pub billing_address: Address,
  pub notes: Option<String>,
}
