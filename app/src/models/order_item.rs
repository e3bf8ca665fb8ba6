// app/src/models/order_item.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted order line. Names are copied from the catalog at order time
/// and never follow later catalog edits.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  /// Zero-based index of the line in the submitted checkout.
  pub position: i32,
  pub product_id: Uuid,
  pub product_variant_id: Option<Uuid>,
  pub product_name: String,
  pub variant_name: Option<String>,
  pub quantity: i32,
  pub unit_price: i64,
  pub total_price: i64,
  pub created_at: DateTime<Utc>,
}

impl OrderItem {
  pub fn display_name(&self) -> String {
    display_name(&self.product_name, self.variant_name.as_deref())
  }
}

/// A line as submitted by the storefront; also the insert payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
  pub product_id: Uuid,
  #[serde(default)]
  pub product_variant_id: Option<Uuid>,
  pub product_name: String,
  #[serde(default)]
  pub variant_name: Option<String>,
  pub quantity: i32,
  pub unit_price: i64,
  pub total_price: i64,
}

impl NewOrderItem {
  /// `unit_price * quantity`, or `None` on overflow or a negative quantity.
  pub fn expected_total(&self) -> Option<i64> {
    let quantity = i64::from(self.quantity);
    if quantity < 0 {
      return None;
    }
    self.unit_price.checked_mul(quantity)
  }
}

fn display_name(product_name: &str, variant_name: Option<&str>) -> String {
  match variant_name.map(str::trim).filter(|v| !v.is_empty()) {
    Some(variant) => format!("{} ({})", product_name, variant),
    None => product_name.to_string(),
  }
}
