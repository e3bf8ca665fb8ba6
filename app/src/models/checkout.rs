// app/src/models/checkout.rs

//! Storefront checkout payload and its validation into insert payloads.

use crate::errors::{AppError, Result};
use crate::models::{Address, NewOrder, NewOrderItem};
use reqwest::Url;
use serde::Deserialize;
use uuid::Uuid;

/// Hosted checkout accepts at most this many line items per session.
pub const MAX_LINE_ITEMS: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct OrderData {
  pub user_id: Uuid,
  pub total_amount: i64,
  #[serde(default)]
  pub currency: Option<String>,
  pub shipping_address: Address,
  /// Falls back to the shipping address.
  #[serde(default)]
  pub billing_address: Option<Address>,
  #[serde(default)]
  pub notes: Option<String>,
  pub order_items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
  pub order_data: OrderData,
  pub success_url: String,
  pub cancel_url: String,
}

/// A checkout that passed every payload rule and is ready to persist.
#[derive(Debug, Clone)]
pub struct ValidatedCheckout {
  pub order: NewOrder,
  pub items: Vec<NewOrderItem>,
  pub success_url: String,
  pub cancel_url: String,
}

impl CheckoutRequest {
  pub fn validate(self, default_currency: &str) -> Result<ValidatedCheckout> {
    let CheckoutRequest {
      order_data,
      success_url,
      cancel_url,
    } = self;

    ensure_redirect_url("successUrl", &success_url)?;
    ensure_redirect_url("cancelUrl", &cancel_url)?;

    let currency = order_data
      .currency
      .as_deref()
      .map(str::trim)
      .filter(|c| !c.is_empty())
      .unwrap_or(default_currency)
      .to_ascii_lowercase();
    if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_lowercase()) {
      return Err(AppError::Validation(format!("Invalid currency code '{}'", currency)));
    }

    let items = order_data.order_items;
    if items.is_empty() {
      return Err(AppError::Validation("Order must contain at least one item".to_string()));
    }
    if items.len() > MAX_LINE_ITEMS {
      return Err(AppError::Validation(format!(
        "Order has {} items; at most {} are allowed",
        items.len(),
        MAX_LINE_ITEMS
      )));
    }

    let mut sum: i64 = 0;
    for (index, item) in items.iter().enumerate() {
      if item.product_name.trim().is_empty() {
        return Err(AppError::Validation(format!("Item {} has no product name", index)));
      }
      if item.quantity < 1 {
        return Err(AppError::Validation(format!("Item {} has quantity below 1", index)));
      }
      if item.unit_price < 0 {
        return Err(AppError::Validation(format!("Item {} has a negative unit price", index)));
      }
      let expected = item
        .expected_total()
        .ok_or_else(|| AppError::Validation(format!("Item {} total overflows", index)))?;
      if item.total_price != expected {
        return Err(AppError::Validation(format!(
          "Item {} total_price {} does not equal unit_price * quantity ({})",
          index, item.total_price, expected
        )));
      }
      sum = sum
        .checked_add(expected)
        .ok_or_else(|| AppError::Validation("Order total overflows".to_string()))?;
    }
    if order_data.total_amount != sum {
      return Err(AppError::Validation(format!(
        "total_amount {} does not equal the sum of item totals ({})",
        order_data.total_amount, sum
      )));
    }

    let billing_address = order_data
      .billing_address
      .unwrap_or_else(|| order_data.shipping_address.clone());
    for (label, address) in [
      ("shipping_address", &order_data.shipping_address),
      ("billing_address", &billing_address),
    ] {
      let missing = address.missing_fields();
      if !missing.is_empty() {
        return Err(AppError::Validation(format!(
          "{} is missing {}",
          label,
          missing.join(", ")
        )));
      }
    }

    Ok(ValidatedCheckout {
      order: NewOrder {
        user_id: order_data.user_id,
        total_amount: order_data.total_amount,
        currency,
        shipping_address: order_data.shipping_address,
        billing_address,
        notes: order_data.notes.filter(|n| !n.trim().is_empty()),
      },
      items,
      success_url,
      cancel_url,
    })
  }
}

fn ensure_redirect_url(field: &str, raw: &str) -> Result<()> {
  let parsed = Url::parse(raw).map_err(|_| AppError::Validation(format!("{} is not an absolute URL", field)))?;
  if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
    return Err(AppError::Validation(format!("{} must be an http(s) URL", field)));
  }
  Ok(())
}
