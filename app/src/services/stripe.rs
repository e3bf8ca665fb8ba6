// app/src/services/stripe.rs

use crate::config::StripeConfig;
use crate::errors::{AppError, Result};
use crate::models::OrderItem;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// One priced line of a hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderLineItem {
  pub name: String,
  /// Minor currency units.
  pub unit_amount: i64,
  pub quantity: i32,
}

impl ProviderLineItem {
  pub fn from_order_item(item: &OrderItem) -> Self {
    Self {
      name: item.display_name(),
      unit_amount: item.unit_price,
      quantity: item.quantity,
    }
  }

  pub fn amount(&self) -> Option<i64> {
    self.unit_amount.checked_mul(i64::from(self.quantity))
  }
}

/// Sum of `unit_amount * quantity`, or `None` on overflow.
pub fn line_items_total(items: &[ProviderLineItem]) -> Option<i64> {
  items
    .iter()
    .try_fold(0i64, |acc, item| item.amount().and_then(|amount| acc.checked_add(amount)))
}

#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
  pub order_id: Uuid,
  pub currency: String,
  pub line_items: Vec<ProviderLineItem>,
  /// Already carries the `session_id`/`order_id` query suffix.
  pub success_url: String,
  pub cancel_url: String,
}

impl CheckoutSessionRequest {
  /// Form-encoded body in the provider's bracketed key syntax.
  pub fn form_params(&self) -> Vec<(String, String)> {
    let order_id = self.order_id.to_string();
    let mut params = vec![
      ("mode".to_string(), "payment".to_string()),
      ("success_url".to_string(), self.success_url.clone()),
      ("cancel_url".to_string(), self.cancel_url.clone()),
      ("client_reference_id".to_string(), order_id.clone()),
      ("metadata[order_id]".to_string(), order_id),
    ];
    for (i, item) in self.line_items.iter().enumerate() {
      let prefix = format!("line_items[{}]", i);
      params.push((format!("{}[price_data][currency]", prefix), self.currency.clone()));
      params.push((format!("{}[price_data][unit_amount]", prefix), item.unit_amount.to_string()));
      params.push((format!("{}[price_data][product_data][name]", prefix), item.name.clone()));
      params.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
    }
    params
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
  pub id: String,
  pub url: String,
}

/// Adds the session/order placeholders the hosted page fills in on redirect
/// to the query part of `success_url`, ahead of any `#fragment`. The braces
/// of `{CHECKOUT_SESSION_ID}` must stay unencoded.
pub fn success_redirect_url(success_url: &str, order_id: Uuid) -> String {
  let (base, fragment) = match success_url.split_once('#') {
    Some((base, fragment)) => (base, Some(fragment)),
    None => (success_url, None),
  };
  let separator = match base.find('?') {
    Some(idx) if idx + 1 == base.len() || base.ends_with('&') => "",
    Some(_) => "&",
    None => "?",
  };
  let mut url = format!(
    "{}{}session_id={{CHECKOUT_SESSION_ID}}&order_id={}",
    base, separator, order_id
  );
  if let Some(fragment) = fragment {
    url.push('#');
    url.push_str(fragment);
  }
  url
}

#[async_trait]
pub trait CheckoutGateway: Send + Sync {
  async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> Result<CheckoutSession>;
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
  id: String,
  url: Option<String>,
}

pub struct StripeClient {
  client: reqwest::Client,
  secret_key: String,
  api_base: String,
}

impl StripeClient {
  pub fn new(config: &StripeConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| AppError::Config(format!("Failed to build Stripe HTTP client: {}", e)))?;
    Ok(Self {
      client,
      secret_key: config.secret_key.clone(),
      api_base: config.api_base.trim_end_matches('/').to_string(),
    })
  }
}

#[async_trait]
impl CheckoutGateway for StripeClient {
  #[instrument(skip(self, request), fields(order_id = %request.order_id, line_items = request.line_items.len()))]
  async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> Result<CheckoutSession> {
    let response = self
      .client
      .post(format!("{}/v1/checkout/sessions", self.api_base))
      .basic_auth(&self.secret_key, Some(""))
      .form(&request.form_params())
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let error_text = response.text().await.unwrap_or_default();
      warn!(%status, "Stripe rejected checkout session request: {}", error_text);
      return Err(AppError::PaymentProvider(format!(
        "Stripe returned {} creating checkout session",
        status
      )));
    }

    let session: SessionResponse = response
      .json()
      .await
      .map_err(|e| AppError::PaymentProvider(format!("Failed to parse Stripe response: {}", e)))?;
    let url = session
      .url
      .ok_or_else(|| AppError::PaymentProvider(format!("Checkout session {} has no url", session.id)))?;

    info!(session_id = %session.id, "Checkout session created");
    Ok(CheckoutSession { id: session.id, url })
  }
}
