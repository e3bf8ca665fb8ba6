// app/src/pipelines/contexts.rs

//! Per-request data the pipelines run over. Handlers receive these wrapped
//! in `flowline::ContextData`.

use crate::events::{EventOutcome, Plan, ProviderEvent};
use crate::models::{CheckoutRequest, Order, OrderItem, ValidatedCheckout};
use crate::services::{CheckoutSession, ProviderLineItem};
use crate::state::AppState;

pub struct CheckoutCtxData {
  pub app_state: AppState,
  /// Taken by validation; `None` afterwards.
  pub request: Option<CheckoutRequest>,
  pub validated: Option<ValidatedCheckout>,
  pub order: Option<Order>,
  pub items: Vec<OrderItem>,
  pub line_items: Vec<ProviderLineItem>,
  pub session: Option<CheckoutSession>,
  pub session_attached: bool,
}

impl CheckoutCtxData {
  pub fn new(app_state: AppState, request: CheckoutRequest) -> Self {
    Self {
      app_state,
      request: Some(request),
      validated: None,
      order: None,
      items: Vec::new(),
      line_items: Vec::new(),
      session: None,
      session_attached: false,
    }
  }
}

pub struct WebhookCtxData {
  pub app_state: AppState,
  pub payload: Vec<u8>,
  pub signature: Option<String>,
  /// Unix seconds used for the signature tolerance check.
  pub received_at: i64,
  pub event: Option<ProviderEvent>,
  pub plan: Option<Plan>,
  pub order: Option<Order>,
  /// Set by the first step that reaches a verdict; later deciding steps are skipped.
  pub outcome: Option<EventOutcome>,
  pub recorded: bool,
}

impl WebhookCtxData {
  pub fn new(app_state: AppState, payload: Vec<u8>, signature: Option<String>, received_at: i64) -> Self {
    Self {
      app_state,
      payload,
      signature,
      received_at,
      event: None,
      plan: None,
      order: None,
      outcome: None,
      recorded: false,
    }
  }
}
