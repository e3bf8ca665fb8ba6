// app/src/events.rs

//! Provider event envelope, the closed set of event kinds the reconciler
//! understands, and the pure decisions made about them.

use crate::errors::{AppError, Result};
use crate::models::OrderState;
use serde::Deserialize;
use std::fmt;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct RawEvent {
  #[serde(default)]
  id: Option<String>,
  #[serde(rename = "type")]
  event_type: String,
  data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
  object: serde_json::Value,
}

/// Correlation fields of a checkout session object. Everything is optional;
/// absent fields just mean fewer correlation channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionObject {
  #[serde(default)]
  pub id: Option<String>,
  #[serde(default)]
  pub client_reference_id: Option<String>,
  #[serde(default)]
  pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl SessionObject {
  pub fn metadata_order_id(&self) -> Option<&str> {
    self.metadata.as_ref()?.get("order_id")?.as_str()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
  CheckoutSessionCompleted(SessionObject),
  CheckoutSessionExpired(SessionObject),
  PaymentIntentFailed { payment_intent_id: Option<String> },
  Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
  pub id: Option<String>,
  pub event_type: String,
  pub kind: EventKind,
}

/// Parses a raw webhook body. Anything that is not a `{type, data: {object}}`
/// JSON document is a validation error.
pub fn parse_event(body: &[u8]) -> Result<ProviderEvent> {
  let raw: RawEvent =
    serde_json::from_slice(body).map_err(|e| AppError::Validation(format!("Malformed event body: {}", e)))?;

  let session = |object: serde_json::Value| -> Result<SessionObject> {
    serde_json::from_value(object)
      .map_err(|e| AppError::Validation(format!("Malformed checkout session object: {}", e)))
  };

  let kind = match raw.event_type.as_str() {
    "checkout.session.completed" => EventKind::CheckoutSessionCompleted(session(raw.data.object)?),
    "checkout.session.expired" => EventKind::CheckoutSessionExpired(session(raw.data.object)?),
    "payment_intent.payment_failed" => EventKind::PaymentIntentFailed {
      payment_intent_id: raw.data.object.get("id").and_then(|v| v.as_str()).map(str::to_string),
    },
    other => EventKind::Other(other.to_string()),
  };

  Ok(ProviderEvent {
    id: raw.id.filter(|id| !id.is_empty()),
    event_type: raw.event_type,
    kind,
  })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationChannel {
  Metadata,
  ClientReference,
  SessionId,
}

impl CorrelationChannel {
  pub fn as_str(&self) -> &'static str {
    match self {
      CorrelationChannel::Metadata => "metadata.order_id",
      CorrelationChannel::ClientReference => "client_reference_id",
      CorrelationChannel::SessionId => "stripe_session_id",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationKey {
  OrderId(Uuid),
  SessionId(String),
}

/// Lookup keys in the order they must be tried. Order-id channels that do
/// not hold a UUID are dropped so the next channel gets its turn.
pub fn correlation_candidates(session: &SessionObject) -> Vec<(CorrelationChannel, CorrelationKey)> {
  let mut candidates = Vec::with_capacity(3);

  let order_id_channels = [
    (CorrelationChannel::Metadata, session.metadata_order_id()),
    (CorrelationChannel::ClientReference, session.client_reference_id.as_deref()),
  ];
  for (channel, value) in order_id_channels {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
      continue;
    };
    match Uuid::parse_str(value) {
      Ok(order_id) => candidates.push((channel, CorrelationKey::OrderId(order_id))),
      Err(_) => warn!(channel = channel.as_str(), value, "Ignoring non-UUID order reference"),
    }
  }

  if let Some(session_id) = session.id.as_deref().filter(|id| !id.is_empty()) {
    candidates.push((CorrelationChannel::SessionId, CorrelationKey::SessionId(session_id.to_string())));
  }
  candidates
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
  Duplicate,
  UnhandledEventType(String),
  NoTransition,
  NoMatchingOrder,
  TerminalState { current: OrderState },
}

impl fmt::Display for IgnoreReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      IgnoreReason::Duplicate => write!(f, "duplicate delivery"),
      IgnoreReason::UnhandledEventType(t) => write!(f, "unhandled event type {}", t),
      IgnoreReason::NoTransition => write!(f, "event carries no state transition"),
      IgnoreReason::NoMatchingOrder => write!(f, "no matching order"),
      IgnoreReason::TerminalState { current } => write!(f, "order already {}", current),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
  Applied,
  AlreadyApplied,
}

/// What happened to one delivery. Only `Failed` turns into a non-2xx answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
  Handled(Handled),
  Ignored(IgnoreReason),
  Failed(String),
}

impl EventOutcome {
  /// Ledger `outcome` column value; `None` for outcomes that must stay retryable.
  pub fn ledger_label(&self) -> Option<&'static str> {
    match self {
      EventOutcome::Handled(_) => Some("handled"),
      EventOutcome::Ignored(_) => Some("ignored"),
      EventOutcome::Failed(_) => None,
    }
  }

  pub fn detail(&self) -> String {
    match self {
      EventOutcome::Handled(Handled::Applied) => "applied".to_string(),
      EventOutcome::Handled(Handled::AlreadyApplied) => "already applied".to_string(),
      EventOutcome::Ignored(reason) => reason.to_string(),
      EventOutcome::Failed(reason) => reason.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
  Transition { target: OrderState, session: SessionObject },
  Ignore(IgnoreReason),
}

pub fn plan_transition(kind: &EventKind) -> Plan {
  match kind {
    EventKind::CheckoutSessionCompleted(session) => Plan::Transition {
      target: OrderState::CONFIRMED_PAID,
      session: session.clone(),
    },
    EventKind::CheckoutSessionExpired(session) => Plan::Transition {
      target: OrderState::CANCELLED_FAILED,
      session: session.clone(),
    },
    EventKind::PaymentIntentFailed { payment_intent_id } => {
      warn!(payment_intent_id = ?payment_intent_id, "Payment intent failed; order left unchanged");
      Plan::Ignore(IgnoreReason::NoTransition)
    }
    EventKind::Other(event_type) => Plan::Ignore(IgnoreReason::UnhandledEventType(event_type.clone())),
  }
}
