// app/src/pipelines/webhook_pipeline.rs
use crate::errors::AppError;
use crate::events::{
  correlation_candidates, parse_event, plan_transition, CorrelationKey, EventOutcome, Handled, IgnoreReason, Plan,
};
use crate::models::{OrderState, ProcessedEvent};
use crate::pipelines::contexts::WebhookCtxData;
use crate::services::signature::verify_signature;
use crate::store::TransitionOutcome;
use chrono::Utc;
use flowline::{ContextData, Flows, Pipeline, PipelineControl, SkipCondition};
use std::sync::Arc;
use tracing::{error, info, warn};

fn once_decided() -> Option<SkipCondition<WebhookCtxData>> {
  let decided: SkipCondition<WebhookCtxData> =
    Arc::new(|ctx_data: ContextData<WebhookCtxData>| ctx_data.with(|c| c.outcome.is_some()));
  Some(decided)
}

pub fn register_webhook_pipeline(flows: &Flows<AppError>) {
  let mut p = Pipeline::<WebhookCtxData, AppError>::new(&[
    ("authenticate_delivery", false, None),
    ("parse_event_envelope", false, None),
    ("skip_processed_event", false, None),
    ("plan_transition", false, None),
    ("resolve_order", false, once_decided()),
    ("apply_transition", false, once_decided()),
    ("record_processed_event", false, None),
  ]);

  // Step 1: header presence always, HMAC only with a configured secret.
  p.on_root("authenticate_delivery", |ctx_data: ContextData<WebhookCtxData>| {
    Box::pin(async move {
      let guard = ctx_data.read();
      let header = guard.signature.as_deref().ok_or(AppError::MissingSignature)?;
      let stripe = &guard.app_state.config.stripe;
      if let Some(secret) = stripe.webhook_secret.as_deref() {
        verify_signature(
          &guard.payload,
          header,
          secret,
          stripe.webhook_tolerance_secs,
          guard.received_at,
        )?;
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 2
  p.on_root("parse_event_envelope", |ctx_data: ContextData<WebhookCtxData>| {
    Box::pin(async move {
      let event = ctx_data.with(|c| parse_event(&c.payload))?;
      info!(
        "Webhook Pipeline: Received {} (event {}).",
        event.event_type,
        event.id.as_deref().unwrap_or("<no id>")
      );
      ctx_data.write().event = Some(event);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 3: a delivery already in the ledger ends the run here.
  p.on_root("skip_processed_event", |ctx_data: ContextData<WebhookCtxData>| {
    Box::pin(async move {
      let (store, event_id) = {
        let guard = ctx_data.read();
        (
          guard.app_state.store.clone(),
          guard.event.as_ref().and_then(|e| e.id.clone()),
        )
      };
      let Some(event_id) = event_id else {
        return Ok::<_, AppError>(PipelineControl::Continue);
      };

      match store.find_processed_event(&event_id).await {
        Ok(Some(previous)) => {
          info!(
            "Webhook Pipeline: Event {} already processed ({}) at {}; skipping.",
            event_id, previous.outcome, previous.processed_at
          );
          ctx_data.write().outcome = Some(EventOutcome::Ignored(IgnoreReason::Duplicate));
          Ok(PipelineControl::Stop)
        }
        Ok(None) => Ok(PipelineControl::Continue),
        Err(e) => {
          error!("Webhook Pipeline: Ledger lookup for {} failed: {}", event_id, e);
          ctx_data.write().outcome = Some(EventOutcome::Failed(format!("ledger lookup failed: {}", e)));
          Ok(PipelineControl::Stop)
        }
      }
    })
  });

  // Step 4
  p.on_root("plan_transition", |ctx_data: ContextData<WebhookCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let plan = match guard.event.as_ref() {
        Some(event) => plan_transition(&event.kind),
        None => return Err(AppError::Internal("Event not parsed before planning".to_string())),
      };
      if let Plan::Ignore(reason) = &plan {
        info!("Webhook Pipeline: No transition planned: {}.", reason);
        guard.outcome = Some(EventOutcome::Ignored(reason.clone()));
      }
      guard.plan = Some(plan);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 5: first correlation channel that finds an order wins.
  p.on_root("resolve_order", |ctx_data: ContextData<WebhookCtxData>| {
    Box::pin(async move {
      let (store, candidates) = {
        let guard = ctx_data.read();
        let candidates = match &guard.plan {
          Some(Plan::Transition { session, .. }) => correlation_candidates(session),
          _ => Vec::new(),
        };
        (guard.app_state.store.clone(), candidates)
      };

      for (channel, key) in candidates {
        let found = match &key {
          CorrelationKey::OrderId(order_id) => store.find_order(*order_id).await,
          CorrelationKey::SessionId(session_id) => store.find_order_by_session(session_id).await,
        };
        match found {
          Ok(Some(order)) => {
            info!("Webhook Pipeline: Matched order {} via {}.", order.id, channel.as_str());
            ctx_data.write().order = Some(order);
            return Ok::<_, AppError>(PipelineControl::Continue);
          }
          Ok(None) => {}
          Err(e) => {
            error!("Webhook Pipeline: Order lookup via {} failed: {}", channel.as_str(), e);
            ctx_data.write().outcome = Some(EventOutcome::Failed(format!("order lookup failed: {}", e)));
            return Ok(PipelineControl::Continue);
          }
        }
      }

      warn!("Webhook Pipeline: No order matches this event; acknowledging without changes.");
      ctx_data.write().outcome = Some(EventOutcome::Ignored(IgnoreReason::NoMatchingOrder));
      Ok(PipelineControl::Continue)
    })
  });

  // Step 6: guarded single-row update; never moves a terminal order.
  p.on_root("apply_transition", |ctx_data: ContextData<WebhookCtxData>| {
    Box::pin(async move {
      let (store, order_id, target) = {
        let guard = ctx_data.read();
        let order_id = guard.order.as_ref().map(|o| o.id);
        let target = match &guard.plan {
          Some(Plan::Transition { target, .. }) => Some(*target),
          _ => None,
        };
        (guard.app_state.store.clone(), order_id, target)
      };
      let (Some(order_id), Some(target)) = (order_id, target) else {
        return Err(AppError::Internal("Transition reached without order or target".to_string()));
      };

      let outcome = match store.transition_order(order_id, OrderState::PENDING, target).await {
        Ok(TransitionOutcome::Applied) => {
          info!("Webhook Pipeline (Order {}): Moved to {}.", order_id, target);
          EventOutcome::Handled(Handled::Applied)
        }
        Ok(TransitionOutcome::AlreadyApplied) => {
          info!("Webhook Pipeline (Order {}): Already {}.", order_id, target);
          EventOutcome::Handled(Handled::AlreadyApplied)
        }
        Ok(TransitionOutcome::Rejected { current }) => {
          warn!(
            "Webhook Pipeline (Order {}): Stale event for {} ignored; order is {}.",
            order_id, target, current
          );
          EventOutcome::Ignored(IgnoreReason::TerminalState { current })
        }
        Ok(TransitionOutcome::NotFound) => EventOutcome::Ignored(IgnoreReason::NoMatchingOrder),
        Err(e) => {
          error!("Webhook Pipeline (Order {}): Update failed: {}", order_id, e);
          EventOutcome::Failed(format!("order update failed: {}", e))
        }
      };
      ctx_data.write().outcome = Some(outcome);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 7: failed outcomes stay out of the ledger so redelivery retries them.
  p.on_root("record_processed_event", |ctx_data: ContextData<WebhookCtxData>| {
    Box::pin(async move {
      let (store, entry) = {
        let guard = ctx_data.read();
        let entry = match (guard.event.as_ref(), guard.outcome.as_ref()) {
          (Some(event), Some(outcome)) => match (event.id.clone(), outcome.ledger_label()) {
            (Some(event_id), Some(label)) => Some(ProcessedEvent {
              event_id,
              event_type: event.event_type.clone(),
              order_id: guard.order.as_ref().map(|o| o.id),
              outcome: label.to_string(),
              detail: Some(outcome.detail()),
              processed_at: Utc::now(),
            }),
            _ => None,
          },
          _ => None,
        };
        (guard.app_state.store.clone(), entry)
      };
      let Some(entry) = entry else {
        return Ok::<_, AppError>(PipelineControl::Continue);
      };

      let event_id = entry.event_id.clone();
      match store.record_processed_event(entry).await {
        Ok(_) => ctx_data.write().recorded = true,
        // The order change already happened; a redelivery will find it applied.
        Err(e) => warn!("Webhook Pipeline: Could not record event {} in the ledger: {}", event_id, e),
      }
      Ok(PipelineControl::Continue)
    })
  });

  p.after_root("record_processed_event", |ctx_data: ContextData<WebhookCtxData>| {
    Box::pin(async move {
      ctx_data.with(|c| {
        if let Some(outcome) = &c.outcome {
          info!(outcome = %outcome.detail(), recorded = c.recorded, "Webhook Pipeline: Delivery settled.");
        }
      });
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  flows.register_pipeline(p);
}
