// app/src/pipelines/checkout_pipeline.rs
use crate::errors::AppError;
use crate::pipelines::contexts::CheckoutCtxData;
use crate::services::stripe::{line_items_total, success_redirect_url};
use crate::services::{CheckoutSessionRequest, ProviderLineItem};
use flowline::{ContextData, Flows, Pipeline, PipelineControl};
use tracing::{error, info, warn};

pub fn register_checkout_pipeline(flows: &Flows<AppError>) {
  let mut p = Pipeline::<CheckoutCtxData, AppError>::new(&[
    ("ensure_payment_credential", false, None),
    ("validate_checkout_payload", false, None),
    ("persist_order_with_items", false, None),
    ("build_provider_line_items", false, None),
    ("create_provider_session", false, None),
    ("attach_session_to_order", true, None), // Best effort
  ]);

  // Step 1: no store write may happen without a usable provider credential.
  p.on_root("ensure_payment_credential", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let missing = ctx_data.with(|c| c.app_state.config.stripe.secret_key.trim().is_empty());
      if missing {
        error!("Checkout Pipeline: STRIPE_SECRET_KEY is empty; refusing to create an order.");
        return Err(AppError::Config("Payment provider credential is not configured".to_string()));
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 2
  p.on_root("validate_checkout_payload", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (request, default_currency) = ctx_data.update(|c| (c.request.take(), c.app_state.config.default_currency.clone()));
      let request = request.ok_or_else(|| AppError::Internal("Checkout request already consumed".to_string()))?;
      let validated = request.validate(&default_currency)?;
      info!(
        "Checkout Pipeline (User {}): Payload valid. {} item(s), total {} {}.",
        validated.order.user_id,
        validated.items.len(),
        validated.order.total_amount,
        validated.order.currency
      );
      ctx_data.write().validated = Some(validated);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 3: order and items land together or not at all.
  p.on_root("persist_order_with_items", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (store, validated) = {
        let guard = ctx_data.read();
        (guard.app_state.store.clone(), guard.validated.clone())
      };
      let validated = validated.ok_or_else(|| AppError::Internal("Checkout payload was not validated".to_string()))?;

      let (order, items) = store
        .create_order_with_items(validated.order, validated.items)
        .await
        .map_err(|e| {
          error!("Checkout Pipeline: Failed to persist order with items: {}", e);
          e
        })?;
      info!(
        "Checkout Pipeline (Order {}): Stored order #{} with {} item(s).",
        order.id,
        order.order_number,
        items.len()
      );

      let mut guard = ctx_data.write();
      guard.order = Some(order);
      guard.items = items;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 4: the summary is built from what was stored, not from the request.
  p.on_root("build_provider_line_items", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let order_total = guard
        .order
        .as_ref()
        .map(|o| o.total_amount)
        .ok_or_else(|| AppError::Internal("Order missing before building line items".to_string()))?;
      let line_items: Vec<ProviderLineItem> = guard.items.iter().map(ProviderLineItem::from_order_item).collect();

      if line_items_total(&line_items) != Some(order_total) {
        return Err(AppError::Internal(format!(
          "Line items do not add up to the order total {}",
          order_total
        )));
      }
      guard.line_items = line_items;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 5
  p.on_root("create_provider_session", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (gateway, request) = {
        let guard = ctx_data.read();
        let order = guard
          .order
          .as_ref()
          .ok_or_else(|| AppError::Internal("Order missing before session creation".to_string()))?;
        let validated = guard
          .validated
          .as_ref()
          .ok_or_else(|| AppError::Internal("Checkout payload was not validated".to_string()))?;
        let request = CheckoutSessionRequest {
          order_id: order.id,
          currency: order.currency.clone(),
          line_items: guard.line_items.clone(),
          success_url: success_redirect_url(&validated.success_url, order.id),
          cancel_url: validated.cancel_url.clone(),
        };
        (guard.app_state.gateway.clone(), request)
      };
      let order_id = request.order_id;

      let session = gateway.create_checkout_session(request).await.map_err(|e| {
        error!(
          "Checkout Pipeline (Order {}): Provider session creation failed; order stays pending. {}",
          order_id, e
        );
        e
      })?;
      info!("Checkout Pipeline (Order {}): Provider session {} created.", order_id, session.id);
      ctx_data.write().session = Some(session);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 6: a failed write here is logged and swallowed; the reconciler can
  // still correlate through the order id carried in the session.
  p.on_root("attach_session_to_order", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (store, order_id, session_id) = {
        let guard = ctx_data.read();
        (
          guard.app_state.store.clone(),
          guard.order.as_ref().map(|o| o.id),
          guard.session.as_ref().map(|s| s.id.clone()),
        )
      };
      let (Some(order_id), Some(session_id)) = (order_id, session_id) else {
        warn!("Checkout Pipeline: Nothing to attach; order or session missing.");
        return Ok::<_, AppError>(PipelineControl::Continue);
      };

      match store.attach_checkout_session(order_id, &session_id).await {
        Ok(()) => {
          let mut guard = ctx_data.write();
          guard.session_attached = true;
          if let Some(order) = guard.order.as_mut() {
            order.stripe_session_id = Some(session_id);
          }
        }
        Err(e) => warn!(
          "Checkout Pipeline (Order {}): Could not store session id {}: {}",
          order_id, session_id, e
        ),
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  flows.register_pipeline(p);
}
