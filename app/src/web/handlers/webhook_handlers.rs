// app/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use flowline::ContextData;
use serde_json::json;
use tracing::{error, info, instrument};

use crate::errors::AppError;
use crate::events::EventOutcome;
use crate::pipelines::contexts::WebhookCtxData;
use crate::state::AppState;

#[instrument(name = "handler::stripe_webhook", skip(app_state, req, body), fields(payload_bytes = body.len()))]
pub async fn stripe_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let signature = req
    .headers()
    .get("stripe-signature")
    .and_then(|value| value.to_str().ok())
    .map(String::from);

  let ctx_data = ContextData::new(WebhookCtxData::new(
    app_state.get_ref().clone(),
    body.to_vec(),
    signature,
    Utc::now().timestamp(),
  ));

  // Authentication and parse failures surface as errors here (400/401).
  app_state.flows.run(ctx_data.clone()).await?;

  let outcome = ctx_data.read().outcome.clone();
  match outcome {
    Some(EventOutcome::Failed(reason)) => {
      error!("Webhook processing failed; the provider will redeliver. {}", reason);
      Ok(HttpResponse::InternalServerError().json(json!({ "error": "Webhook processing failed" })))
    }
    Some(outcome) => {
      info!("Webhook acknowledged: {}.", outcome.detail());
      Ok(HttpResponse::Ok().json(json!({ "received": true })))
    }
    None => Err(AppError::Internal("Webhook pipeline finished without an outcome".to_string())),
  }
}
