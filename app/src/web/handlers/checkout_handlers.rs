// app/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use flowline::{ContextData, PipelineResult};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::models::CheckoutRequest;
use crate::pipelines::contexts::CheckoutCtxData;
use crate::state::AppState;

#[instrument(
  name = "handler::create_checkout_session",
  skip(app_state, payload),
  fields(user_id = %payload.order_data.user_id, item_count = payload.order_data.order_items.len())
)]
pub async fn create_checkout_session_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
  let ctx_data = ContextData::new(CheckoutCtxData::new(app_state.get_ref().clone(), payload.into_inner()));

  match app_state.flows.run(ctx_data.clone()).await? {
    PipelineResult::Completed => {
      let guard = ctx_data.read();
      let (Some(order), Some(session)) = (guard.order.as_ref(), guard.session.as_ref()) else {
        return Err(AppError::Internal(
          "Checkout completed without an order or session".to_string(),
        ));
      };
      info!(
        "Checkout session {} ready for order {} (session stored: {}).",
        session.id, order.id, guard.session_attached
      );
      Ok(HttpResponse::Ok().json(json!({
        "sessionId": session.id,
        "url": session.url,
        "orderId": order.id,
      })))
    }
    PipelineResult::Stopped => {
      warn!("Checkout pipeline stopped before a session was created.");
      Err(AppError::Internal("Checkout process was halted".to_string()))
    }
  }
}
