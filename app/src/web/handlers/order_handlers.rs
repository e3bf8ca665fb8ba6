// app/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

/// Order plus its items in submission order, for the storefront success page.
#[instrument(name = "handler::get_order", skip(app_state))]
pub async fn get_order_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let order = app_state
    .store
    .find_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
  let items = app_state.store.list_order_items(order_id).await?;

  Ok(HttpResponse::Ok().json(json!({ "order": order, "items": items })))
}
