// app/src/web/routes.rs

use crate::errors::AppError;
use crate::web::handlers::{checkout_handlers, order_handlers, webhook_handlers};
use actix_web::http::Method;
use actix_web::middleware::DefaultHeaders;
use actix_web::{web, HttpResponse};

const CHECKOUT_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
const WEBHOOK_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type, stripe-signature";

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Preflight answer; the CORS headers come from the scope's `DefaultHeaders`.
async fn cors_preflight_handler() -> HttpResponse {
  HttpResponse::Ok().body("ok")
}

fn cors_headers(origin: &str, allow_headers: &str) -> DefaultHeaders {
  DefaultHeaders::new()
    .add(("Access-Control-Allow-Origin", origin.to_string()))
    .add(("Access-Control-Allow-Headers", allow_headers))
    .add(("Access-Control-Allow-Methods", "POST, OPTIONS"))
}

/// Mounts the `/api/v1` routes. `webhook_origin` is the CORS origin of the
/// webhook endpoint (`*` outside production).
pub fn configure_app_routes(cfg: &mut web::ServiceConfig, webhook_origin: &str) {
  // Malformed checkout JSON gets the same `{ error }` body as other validation failures.
  let checkout_json = web::JsonConfig::default().error_handler(|err, _req| AppError::Validation(err.to_string()).into());

  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/checkout")
          .app_data(checkout_json)
          .wrap(cors_headers("*", CHECKOUT_ALLOW_HEADERS))
          .route(
            "/session",
            web::post().to(checkout_handlers::create_checkout_session_handler),
          )
          .route("/session", web::method(Method::OPTIONS).to(cors_preflight_handler)),
      )
      .service(
        web::scope("/webhooks")
          .wrap(cors_headers(webhook_origin, WEBHOOK_ALLOW_HEADERS))
          .route("/stripe", web::post().to(webhook_handlers::stripe_webhook_handler))
          .route("/stripe", web::method(Method::OPTIONS).to(cors_preflight_handler)),
      )
      .service(
        web::scope("/orders").route("/{order_id}", web::get().to(order_handlers::get_order_handler)),
      ),
  );
}
