// app/tests/http_tests.rs
mod common;

use actix_web::http::{Method, StatusCode};
use actix_web::{test, web, App};
use common::*;
use serde_json::{json, Value};
use serial_test::serial;
use storefront_payments::models::OrderState;
use storefront_payments::services::signature::sign_payload;
use storefront_payments::store::OrderStore;
use storefront_payments::web::configure_app_routes;
use storefront_payments::AppState;
use uuid::Uuid;

macro_rules! service {
  ($state:expr, $origin:expr) => {
    test::init_service(
      App::new()
        .app_data(web::Data::new($state))
        .configure(|cfg| configure_app_routes(cfg, $origin)),
    )
    .await
  };
}

fn header<'a, B>(resp: &'a actix_web::dev::ServiceResponse<B>, name: &str) -> Option<&'a str> {
  resp.headers().get(name).and_then(|v| v.to_str().ok())
}

#[actix_web::test]
#[serial]
async fn checkout_returns_session_and_cors_headers() {
  setup_tracing();
  let app = test_app();
  let store = app.store.clone();
  let svc = service!(app.state, "*");

  let req = test::TestRequest::post()
    .uri("/api/v1/checkout/session")
    .set_json(checkout_json(vec![item_json("Cap", Some("Red"), 2, 1500)]))
    .to_request();
  let resp = test::call_service(&svc, req).await;

  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(header(&resp, "access-control-allow-origin"), Some("*"));
  assert_eq!(
    header(&resp, "access-control-allow-headers"),
    Some("authorization, x-client-info, apikey, content-type")
  );
  assert_eq!(header(&resp, "access-control-allow-methods"), Some("POST, OPTIONS"));

  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["sessionId"], "cs_test_1");
  assert_eq!(body["url"], "https://checkout.stripe.test/pay/cs_test_1");
  let order_id: Uuid = serde_json::from_value(body["orderId"].clone()).unwrap();
  let order = store.find_order(order_id).await.unwrap().unwrap();
  assert_eq!(order.total_amount, 3000);
}

#[actix_web::test]
#[serial]
async fn checkout_preflight_is_answered() {
  setup_tracing();
  let svc = service!(test_app().state, "*");

  let req = test::TestRequest::default()
    .method(Method::OPTIONS)
    .uri("/api/v1/checkout/session")
    .to_request();
  let resp = test::call_service(&svc, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(header(&resp, "access-control-allow-origin"), Some("*"));
}

#[actix_web::test]
#[serial]
async fn checkout_validation_failure_is_400_with_error_body() {
  setup_tracing();
  let app = test_app();
  let store = app.store.clone();
  let svc = service!(app.state, "*");

  let mut payload = checkout_json(vec![item_json("Cap", None, 1, 1500)]);
  payload["orderData"]["total_amount"] = json!(1);
  let req = test::TestRequest::post()
    .uri("/api/v1/checkout/session")
    .set_json(payload)
    .to_request();
  let resp = test::call_service(&svc, req).await;

  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(header(&resp, "access-control-allow-origin"), Some("*"));
  let body: Value = test::read_body_json(resp).await;
  assert!(body["error"].as_str().unwrap().contains("total_amount"));
  assert_eq!(store.order_count(), 0);

  let req = test::TestRequest::post()
    .uri("/api/v1/checkout/session")
    .insert_header(("content-type", "application/json"))
    .set_payload("{\"orderData\":")
    .to_request();
  let resp = test::call_service(&svc, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert!(body["error"].is_string());
}

#[actix_web::test]
#[serial]
async fn webhook_without_signature_is_400() {
  setup_tracing();
  let svc = service!(test_app().state, "*");

  let req = test::TestRequest::post()
    .uri("/api/v1/webhooks/stripe")
    .set_payload("not even json")
    .to_request();
  let resp = test::call_service(&svc, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert!(body["error"].as_str().unwrap().contains("stripe-signature"));
}

#[actix_web::test]
#[serial]
async fn webhook_acknowledges_and_confirms_order() {
  setup_tracing();
  let app = test_app();
  let order = seed_pending_order(&app.store, Some("cs_http")).await;
  let store = app.store.clone();
  let svc = service!(app.state, "*");

  let req = test::TestRequest::post()
    .uri("/api/v1/webhooks/stripe")
    .insert_header(("stripe-signature", "t=1,v1=abc"))
    .set_payload(event_body(
      Some("evt_http"),
      "checkout.session.completed",
      session_object("cs_http", Some(order.id)),
    ))
    .to_request();
  let resp = test::call_service(&svc, req).await;

  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body, json!({ "received": true }));
  assert_eq!(
    store.find_order(order.id).await.unwrap().unwrap().state(),
    OrderState::CONFIRMED_PAID
  );
}

#[actix_web::test]
#[serial]
async fn webhook_for_unknown_order_still_acknowledged() {
  setup_tracing();
  let svc = service!(test_app().state, "*");

  let req = test::TestRequest::post()
    .uri("/api/v1/webhooks/stripe")
    .insert_header(("stripe-signature", "t=1,v1=abc"))
    .set_payload(event_body(
      Some("evt_lost"),
      "checkout.session.expired",
      session_object("cs_lost", Some(Uuid::new_v4())),
    ))
    .to_request();
  let resp = test::call_service(&svc, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
#[serial]
async fn webhook_with_bad_signature_is_401() {
  setup_tracing();
  let app = test_app_with(test_config(Some(WEBHOOK_SECRET)), MockGateway::default());
  let svc = service!(app.state, "https://shop.test");

  let body = event_body(Some("evt_bad"), "checkout.session.completed", session_object("cs_x", None));
  let signature = sign_payload(&body, "whsec_wrong", chrono::Utc::now().timestamp()).unwrap();
  let req = test::TestRequest::post()
    .uri("/api/v1/webhooks/stripe")
    .insert_header(("stripe-signature", signature))
    .set_payload(body)
    .to_request();
  let resp = test::call_service(&svc, req).await;

  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(header(&resp, "access-control-allow-origin"), Some("https://shop.test"));
  assert_eq!(
    header(&resp, "access-control-allow-headers"),
    Some("authorization, x-client-info, apikey, content-type, stripe-signature")
  );
}

#[actix_web::test]
#[serial]
async fn order_lookup_returns_items_or_404() {
  setup_tracing();
  let app = test_app();
  let order = seed_pending_order(&app.store, None).await;
  let state: AppState = app.state.clone();
  let svc = service!(state, "*");

  let req = test::TestRequest::get().uri(&format!("/api/v1/orders/{}", order.id)).to_request();
  let resp = test::call_service(&svc, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["order"]["status"], "pending");
  assert_eq!(body["order"]["payment_status"], "pending");
  assert_eq!(body["items"][0]["product_name"], "Notebook");

  let req = test::TestRequest::get()
    .uri(&format!("/api/v1/orders/{}", Uuid::new_v4()))
    .to_request();
  let resp = test::call_service(&svc, req).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
#[serial]
async fn health_reports_ok() {
  let svc = service!(test_app().state, "*");
  let req = test::TestRequest::get().uri("/api/v1/health").to_request();
  let body: Value = test::call_and_read_body_json(&svc, req).await;
  assert_eq!(body, json!({ "status": "ok" }));
}
