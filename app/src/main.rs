// app/src/main.rs

use storefront_payments::config::{AppConfig, LogFormat};
use storefront_payments::services::StripeClient;
use storefront_payments::store::{postgres, PgOrderStore};
use storefront_payments::web::configure_app_routes;
use storefront_payments::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use std::io;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str()));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter) // RUST_LOG overrides the INFO default
    .with_span_events(FmtSpan::CLOSE); // Span close events carry durations
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Text => builder.init(),
  }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
  tracing::error!(error = %err, "{}", context);
  io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
  let loaded = AppConfig::from_env();
  init_tracing(loaded.as_ref().map(|c| c.log_format).unwrap_or(LogFormat::Text));

  tracing::info!("Starting storefront payments server...");
  let app_config = loaded.map_err(|e| startup_error("Failed to load application configuration", e))?;
  tracing::debug!(config = ?app_config, "Configuration loaded.");

  let db_pool = postgres::connect(&app_config)
    .await
    .map_err(|e| startup_error("Failed to connect to the database", e))?;
  if app_config.run_migrations {
    postgres::run_migrations(&db_pool)
      .await
      .map_err(|e| startup_error("Failed to apply database migrations", e))?;
  }

  let gateway = StripeClient::new(&app_config.stripe).map_err(|e| startup_error("Failed to build Stripe client", e))?;
  if app_config.stripe.webhook_secret.is_none() {
    tracing::warn!(
      "STRIPE_WEBHOOK_SECRET is not set; webhook deliveries are accepted on header presence alone."
    );
  }

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  let webhook_origin = app_config.webhook_cors_origin().to_string();
  let app_state = AppState::new(app_config, Arc::new(PgOrderStore::new(db_pool)), Arc::new(gateway));

  tracing::info!("Attempting to bind server to {}...", server_address);
  HttpServer::new(move || {
    let webhook_origin = webhook_origin.clone();
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(move |cfg| configure_app_routes(cfg, &webhook_origin))
  })
  .bind(&server_address)?
  .run()
  .await
}
