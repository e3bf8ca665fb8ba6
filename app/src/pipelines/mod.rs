// app/src/pipelines/mod.rs

//! Defines and registers the checkout and webhook pipelines.

use crate::errors::AppError;
use flowline::Flows;

pub mod checkout_pipeline;
pub mod contexts;
pub mod webhook_pipeline;

/// Registers every pipeline with the registry. Called once per `AppState`.
pub fn register_all_pipelines(flows: &Flows<AppError>) {
  tracing::info!("Registering pipelines...");

  checkout_pipeline::register_checkout_pipeline(flows);
  webhook_pipeline::register_webhook_pipeline(flows);

  tracing::info!("All application pipelines registered.");
}
