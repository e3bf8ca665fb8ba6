// app/src/state.rs
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::CheckoutGateway;
use crate::store::OrderStore;
use flowline::Flows;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn OrderStore>,
  pub gateway: Arc<dyn CheckoutGateway>,
  pub flows: Arc<Flows<AppError>>,
  pub config: Arc<AppConfig>, // Share loaded config
}

impl AppState {
  /// Builds the state and registers every pipeline on a fresh registry.
  pub fn new(config: AppConfig, store: Arc<dyn OrderStore>, gateway: Arc<dyn CheckoutGateway>) -> Self {
    let state = AppState {
      store,
      gateway,
      flows: Arc::new(Flows::new()),
      config: Arc::new(config),
    };
    crate::pipelines::register_all_pipelines(&state.flows);
    state
  }
}
