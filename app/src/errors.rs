// app/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use flowline::FlowError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Missing stripe-signature header")]
  MissingSignature,

  #[error("Invalid webhook signature: {0}")]
  InvalidSignature(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Migration Error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  #[error("Payment Provider Error: {0}")]
  PaymentProvider(String),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<reqwest::Error> for AppError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      return AppError::PaymentProvider(format!("request timed out: {}", err));
    }
    AppError::PaymentProvider(err.to_string())
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) | AppError::MissingSignature => StatusCode::BAD_REQUEST,
      AppError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Config(_)
      | AppError::Sqlx(_)
      | AppError::Migrate(_)
      | AppError::PaymentProvider(_)
      | AppError::Workflow { .. }
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Rejecting request");
    }
    // Database and migration internals are not echoed to callers.
    let message = match self {
      AppError::Sqlx(_) | AppError::Migrate(_) => "Database operation failed".to_string(),
      other => other.to_string(),
    };
    HttpResponse::build(status).json(json!({ "error": message }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
