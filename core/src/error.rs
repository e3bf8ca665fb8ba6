// core/src/error.rs
use thiserror::Error;

/// Errors raised by the engine itself, as opposed to errors returned by
/// user handlers. Pipelines convert these into their own error type through
/// the `Err: From<FlowError>` bound.
#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Type mismatch during context dispatch (expected {expected_type}, at: '{step_name}')")]
  TypeMismatch { step_name: String, expected_type: String },

  #[error("Configuration error at '{step_name}': {message}")]
  ConfigurationError { step_name: String, message: String },

  #[error("Internal flowline error: {0}")]
  Internal(String),
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
