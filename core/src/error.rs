// gok_flow/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Framework-level failures raised by the engine itself.
///
/// Handler errors are typed by the pipeline (`Pipeline<TData, Err>`); `FlowError`
/// only covers problems the engine detects on its own, and every pipeline error
/// type must be constructible from it.
#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("No pipeline registered for context type {type_name}")]
  PipelineNotRegistered { type_name: String },

  #[error("Type mismatch while dispatching context (expected {expected_type})")]
  TypeMismatch { expected_type: String },

  #[error("Error in handler or external operation. Source: {source}")]
  HandlerError {
    #[source]
    source: AnyhowError,
  },

  #[error("Configuration error for step '{step_name}': {message}")]
  ConfigurationError { step_name: String, message: String },

  #[error("Internal flow error: {0}")]
  Internal(String),
}

impl From<AnyhowError> for FlowError {
  fn from(err: AnyhowError) -> Self {
    FlowError::HandlerError { source: err }
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
