// gok_checkout/src/errors.rs

use gok_flow::FlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Business Rule Violation: {0}")]
  BusinessRule(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Error: {0}")]
  Internal(String),
}

/// Caller-facing classification of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  Invalid,
  Conflict,
  BusinessRuleViolation,
  Unexpected,
}

impl AppError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      AppError::NotFound(_) => ErrorKind::NotFound,
      AppError::Validation(_) => ErrorKind::Invalid,
      AppError::Conflict(_) => ErrorKind::Conflict,
      AppError::BusinessRule(_) => ErrorKind::BusinessRuleViolation,
      AppError::Workflow {
        source: FlowError::HandlerError { source },
      } => match source.downcast_ref::<AppError>() {
        Some(inner) => inner.kind(),
        None => ErrorKind::Unexpected,
      },
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        ErrorKind::Unexpected
      }
    }
  }

  /// True for failures the caller can act on (retry with other input, pick another resource).
  pub fn is_recoverable(&self) -> bool {
    !matches!(self.kind(), ErrorKind::Unexpected)
  }

  pub(crate) fn not_found(entity: &str, key: impl std::fmt::Display) -> Self {
    AppError::NotFound(format!("{} '{}' not found", entity, key))
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(db_err) => AppError::Sqlx(db_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kinds_follow_taxonomy() {
    assert_eq!(AppError::NotFound("x".into()).kind(), ErrorKind::NotFound);
    assert_eq!(AppError::Validation("x".into()).kind(), ErrorKind::Invalid);
    assert_eq!(AppError::Conflict("x".into()).kind(), ErrorKind::Conflict);
    assert_eq!(AppError::BusinessRule("x".into()).kind(), ErrorKind::BusinessRuleViolation);
    assert_eq!(AppError::Internal("x".into()).kind(), ErrorKind::Unexpected);
    assert!(AppError::Conflict("x".into()).is_recoverable());
    assert!(!AppError::Config("x".into()).is_recoverable());
  }

  #[test]
  fn anyhow_errors_become_internal() {
    let err: AppError = anyhow::anyhow!("socket closed").into();
    assert!(matches!(err, AppError::Internal(ref m) if m == "socket closed"));
  }

  #[test]
  fn workflow_errors_are_unexpected() {
    let err: AppError = FlowError::HandlerMissing {
      step_name: "place_order".into(),
    }
    .into();
    assert_eq!(err.kind(), ErrorKind::Unexpected);
  }
}
