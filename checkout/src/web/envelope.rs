// gok_checkout/src/web/envelope.rs

use crate::errors::{AppError, ErrorKind};
use serde::{Deserialize, Serialize};

/// Uniform response body: `{ success, message, data, errors[] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
  pub success: bool,
  pub message: String,
  pub data: Option<T>,
  pub errors: Vec<String>,
}

impl<T> ApiResponse<T> {
  pub fn ok(data: T, message: impl Into<String>) -> Self {
    Self {
      success: true,
      message: message.into(),
      data: Some(data),
      errors: Vec::new(),
    }
  }

  pub fn fail(message: impl Into<String>, errors: Vec<String>) -> Self {
    Self {
      success: false,
      message: message.into(),
      data: None,
      errors,
    }
  }

  /// Converts an operation result, hiding the details of unexpected failures.
  pub fn from_result(result: Result<T, AppError>, ok_message: &str) -> Self {
    match result {
      Ok(data) => Self::ok(data, ok_message),
      Err(err) => err.into(),
    }
  }
}

impl<T> From<AppError> for ApiResponse<T> {
  fn from(err: AppError) -> Self {
    let kind = err.kind();
    match kind {
      ErrorKind::Unexpected => {
        tracing::error!(application_error = %err, "Responding with unexpected error");
        Self::fail("An unexpected error occurred", vec!["Please try again later".to_string()])
      }
      _ => {
        tracing::warn!(application_error = %err, ?kind, "Responding with error");
        let message = match kind {
          ErrorKind::NotFound => "Resource not found",
          ErrorKind::Invalid => "Invalid request",
          ErrorKind::Conflict => "Conflict",
          _ => "Request violates a business rule",
        };
        Self::fail(message, vec![err.to_string()])
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn success_envelope() {
    let response = ApiResponse::from_result(Ok(7), "done");
    assert!(response.success);
    assert_eq!(response.data, Some(7));
    assert!(response.errors.is_empty());
  }

  #[test]
  fn unexpected_errors_are_masked() {
    let response: ApiResponse<()> = ApiResponse::from_result(Err(AppError::Internal("pool timed out".into())), "done");
    assert!(!response.success);
    assert!(response.errors.iter().all(|e| !e.contains("pool")));
  }

  #[test]
  fn recoverable_errors_are_reported() {
    let response: ApiResponse<()> = AppError::BusinessRule("Insufficient stock for 'Latte'".into()).into();
    assert_eq!(response.message, "Request violates a business rule");
    assert!(response.errors[0].contains("Latte"));
  }

  #[test]
  fn serializes_camel_case() {
    let json = serde_json::to_value(ApiResponse::ok("x", "fine")).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"], "x");
    assert!(json["errors"].as_array().unwrap().is_empty());
  }
}
