//! Transport error type.
//!
//! `ApiError` is `Clone` on purpose: a single in-flight request may be shared
//! by several cache subscribers, and each of them gets the same failure.

use thiserror::Error;

/// Error produced by the HTTP transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
  /// No response was received (DNS, connect, timeout, ...).
  #[error("network error: {0}")]
  Network(String),

  /// The server answered with a non-2xx status.
  #[error("server error ({status}): {message}")]
  Server { status: u16, message: String },
}

impl ApiError {
  /// Status code of a server-reported error, if any.
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Server { status, .. } => Some(*status),
      ApiError::Network(_) => None,
    }
  }

  /// True for 401-class failures (missing or rejected credential).
  pub fn is_unauthorized(&self) -> bool {
    matches!(self, ApiError::Server { status: 401, .. })
  }
}

/// Result type for transport operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unauthorized_detection() {
    let err = ApiError::Server {
      status: 401,
      message: "invalid credentials".into(),
    };
    assert!(err.is_unauthorized());
    assert_eq!(err.status(), Some(401));

    let err = ApiError::Network("connection refused".into());
    assert!(!err.is_unauthorized());
    assert_eq!(err.status(), None);
  }
}
