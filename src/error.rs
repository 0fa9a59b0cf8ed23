//! Error types for the flowthings client SDK.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  #[error("Not a valid filter primitive: {0}")]
  InvalidPrimitive(String),

  #[error("{0}")]
  Platform(PlatformError),

  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Serialization error: {0}")]
  Serialization(String),

  #[error("Credentials not found: {0}")]
  Credentials(String),

  #[error("WebSocket error: {0}")]
  WebSocket(String),

  #[error("Background task failed: {0}")]
  Task(String),

  #[error("Channel closed")]
  ChannelClosed,
}

impl Error {
  /// True for a 404 from the platform.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Error::Platform(e) if e.kind == PlatformErrorKind::NotFound)
  }
}

impl From<serde_json::Error> for Error {
  fn from(e: serde_json::Error) -> Self {
    Self::Serialization(e.to_string())
  }
}

impl From<PlatformError> for Error {
  fn from(e: PlatformError) -> Self {
    Self::Platform(e)
  }
}

/// Classification of a failed platform response by its `head.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformErrorKind {
  BadRequest,
  Forbidden,
  NotFound,
  ServerError,
  Other,
}

impl PlatformErrorKind {
  pub fn from_status(status: u16) -> Self {
    match status {
      400 => Self::BadRequest,
      403 => Self::Forbidden,
      404 => Self::NotFound,
      500 => Self::ServerError,
      _ => Self::Other,
    }
  }
}

impl fmt::Display for PlatformErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::BadRequest => "BadRequest",
      Self::Forbidden => "Forbidden",
      Self::NotFound => "NotFound",
      Self::ServerError => "ServerError",
      Self::Other => "PlatformError",
    };
    f.write_str(name)
  }
}

/// A non-success response from the platform, with the request that caused it.
#[derive(Debug, Clone)]
pub struct PlatformError {
  pub kind: PlatformErrorKind,
  pub status: u16,
  pub errors: Vec<Value>,
  pub account: Option<String>,
  pub method: Option<String>,
  pub path: Option<String>,
}

impl fmt::Display for PlatformError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "<{}", self.kind)?;
    for part in [&self.account, &self.method, &self.path].into_iter().flatten() {
      write!(f, " {}", part)?;
    }
    if !self.errors.is_empty() {
      write!(f, " {}", Value::Array(self.errors.clone()))?;
    }
    write!(f, ">")
  }
}

impl std::error::Error for PlatformError {}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_kind_from_status() {
    assert_eq!(PlatformErrorKind::from_status(400), PlatformErrorKind::BadRequest);
    assert_eq!(PlatformErrorKind::from_status(403), PlatformErrorKind::Forbidden);
    assert_eq!(PlatformErrorKind::from_status(404), PlatformErrorKind::NotFound);
    assert_eq!(PlatformErrorKind::from_status(500), PlatformErrorKind::ServerError);
    assert_eq!(PlatformErrorKind::from_status(418), PlatformErrorKind::Other);
  }

  #[test]
  fn test_platform_error_display() {
    let err = PlatformError {
      kind: PlatformErrorKind::NotFound,
      status: 404,
      errors: vec![json!("no such flow")],
      account: Some("acc".to_string()),
      method: Some("GET".to_string()),
      path: Some("/flow/foo".to_string()),
    };
    assert_eq!(err.to_string(), r#"<NotFound acc GET /flow/foo ["no such flow"]>"#);
  }

  #[test]
  fn test_is_not_found() {
    let err: Error = PlatformError {
      kind: PlatformErrorKind::NotFound,
      status: 404,
      errors: Vec::new(),
      account: None,
      method: None,
      path: None,
    }
    .into();
    assert!(err.is_not_found());
    assert!(!Error::ChannelClosed.is_not_found());
  }
}
