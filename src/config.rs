//! Credentials and client options.

use std::env;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub const DEFAULT_HOST: &str = "api.flowthings.io";
pub const DEFAULT_WS_HOST: &str = "ws.flowthings.io";
pub const DEFAULT_VERSION: &str = "0.1";

/// Bluemix service binding environment variable.
pub const VCAP_SERVICES: &str = "VCAP_SERVICES";

/// Account credentials sent with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
  pub account: String,
  pub token: String,
}

impl Token {
  pub fn new(account: impl Into<String>, token: impl Into<String>) -> Self {
    Self {
      account: account.into(),
      token: token.into(),
    }
  }

  /// Read credentials from a Bluemix `VCAP_SERVICES`-style variable.
  ///
  /// Expects `{"flowthings": [{"credentials": {"account": .., "token": ..}}]}`.
  pub fn from_bluemix(env_var: &str) -> Result<Self> {
    let raw = env::var(env_var)
      .map_err(|_| Error::Credentials(format!("{} is not set", env_var)))?;
    Self::from_vcap_json(&raw)
  }

  /// Like [`Token::from_bluemix`], falling back to `default` on any failure.
  pub fn from_bluemix_or(env_var: &str, default: Token) -> Self {
    Self::from_bluemix(env_var).unwrap_or(default)
  }

  fn from_vcap_json(raw: &str) -> Result<Self> {
    let vcap: Value = serde_json::from_str(raw)?;
    let creds = vcap
      .pointer("/flowthings/0/credentials")
      .ok_or_else(|| Error::Credentials("Bluemix credentials not found".to_string()))?;
    serde_json::from_value(creds.clone())
      .map_err(|e| Error::Credentials(format!("Bluemix credentials malformed: {}", e)))
  }

  /// Read `FLOWTHINGS_ACCOUNT` and `FLOWTHINGS_TOKEN`.
  pub fn from_env() -> Result<Self> {
    let account = env::var("FLOWTHINGS_ACCOUNT")
      .map_err(|_| Error::Credentials("FLOWTHINGS_ACCOUNT is not set".to_string()))?;
    let token = env::var("FLOWTHINGS_TOKEN")
      .map_err(|_| Error::Credentials("FLOWTHINGS_TOKEN is not set".to_string()))?;
    Ok(Self { account, token })
  }
}

/// Endpoint options shared by every service of an [`crate::Api`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
  pub secure: bool,
  pub host: String,
  pub ws_host: String,
  pub version: String,
  /// Query parameters merged into every request, overridden per call.
  pub params: Map<String, Value>,
}

impl Default for ClientOptions {
  fn default() -> Self {
    Self {
      secure: true,
      host: DEFAULT_HOST.to_string(),
      ws_host: DEFAULT_WS_HOST.to_string(),
      version: DEFAULT_VERSION.to_string(),
      params: Map::new(),
    }
  }
}

impl ClientOptions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Defaults overridden by `FLOWTHINGS_HOST`, `FLOWTHINGS_WS_HOST`,
  /// `FLOWTHINGS_VERSION` and `FLOWTHINGS_SECURE` when set.
  pub fn from_env() -> Self {
    let mut opts = Self::default();
    if let Ok(host) = env::var("FLOWTHINGS_HOST") {
      opts.host = host;
    }
    if let Ok(ws_host) = env::var("FLOWTHINGS_WS_HOST") {
      opts.ws_host = ws_host;
    }
    if let Ok(version) = env::var("FLOWTHINGS_VERSION") {
      opts.version = version;
    }
    if let Ok(secure) = env::var("FLOWTHINGS_SECURE") {
      opts.secure = !matches!(secure.to_ascii_lowercase().as_str(), "0" | "false" | "no");
    }
    opts
  }

  pub fn with_host(mut self, host: impl Into<String>) -> Self {
    self.host = host.into();
    self
  }

  pub fn with_ws_host(mut self, ws_host: impl Into<String>) -> Self {
    self.ws_host = ws_host.into();
    self
  }

  pub fn with_version(mut self, version: impl Into<String>) -> Self {
    self.version = version.into();
    self
  }

  pub fn with_secure(mut self, secure: bool) -> Self {
    self.secure = secure;
    self
  }

  pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.params.insert(key.into(), value.into());
    self
  }

  pub(crate) fn http_scheme(&self) -> &'static str {
    if self.secure {
      "https"
    } else {
      "http"
    }
  }

  pub(crate) fn ws_scheme(&self) -> &'static str {
    if self.secure {
      "wss"
    } else {
      "ws"
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_default_options() {
    let opts = ClientOptions::default();
    assert!(opts.secure);
    assert_eq!(opts.host, "api.flowthings.io");
    assert_eq!(opts.ws_host, "ws.flowthings.io");
    assert_eq!(opts.version, "0.1");
    assert!(opts.params.is_empty());
  }

  #[test]
  fn test_options_builder_chain() {
    let opts = ClientOptions::new()
      .with_host("test")
      .with_ws_host("ws.test")
      .with_version("test")
      .with_secure(false)
      .with_param("refs", 1);

    assert_eq!(opts.host, "test");
    assert_eq!(opts.ws_host, "ws.test");
    assert_eq!(opts.version, "test");
    assert_eq!(opts.http_scheme(), "http");
    assert_eq!(opts.ws_scheme(), "ws");
    assert_eq!(opts.params["refs"], json!(1));
  }

  #[test]
  fn test_vcap_json() {
    let raw = json!({
      "flowthings": [{ "credentials": { "account": "test", "token": "token" } }]
    })
    .to_string();
    let token = Token::from_vcap_json(&raw).unwrap();
    assert_eq!(token, Token::new("test", "token"));
  }

  #[test]
  fn test_vcap_json_missing_service() {
    let err = Token::from_vcap_json(r#"{"other": []}"#).unwrap_err();
    assert!(matches!(err, Error::Credentials(_)));
  }

  #[test]
  fn test_bluemix_default() {
    let token = Token::from_bluemix_or("DOES_NOT_EXIST_PROBABLY", Token::new("foo", "bar"));
    assert_eq!(token.account, "foo");
    assert_eq!(token.token, "bar");
  }
}
