//! Shared test transport that echoes each request back as the response body.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flowthings::{Api, ClientOptions, HttpRequest, HttpResponse, Result, Token, Transport};
use serde_json::{json, Map, Value};

pub fn creds() -> Token {
  Token::new("acc", "tok")
}

pub fn test_options() -> ClientOptions {
  ClientOptions::new()
    .with_host("test")
    .with_ws_host("ws.test")
    .with_version("test")
}

/// Responds with `status` and echoes the request (method, url, params,
/// data, account) in the body, plus optional references.
pub struct EchoTransport {
  pub status: u16,
  pub references: Value,
  pub requests: Mutex<Vec<HttpRequest>>,
}

impl EchoTransport {
  pub fn ok() -> Self {
    Self::with_status(200)
  }

  pub fn with_status(status: u16) -> Self {
    Self {
      status,
      references: json!({}),
      requests: Mutex::new(Vec::new()),
    }
  }

  pub fn sent(&self) -> Vec<HttpRequest> {
    self.requests.lock().unwrap().clone()
  }
}

#[async_trait]
impl Transport for EchoTransport {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
    self.requests.lock().unwrap().push(request.clone());

    let params: Map<String, Value> = request
      .query
      .iter()
      .map(|(k, v)| (k.clone(), Value::String(v.clone())))
      .collect();
    let ok = (200..400).contains(&self.status);
    let errors = if ok { json!([]) } else { json!(["failed"]) };
    let envelope = json!({
      "head": {
        "ok": ok,
        "status": self.status,
        "errors": errors,
        "messages": [],
        "references": self.references,
      },
      "body": {
        "method": request.method,
        "url": request.url,
        "params": params,
        "data": request.body,
        "account": request.creds.account,
      }
    });
    Ok(HttpResponse {
      status: self.status,
      body: serde_json::to_vec(&envelope)?,
    })
  }
}

pub fn test_api() -> (Api, Arc<EchoTransport>) {
  test_api_with(EchoTransport::ok())
}

pub fn test_api_with(transport: EchoTransport) -> (Api, Arc<EchoTransport>) {
  let transport = Arc::new(transport);
  let api = Api::with_transport(creds(), test_options(), transport.clone());
  (api, transport)
}

/// The echo body expected for a request.
pub fn echoed(method: &str, url: &str, params: Value, data: Value) -> Value {
  json!({
    "method": method,
    "url": url,
    "params": params,
    "data": data,
    "account": "acc",
  })
}
