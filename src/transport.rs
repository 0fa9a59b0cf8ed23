//! HTTP transport seam.
//!
//! Services build an [`HttpRequest`] and hand it to a [`Transport`]. The
//! default [`ReqwestTransport`] sends it over the network; tests and callers
//! with special needs can plug in their own.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;

use crate::config::Token;
use crate::error::{Error, Result};
use crate::protocol::{self, AUTH_ACCOUNT_HEADER, AUTH_TOKEN_HEADER};

/// A fully built platform request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
  /// HTTP verb, including the platform's `MGET` and `MPUT`.
  pub method: String,
  pub url: String,
  pub query: Vec<(String, String)>,
  pub body: Option<Value>,
  pub creds: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

#[async_trait]
pub trait Transport: Send + Sync {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
  client: Client,
}

impl ReqwestTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_client(client: Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
    let method = Method::from_bytes(request.method.as_bytes())
      .map_err(|_| Error::InvalidArgument(format!("invalid HTTP method: {}", request.method)))?;

    let mut builder = self
      .client
      .request(method, &request.url)
      .header(ACCEPT, HeaderValue::from_static("*/*"))
      .header(CONTENT_TYPE, HeaderValue::from_static(protocol::CONTENT_TYPE))
      .header(AUTH_TOKEN_HEADER, &request.creds.token)
      .header(AUTH_ACCOUNT_HEADER, &request.creds.account);

    if !request.query.is_empty() {
      builder = builder.query(&request.query);
    }
    if let Some(body) = &request.body {
      builder = builder.body(serde_json::to_vec(body)?);
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?.to_vec();
    Ok(HttpResponse { status, body })
  }
}
