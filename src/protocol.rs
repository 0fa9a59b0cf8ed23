//! Wire types for the platform's HTTP response envelope and WebSocket frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content type sent with every HTTP request
pub const CONTENT_TYPE: &str = "application/json; charset=\"UTF-8\"";

/// Header carrying the access token
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Header carrying the account name
pub const AUTH_ACCOUNT_HEADER: &str = "x-auth-account";

/// `head` section of a platform response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseHead {
  #[serde(default)]
  pub ok: bool,
  #[serde(default)]
  pub status: u16,
  #[serde(default)]
  pub errors: Vec<Value>,
  #[serde(default)]
  pub messages: Vec<Value>,
  #[serde(default)]
  pub references: Value,
}

/// Every HTTP response body: `{"head": {..}, "body": ..}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
  pub head: ResponseHead,
  #[serde(default)]
  pub body: Value,
}

/// Decoded successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
  pub body: Value,
  /// Referenced resources, present when the request asked for `refs`.
  pub references: Option<Value>,
}

/// Kind of an outgoing WebSocket message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
  Subscribe,
  Unsubscribe,
  Create,
  Find,
  Update,
  Delete,
}

impl MessageType {
  fn targets_flow(self) -> bool {
    matches!(self, MessageType::Subscribe | MessageType::Unsubscribe)
  }
}

/// Client-to-server WebSocket frame.
///
/// Subscriptions address a flow through `flowId`; every other message
/// carries its payload in `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
  #[serde(rename = "type")]
  pub kind: MessageType,
  pub object: String,
  #[serde(rename = "flowId", skip_serializing_if = "Option::is_none")]
  pub flow_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub value: Option<Value>,
  #[serde(rename = "msgId", skip_serializing_if = "Option::is_none")]
  pub msg_id: Option<u64>,
}

impl OutgoingMessage {
  pub fn new(kind: MessageType, object: impl Into<String>, value: Value) -> Self {
    let (flow_id, value) = if kind.targets_flow() {
      (value.as_str().map(str::to_string), None)
    } else {
      (None, Some(value))
    };
    Self {
      kind,
      object: object.into(),
      flow_id,
      value,
      msg_id: None,
    }
  }

  pub fn subscribe(flow_id: impl Into<String>) -> Self {
    Self::new(MessageType::Subscribe, "drop", Value::String(flow_id.into()))
  }

  pub fn unsubscribe(flow_id: impl Into<String>) -> Self {
    Self::new(MessageType::Unsubscribe, "drop", Value::String(flow_id.into()))
  }

  pub fn with_msg_id(mut self, msg_id: u64) -> Self {
    self.msg_id = Some(msg_id);
    self
  }
}

/// `head` of a WebSocket reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyHead {
  #[serde(rename = "msgId", default)]
  pub msg_id: Option<u64>,
  #[serde(default)]
  pub ok: bool,
  #[serde(default)]
  pub status: u16,
  #[serde(default)]
  pub errors: Vec<Value>,
}

/// A pushed update for a subscribed resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropEvent {
  pub resource: String,
  pub value: Value,
}

/// Server-to-client WebSocket frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncomingMessage {
  Reply {
    head: ReplyHead,
    #[serde(default)]
    body: Value,
  },
  Push {
    #[serde(rename = "type")]
    kind: String,
    resource: String,
    #[serde(default)]
    value: Value,
  },
}
