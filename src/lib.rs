//! flowthings Rust Client SDK
//!
//! An HTTP and WebSocket client for the flowthings.io platform, with a
//! builder for the platform's filter query language.
//!
//! # Example
//!
//! ```no_run
//! use flowthings::{age, exists, member, not, Api, Params, Token};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> flowthings::Result<()> {
//!     let api = Api::new(Token::from_env()?);
//!
//!     // Create a flow
//!     let flow = api.flow().create(json!({"path": "/alice/sensors"}), None).await?;
//!     let flow_id = flow["id"].as_str().unwrap_or_default().to_string();
//!
//!     // Drops from the last hour that carry a location and are not tests
//!     let filter = age().lt(60 * 60 * 1000)?
//!         .and(exists(member("location")))
//!         .and(not(member("elems").field("test").eq(true)));
//!
//!     let drops = api
//!         .drop(&flow_id)
//!         .find_many(Params::new().filter(filter).limit(50))
//!         .await?;
//!     println!("Found: {}", drops);
//!
//!     Ok(())
//! }
//! ```

mod api;
mod config;
mod error;
pub mod filter;
mod literal;
mod member;
mod params;
pub mod protocol;
pub mod service;
mod statistics;
pub mod transport;
mod websocket;

pub use api::{Api, Batch, Lazy};
pub use config::{ClientOptions, Token, DEFAULT_HOST, DEFAULT_VERSION, DEFAULT_WS_HOST, VCAP_SERVICES};
pub use error::{Error, PlatformError, PlatformErrorKind, Result};
pub use filter::{
  age, and, exists, has, matches, not, or, Age, Comparison, Filter, IntoMillis, Location, Millis,
};
pub use literal::{Literal, Regex};
pub use member::{member, Member};
pub use params::{Modify, Params};
pub use protocol::{DropEvent, Reply};
pub use service::{kind, Aggregation, Lookup, Model, Save, Service};
pub use statistics::{Statistics, StatisticsQuery};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use websocket::{
  connect_socket, FrameSink, FrameStream, PendingReply, WebSocketClient, WebSocketConnection,
  WebSocketService, WebSocketSession,
};
