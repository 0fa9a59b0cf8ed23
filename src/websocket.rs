//! WebSocket push channel: session bootstrap, socket setup and frame
//! handling.
//!
//! [`WebSocketService::open`] creates a session and connects to it with
//! tokio-tungstenite. [`WebSocketClient`] itself only needs a `Sink` of text
//! frames (and, for [`WebSocketClient::next_event`], a `Stream` of them), so
//! any other socket implementation can be plugged in as well.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use futures::future;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{DropEvent, IncomingMessage, OutgoingMessage, Reply};
use crate::service::{kind, Context, Service};

/// A created push session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketSession {
    pub id: String,
    /// `ws(s)://<ws host>/session/<id>/ws`
    pub url: String,
}

/// Session endpoint on the WebSocket host.
#[derive(Debug, Clone)]
pub struct WebSocketService {
    service: Service<kind::Session>,
}

impl WebSocketService {
    pub(crate) fn new(ctx: Context) -> Self {
        let base = format!("{}://{}", ctx.options.http_scheme(), ctx.options.ws_host);
        let path = <kind::Session as kind::Resource>::PATH.to_string();
        Self {
            service: Service::with_base(ctx, base, path),
        }
    }

    pub fn url(&self, sub_path: &str) -> String {
        self.service.url(sub_path)
    }

    pub async fn request(&self, method: &str, data: Option<Value>) -> Result<Reply> {
        self.service.request(method, "", data, None).await
    }

    /// Create a session and return the socket URL to connect to.
    pub async fn connect(&self) -> Result<WebSocketSession> {
        let reply = self.request("POST", None).await?;
        let id = match reply.body.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(Error::WebSocket(
                    "session response has no id".to_string(),
                ))
            }
        };
        let opts = self.service.options();
        let url = format!(
            "{}://{}{}/{}/ws",
            opts.ws_scheme(),
            opts.ws_host,
            self.service.path(),
            id
        );
        Ok(WebSocketSession { id, url })
    }

    /// Create a session and open its socket.
    pub async fn open(&self) -> Result<WebSocketConnection> {
        let session = self.connect().await?;
        connect_socket(&session.url).await
    }
}

/// Text frames going out on an open socket.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Text frames coming in on an open socket. Ends when the socket closes or
/// fails.
pub type FrameStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Open a WebSocket at `url` and wrap it in a [`WebSocketConnection`].
pub async fn connect_socket(url: &str) -> Result<WebSocketConnection> {
    let (socket, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| Error::WebSocket(e.to_string()))?;
    info!(url = %url, "websocket connected");
    let (sink, stream) = socket.split();

    let sink: FrameSink = Box::pin(
        sink.with(|frame: String| future::ready(Ok::<_, WsError>(Message::text(frame))))
            .sink_map_err(|e| Error::WebSocket(e.to_string())),
    );
    let frames: FrameStream = Box::pin(
        stream
            .take_while(|msg| {
                if let Err(e) = msg {
                    warn!(error = %e, "websocket read failed");
                }
                future::ready(msg.is_ok())
            })
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => Some(text.to_string()),
                    _ => None,
                })
            }),
    );

    Ok(WebSocketConnection {
        client: WebSocketClient::new(sink),
        frames,
    })
}

/// An open push socket: a [`WebSocketClient`] over its outgoing half plus
/// the incoming frames.
pub struct WebSocketConnection {
    client: WebSocketClient<FrameSink>,
    frames: FrameStream,
}

impl WebSocketConnection {
    pub async fn subscribe(&mut self, flow_id: &str) -> Result<PendingReply> {
        self.client.subscribe(flow_id).await
    }

    pub async fn unsubscribe(&mut self, flow_id: &str) -> Result<PendingReply> {
        self.client.unsubscribe(flow_id).await
    }

    pub async fn send_with_reply(&mut self, message: OutgoingMessage) -> Result<PendingReply> {
        self.client.send_with_reply(message).await
    }

    /// Next pushed drop; replies are routed on the way. `None` once the
    /// socket is closed.
    pub async fn next_event(&mut self) -> Option<Result<DropEvent>> {
        self.client.next_event(&mut self.frames).await
    }

    /// Hand every pushed drop to `on_message` until the socket closes.
    pub async fn run<F>(mut self, mut on_message: F) -> Result<()>
    where
        F: FnMut(DropEvent),
    {
        while let Some(event) = self.next_event().await {
            on_message(event?);
        }
        info!("websocket closed");
        Ok(())
    }

    pub async fn close(mut self) -> Result<()> {
        self.client.close().await
    }
}

/// A reply to a message sent with [`WebSocketClient::send_with_reply`].
///
/// Resolves to the reply body, or [`Error::ChannelClosed`] when the client
/// went away or the socket ended before the reply arrived.
#[derive(Debug)]
pub struct PendingReply {
    rx: oneshot::Receiver<Value>,
}

impl Future for PendingReply {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|reply| reply.map_err(|_| Error::ChannelClosed))
    }
}

/// Frames messages onto a socket and routes replies back to their callers.
pub struct WebSocketClient<S> {
    sink: S,
    next_msg_id: u64,
    pending: HashMap<u64, oneshot::Sender<Value>>,
}

impl<S> WebSocketClient<S>
where
    S: Sink<String> + Unpin,
    S::Error: fmt::Display,
{
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            next_msg_id: 0,
            pending: HashMap::new(),
        }
    }

    /// Subscribe to drops of a flow. The returned future resolves with the
    /// reply body.
    pub async fn subscribe(&mut self, flow_id: &str) -> Result<PendingReply> {
        self.send_with_reply(OutgoingMessage::subscribe(flow_id)).await
    }

    pub async fn unsubscribe(&mut self, flow_id: &str) -> Result<PendingReply> {
        self.send_with_reply(OutgoingMessage::unsubscribe(flow_id)).await
    }

    /// Send a message, tagging it with a fresh `msgId` and registering a
    /// waiter for the reply. Waiters whose [`PendingReply`] was dropped are
    /// discarded first.
    pub async fn send_with_reply(&mut self, message: OutgoingMessage) -> Result<PendingReply> {
        self.pending.retain(|_, tx| !tx.is_closed());
        let msg_id = self.next_msg_id;
        self.next_msg_id += 1;
        let (tx, rx) = oneshot::channel();
        self.pending.insert(msg_id, tx);
        if let Err(e) = self.send(message.with_msg_id(msg_id)).await {
            self.pending.remove(&msg_id);
            return Err(e);
        }
        Ok(PendingReply { rx })
    }

    /// Send a message without waiting for a reply.
    pub async fn send(&mut self, message: OutgoingMessage) -> Result<()> {
        let frame = serde_json::to_string(&message)?;
        debug!(frame = %frame, "websocket send");
        self.sink
            .send(frame)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    /// Replies still waiting for the server.
    pub fn pending_replies(&self) -> usize {
        self.pending.len()
    }

    /// Handle one incoming text frame.
    ///
    /// Replies are delivered to their waiter and yield `None`; pushed drop
    /// messages are returned.
    pub fn handle_frame(&mut self, payload: &str) -> Result<Option<DropEvent>> {
        debug!(frame = %payload, "websocket receive");
        match serde_json::from_str::<IncomingMessage>(payload)? {
            IncomingMessage::Push {
                kind,
                resource,
                value,
            } if kind == "message" => Ok(Some(DropEvent { resource, value })),
            IncomingMessage::Push { kind, .. } => {
                debug!(kind = %kind, "ignoring push frame");
                Ok(None)
            }
            IncomingMessage::Reply { head, body } => {
                let waiter = head.msg_id.and_then(|id| self.pending.remove(&id));
                match waiter {
                    // receiver may have been dropped; nothing to deliver to
                    Some(tx) => {
                        let _ = tx.send(body);
                    }
                    None => warn!(msg_id = ?head.msg_id, "reply without a waiter"),
                }
                Ok(None)
            }
        }
    }

    /// Read frames from `stream` until a drop event arrives, routing any
    /// replies on the way. `None` once the stream ends.
    pub async fn next_event<St>(&mut self, stream: &mut St) -> Option<Result<DropEvent>>
    where
        St: Stream<Item = String> + Unpin,
    {
        while let Some(frame) = stream.next().await {
            match self.handle_frame(&frame) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        // no more replies can arrive
        self.pending.clear();
        None
    }

    pub async fn close(&mut self) -> Result<()> {
        self.sink
            .close()
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    pub fn into_inner(self) -> S {
        self.sink
    }
}
