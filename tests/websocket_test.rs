//! flowthings Rust SDK - WebSocket Tests

use flowthings::{connect_socket, Error};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// Accepts one socket, answers the first message it reads, pushes one drop
/// and closes.
async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let frame = ws.next().await.unwrap().unwrap();
        let request: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(request["type"], "subscribe");

        let reply = json!({
            "head": {"msgId": request["msgId"], "ok": true, "status": 200},
            "body": {"flowId": request["flowId"]}
        });
        ws.send(Message::text(reply.to_string())).await.unwrap();

        let push = json!({
            "type": "message",
            "resource": request["flowId"],
            "value": {"elems": {"temp": 21}}
        });
        ws.send(Message::text(push.to_string())).await.unwrap();
        ws.close(None).await.unwrap();
    });

    format!("ws://{}", addr)
}

#[tokio::test]
async fn test_subscribe_over_socket() {
    let url = spawn_server().await;
    let mut conn = connect_socket(&url).await.unwrap();

    let reply = conn.subscribe("f1").await.unwrap();
    let event = conn.next_event().await.unwrap().unwrap();
    assert_eq!(event.resource, "f1");
    assert_eq!(event.value["elems"]["temp"], 21);
    assert_eq!(reply.await.unwrap(), json!({"flowId": "f1"}));

    assert!(conn.next_event().await.is_none());
}

#[tokio::test]
async fn test_run_delivers_drops_until_close() {
    let url = spawn_server().await;
    let mut conn = connect_socket(&url).await.unwrap();
    let _reply = conn.subscribe("f7").await.unwrap();

    let mut seen = Vec::new();
    conn.run(|event| seen.push(event.resource)).await.unwrap();
    assert_eq!(seen, vec!["f7".to_string()]);
}

#[tokio::test]
async fn test_unanswered_reply_fails_on_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.next().await;
        ws.close(None).await.unwrap();
    });

    let mut conn = connect_socket(&format!("ws://{}", addr)).await.unwrap();
    let reply = conn.subscribe("f1").await.unwrap();
    assert!(conn.next_event().await.is_none());
    assert!(matches!(reply.await, Err(Error::ChannelClosed)));
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = connect_socket(&format!("ws://{}", addr)).await.err().unwrap();
    assert!(matches!(err, Error::WebSocket(_)));
}
