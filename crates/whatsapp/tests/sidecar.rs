#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use {
    futures::{SinkExt, StreamExt},
    relay_channels::{ChannelMedia, ChannelOutbound, Error, InboundMessage},
    relay_common::types::{ChatType, MediaKind},
    relay_whatsapp::{SidecarClient, WhatsAppOutbound},
    serde_json::{Value, json},
    tokio::{net::TcpListener, sync::mpsc},
    tokio_tungstenite::{accept_async, tungstenite::Message},
    tokio_util::sync::CancellationToken,
};

/// How the fake answers each request frame.
#[derive(Clone, Copy)]
enum Behaviour {
    Answer,
    Silent,
    HangUp,
}

/// Single-connection fake sidecar. Returns its URL and a receiver of every
/// frame the gateway sent.
async fn fake_sidecar(behaviour: Behaviour) -> (String, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let frame: Value = serde_json::from_str(&text).unwrap();
            let _ = seen_tx.send(frame.clone());

            let reply = match (frame["type"].as_str().unwrap(), behaviour) {
                ("login", _) => Some(json!({
                    "type": "inbound_message",
                    "message_id": "M1",
                    "chat_jid": "111@c.us",
                    "sender_jid": "111@c.us",
                    "recipient_jid": "999@c.us",
                    "body": "hello",
                    "timestamp": 1
                })),
                (_, Behaviour::HangUp) => {
                    let _ = ws.close(None).await;
                    return;
                },
                (_, Behaviour::Silent) => None,
                ("send_text", _) if frame["text"] == "refuse" => Some(json!({
                    "type": "error",
                    "request_id": frame["request_id"],
                    "error": "recipient unknown"
                })),
                ("send_text" | "send_media", _) => Some(json!({
                    "type": "send_result",
                    "request_id": frame["request_id"],
                    "success": true
                })),
                ("download_media", _) => Some(json!({
                    "type": "media",
                    "request_id": frame["request_id"],
                    "mimetype": "audio/ogg",
                    "data": "AAEC"
                })),
                _ => None,
            };
            if let Some(reply) = reply {
                ws.send(Message::Text(reply.to_string().into())).await.unwrap();
            }
        }
    });

    (url, seen_rx)
}

async fn connect(
    url: String,
) -> (
    SidecarClient,
    mpsc::Receiver<InboundMessage>,
    CancellationToken,
) {
    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let client = SidecarClient::spawn(url, tx, cancel.clone());
    for _ in 0..200 {
        if client.is_connected() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(client.is_connected(), "client never connected");
    (client, rx, cancel)
}

#[tokio::test]
async fn logs_in_and_forwards_inbound_messages() {
    let (url, mut seen) = fake_sidecar(Behaviour::Answer).await;
    let (_client, mut inbound, cancel) = connect(url).await;

    assert_eq!(seen.recv().await.unwrap(), json!({"type": "login"}));

    let msg = tokio::time::timeout(Duration::from_secs(5), inbound.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.chat_id, "111@c.us");
    assert_eq!(msg.body, "hello");
    assert_eq!(msg.chat_type, ChatType::Dm);
    assert!(!msg.from_me);
    cancel.cancel();
}

#[tokio::test]
async fn text_and_media_requests_are_correlated() {
    let (url, mut seen) = fake_sidecar(Behaviour::Answer).await;
    let (client, mut inbound, cancel) = connect(url).await;
    let outbound = WhatsAppOutbound::new(client);
    let _ = seen.recv().await;

    outbound.send_text("111@c.us", "hi there").await.unwrap();
    let frame = seen.recv().await.unwrap();
    assert_eq!(frame["type"], "send_text");
    assert_eq!(frame["to"], "111@c.us");
    assert_eq!(frame["text"], "hi there");

    let msg = inbound.recv().await.unwrap();
    let mut voice = msg.clone();
    voice.has_media = true;
    voice.media_kind = Some(MediaKind::Voice);
    let media = outbound.download_media(&voice).await.unwrap();
    assert_eq!(media.mime_type, "audio/ogg");
    assert_eq!(media.data, vec![0, 1, 2]);
    let frame = seen.recv().await.unwrap();
    assert_eq!(frame["type"], "download_media");
    assert_eq!(frame["message_id"], "M1");

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("report.pdf");
    std::fs::write(&file, b"%PDF").unwrap();
    outbound
        .send_media_file("111@c.us", &file, "application/pdf")
        .await
        .unwrap();
    let frame = seen.recv().await.unwrap();
    assert_eq!(frame["type"], "send_media");
    assert_eq!(frame["file_name"], "report.pdf");
    assert_eq!(frame["mimetype"], "application/pdf");
    assert_eq!(frame["data"], "JVBERg==");
    cancel.cancel();
}

#[tokio::test]
async fn error_frame_rejects_the_request() {
    let (url, _seen) = fake_sidecar(Behaviour::Answer).await;
    let (client, _inbound, cancel) = connect(url).await;
    let outbound = WhatsAppOutbound::new(client);

    let err = outbound.send_text("111@c.us", "refuse").await.unwrap_err();
    assert!(matches!(err, Error::Rejected { .. }));
    assert!(err.to_string().contains("recipient unknown"));
    cancel.cancel();
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let (url, _seen) = fake_sidecar(Behaviour::Silent).await;
    let (client, _inbound, cancel) = connect(url).await;
    let client = client.with_request_timeout(Duration::from_millis(100));

    let err = WhatsAppOutbound::new(client)
        .send_text("111@c.us", "anyone?")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    cancel.cancel();
}

#[tokio::test]
async fn disconnect_fails_pending_requests() {
    let (url, _seen) = fake_sidecar(Behaviour::HangUp).await;
    let (client, _inbound, cancel) = connect(url).await;

    let err = WhatsAppOutbound::new(client.clone())
        .send_text("111@c.us", "bye")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unavailable { .. }));
    assert!(!client.is_connected());
    cancel.cancel();
}

#[tokio::test]
async fn sending_while_offline_is_unavailable() {
    let (tx, _rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    // Nothing listens on port 9 locally.
    let client = SidecarClient::spawn("ws://127.0.0.1:9", tx, cancel.clone());

    let err = WhatsAppOutbound::new(client)
        .send_typing("111@c.us")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unavailable { .. }));
    cancel.cancel();
}
