//! WebSocket client for the sidecar.
//!
//! One background task owns the socket and reconnects with backoff. Callers
//! write frames through an unbounded channel and wait for correlated
//! responses on a oneshot keyed by `request_id`.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    futures::{SinkExt, StreamExt},
    relay_channels::{Error, InboundMessage, Result},
    tokio::sync::{Mutex, mpsc, oneshot},
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::types::{GatewayMessage, SidecarMessage};

/// How long a correlated request waits for its answer.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum reconnect backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<SidecarMessage>>>>;

/// Handle to the sidecar connection. Cheap to clone.
#[derive(Clone)]
pub struct SidecarClient {
    write_tx: mpsc::UnboundedSender<String>,
    pending: Pending,
    connected: Arc<AtomicBool>,
    request_timeout: Duration,
}

impl SidecarClient {
    /// Start the connection task. Inbound chat messages are pushed into
    /// `inbound`; the task exits when `cancel` fires.
    pub fn spawn(
        url: impl Into<String>,
        inbound: mpsc::Sender<InboundMessage>,
        cancel: CancellationToken,
    ) -> Self {
        let (write_tx, write_rx) = mpsc::unbounded_channel::<String>();
        let pending = Pending::default();
        let connected = Arc::new(AtomicBool::new(false));

        let link = Link {
            url: url.into(),
            inbound,
            pending: Arc::clone(&pending),
            connected: Arc::clone(&connected),
        };
        tokio::spawn(connection_loop(link, write_rx, cancel));

        Self {
            write_tx,
            pending,
            connected,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Fire-and-forget frame.
    pub fn send(&self, msg: &GatewayMessage) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::unavailable("whatsapp sidecar not connected"));
        }
        let json = serde_json::to_string(msg)?;
        self.write_tx
            .send(json)
            .map_err(|_| Error::unavailable("sidecar connection task stopped"))
    }

    /// Send a frame built around a fresh request id and wait for the answer.
    ///
    /// An `error` frame carrying the id is returned as [`Error::Rejected`].
    pub async fn request(
        &self,
        build: impl FnOnce(String) -> GatewayMessage,
    ) -> Result<SidecarMessage> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.clone(), tx);

        if let Err(e) = self.send(&build(request_id.clone())) {
            self.pending.lock().await.remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(SidecarMessage::Error { error, .. })) => Err(Error::rejected(error)),
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::unavailable(
                "sidecar disconnected before answering",
            )),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                Err(Error::Timeout {
                    secs: self.request_timeout.as_secs(),
                })
            },
        }
    }
}

/// State shared between reconnect attempts.
struct Link {
    url: String,
    inbound: mpsc::Sender<InboundMessage>,
    pending: Pending,
    connected: Arc<AtomicBool>,
}

impl Link {
    async fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        // Dropping the senders wakes every waiter with a receive error.
        self.pending.lock().await.clear();
    }
}

async fn connection_loop(
    link: Link,
    mut write_rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let mut backoff = Duration::from_secs(1);

    loop {
        info!(url = %link.url, "connecting to whatsapp sidecar");

        let mut established = false;
        tokio::select! {
            () = cancel.cancelled() => {
                link.mark_disconnected().await;
                return;
            },
            result = connect_and_run(&link, &mut write_rx, &mut established) => match result {
                Ok(()) => debug!("sidecar connection closed"),
                Err(e) => error!(error = %e, "sidecar connection error"),
            },
        }

        link.mark_disconnected().await;
        // Frames queued while offline belong to requests that already failed.
        while write_rx.try_recv().is_ok() {}

        if established {
            backoff = Duration::from_secs(1);
        }
        info!(delay_ms = backoff.as_millis(), "reconnecting after delay");
        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(backoff) => {},
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Single connection attempt: connect, log in, then pump frames.
async fn connect_and_run(
    link: &Link,
    write_rx: &mut mpsc::UnboundedReceiver<String>,
    established: &mut bool,
) -> std::result::Result<(), tokio_tungstenite::tungstenite::Error> {
    let (ws_stream, _response) = connect_async(link.url.as_str()).await?;
    let (mut ws_sink, mut ws_reader) = ws_stream.split();

    *established = true;
    link.connected.store(true, Ordering::SeqCst);

    let login = serde_json::to_string(&GatewayMessage::Login).unwrap_or_default();
    ws_sink.send(Message::Text(login.into())).await?;

    loop {
        tokio::select! {
            msg = ws_reader.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => route_frame(link, &text).await,
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("sidecar closed the socket");
                        return Ok(());
                    },
                    Some(Ok(_)) => {},
                    Some(Err(e)) => return Err(e),
                }
            },
            outgoing = write_rx.recv() => {
                let Some(json) = outgoing else {
                    return Ok(());
                };
                ws_sink.send(Message::Text(json.into())).await?;
            },
        }
    }
}

async fn route_frame(link: &Link, text: &str) {
    let msg = match serde_json::from_str::<SidecarMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "unrecognised sidecar frame");
            return;
        },
    };

    if let Some(id) = msg.request_id().map(str::to_owned) {
        let waiter = link.pending.lock().await.remove(&id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(msg);
            },
            None => debug!(request_id = %id, "response for unknown request"),
        }
        return;
    }

    match msg {
        SidecarMessage::InboundMessage(payload) => {
            let message = InboundMessage::from(payload);
            debug!(chat_id = %message.chat_id, from_me = message.from_me, "inbound message");
            if link.inbound.send(message).await.is_err() {
                warn!("inbound receiver dropped, discarding message");
            }
        },
        SidecarMessage::Qr { qr } => {
            info!("scan this code with WhatsApp > Linked devices to pair");
            info!(target: "whatsapp_sidecar", qr = %qr, "pairing code");
        },
        SidecarMessage::Connected { phone_number } => {
            info!(phone_number = phone_number.as_deref().unwrap_or("unknown"), "whatsapp connected");
        },
        SidecarMessage::Disconnected { reason } => {
            warn!(reason = reason.as_deref().unwrap_or("unknown"), "whatsapp disconnected");
        },
        SidecarMessage::LoggedOut => warn!("whatsapp session logged out, pairing required"),
        SidecarMessage::Error { error, .. } => error!(error = %error, "sidecar error"),
        SidecarMessage::SendResult { .. } | SidecarMessage::Media { .. } => {},
    }
}
