//! JSON frames exchanged with the sidecar over its WebSocket.
//!
//! Every frame is an object with a `type` tag. Requests that expect an
//! answer carry a `request_id` the sidecar echoes back.

use {
    relay_channels::{InboundMessage, gating},
    relay_common::types::MediaKind,
    serde::{Deserialize, Serialize},
};

/// Gateway -> sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    /// Start (or resume) the WhatsApp Web session.
    Login,
    /// Unlink this device.
    Logout,
    SendText {
        request_id: String,
        to: String,
        text: String,
    },
    SendMedia {
        request_id: String,
        to: String,
        file_name: String,
        mimetype: String,
        /// Base64 file contents.
        data: String,
    },
    SendPresence {
        to: String,
        state: PresenceState,
    },
    DownloadMedia {
        request_id: String,
        message_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Composing,
    Paused,
}

/// Sidecar -> gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarMessage {
    /// Pairing code to render as a QR code.
    Qr { qr: String },
    Connected {
        #[serde(default)]
        phone_number: Option<String>,
    },
    Disconnected {
        #[serde(default)]
        reason: Option<String>,
    },
    LoggedOut,
    InboundMessage(InboundPayload),
    SendResult {
        request_id: String,
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
    Media {
        request_id: String,
        mimetype: String,
        /// Base64 file contents.
        data: String,
    },
    Error {
        #[serde(default)]
        request_id: Option<String>,
        error: String,
    },
}

impl SidecarMessage {
    /// The request this frame answers, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::SendResult { request_id, .. } | Self::Media { request_id, .. } => {
                Some(request_id)
            },
            Self::Error { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }
}

/// A message as the sidecar reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundPayload {
    pub message_id: String,
    pub chat_jid: String,
    pub sender_jid: String,
    /// Our own JID for received messages; the peer's for messages we sent.
    #[serde(default)]
    pub recipient_jid: String,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub has_media: bool,
    /// WhatsApp message type tag (`ptt`, `audio`, `image`, ...).
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub timestamp: u64,
}

impl From<InboundPayload> for InboundMessage {
    fn from(p: InboundPayload) -> Self {
        Self {
            chat_type: gating::chat_type_for(&p.chat_jid),
            media_kind: p.media_type.as_deref().map(MediaKind::from_tag),
            message_id: p.message_id,
            chat_id: p.chat_jid,
            sender_id: p.sender_jid,
            recipient_id: p.recipient_jid,
            from_me: p.from_me,
            body: p.body,
            has_media: p.has_media,
            timestamp: p.timestamp,
        }
    }
}
