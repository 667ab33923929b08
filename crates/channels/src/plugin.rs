use std::path::Path;

use {
    async_trait::async_trait,
    relay_common::types::{ChatType, MediaKind},
    serde::{Deserialize, Serialize},
};

use crate::Result;

/// A message received from the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Transport message ID, used to download attached media.
    pub message_id: String,
    /// Conversation key; replies go here.
    pub chat_id: String,
    /// Sender JID.
    pub sender_id: String,
    /// Recipient JID (our own account for received messages).
    pub recipient_id: String,
    /// Whether our own account sent this message.
    pub from_me: bool,
    pub chat_type: ChatType,
    pub body: String,
    pub has_media: bool,
    pub media_kind: Option<MediaKind>,
    /// Unix timestamp (seconds) reported by the transport.
    #[serde(default)]
    pub timestamp: u64,
}

impl InboundMessage {
    /// A message we sent to ourselves ("message yourself" chat).
    #[must_use]
    pub fn is_self_chat(&self) -> bool {
        self.from_me && self.sender_id == self.recipient_id
    }

    /// Attached media that the bridge knows how to turn into a prompt.
    #[must_use]
    pub fn usable_media(&self) -> Option<&MediaKind> {
        self.media_kind
            .as_ref()
            .filter(|kind| self.has_media && (kind.is_audio() || kind.is_image()))
    }

    #[must_use]
    pub fn has_text(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

/// Downloaded media bytes.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Send messages to a chat.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send_text(&self, to: &str, text: &str) -> Result<()>;

    /// Send a local file as a media message.
    async fn send_media_file(&self, to: &str, path: &Path, mime_type: &str) -> Result<()>;

    /// Send a "typing" indicator. No-op by default.
    async fn send_typing(&self, _to: &str) -> Result<()> {
        Ok(())
    }

    /// Clear the typing indicator. No-op by default.
    async fn clear_state(&self, _to: &str) -> Result<()> {
        Ok(())
    }
}

/// Fetch media attached to an inbound message.
#[async_trait]
pub trait ChannelMedia: Send + Sync {
    async fn download_media(&self, msg: &InboundMessage) -> Result<MediaPayload>;
}
