use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Where a message originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    /// One-to-one chat (including the account's chat with itself).
    Dm,
    /// Group chat.
    Group,
    /// Status/broadcast list.
    Broadcast,
}

impl ChatType {
    /// Groups and broadcasts are never serviced by the bridge.
    #[must_use]
    pub fn is_direct(self) -> bool {
        matches!(self, Self::Dm)
    }
}

/// Kind of media attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    /// Push-to-talk voice note.
    Voice,
    Image,
    Sticker,
    Video,
    Document,
    #[serde(untagged)]
    Other(String),
}

impl MediaKind {
    /// Parse the sidecar's media type tag (`ptt` is a WhatsApp voice note).
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "audio" => Self::Audio,
            "ptt" | "voice" => Self::Voice,
            "image" => Self::Image,
            "sticker" => Self::Sticker,
            "video" => Self::Video,
            "document" => Self::Document,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio | Self::Voice)
    }

    #[must_use]
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image | Self::Sticker)
    }
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Truncate to at most `max_chars` characters for log previews.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_tags() {
        assert_eq!(MediaKind::from_tag("ptt"), MediaKind::Voice);
        assert_eq!(MediaKind::from_tag("IMAGE"), MediaKind::Image);
        assert_eq!(
            MediaKind::from_tag("location"),
            MediaKind::Other("location".into())
        );
        assert!(MediaKind::Voice.is_audio());
        assert!(MediaKind::Sticker.is_image());
        assert!(!MediaKind::Video.is_image());
    }

    #[test]
    fn preview_is_char_safe() {
        assert_eq!(preview("hello", 10), "hello");
        assert_eq!(preview("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn only_dm_is_direct() {
        assert!(ChatType::Dm.is_direct());
        assert!(!ChatType::Group.is_direct());
        assert!(!ChatType::Broadcast.is_direct());
    }
}
