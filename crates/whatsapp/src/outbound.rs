use std::path::Path;

use {
    async_trait::async_trait,
    base64::{Engine as _, engine::general_purpose::STANDARD},
    relay_channels::{
        ChannelMedia, ChannelOutbound, Error, InboundMessage, MediaPayload, Result,
    },
    tracing::debug,
};

use crate::{
    sidecar::SidecarClient,
    types::{GatewayMessage, PresenceState, SidecarMessage},
};

/// Outbound side of the WhatsApp channel, backed by the sidecar.
#[derive(Clone)]
pub struct WhatsAppOutbound {
    client: SidecarClient,
}

impl WhatsAppOutbound {
    pub fn new(client: SidecarClient) -> Self {
        Self { client }
    }

    fn presence(&self, to: &str, state: PresenceState) -> Result<()> {
        self.client.send(&GatewayMessage::SendPresence {
            to: to.to_string(),
            state,
        })
    }
}

/// Turn a `send_result` into success or a rejection.
fn expect_sent(response: SidecarMessage) -> Result<()> {
    match response {
        SidecarMessage::SendResult { success: true, .. } => Ok(()),
        SidecarMessage::SendResult { error, .. } => Err(Error::rejected(
            error.unwrap_or_else(|| "send failed".to_string()),
        )),
        other => Err(Error::invalid_input(format!(
            "unexpected sidecar response: {other:?}"
        ))),
    }
}

#[async_trait]
impl ChannelOutbound for WhatsAppOutbound {
    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        debug!(to, len = text.len(), "sending text");
        let response = self
            .client
            .request(|request_id| GatewayMessage::SendText {
                request_id,
                to: to.to_string(),
                text: text.to_string(),
            })
            .await?;
        expect_sent(response)
    }

    async fn send_media_file(&self, to: &str, path: &Path, mime_type: &str) -> Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::external(format!("read {}", path.display()), e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        debug!(to, file_name = %file_name, size = bytes.len(), "sending media");

        let data = STANDARD.encode(&bytes);
        let response = self
            .client
            .request(|request_id| GatewayMessage::SendMedia {
                request_id,
                to: to.to_string(),
                file_name,
                mimetype: mime_type.to_string(),
                data,
            })
            .await?;
        expect_sent(response)
    }

    async fn send_typing(&self, to: &str) -> Result<()> {
        self.presence(to, PresenceState::Composing)
    }

    async fn clear_state(&self, to: &str) -> Result<()> {
        self.presence(to, PresenceState::Paused)
    }
}

#[async_trait]
impl ChannelMedia for WhatsAppOutbound {
    async fn download_media(&self, msg: &InboundMessage) -> Result<MediaPayload> {
        let response = self
            .client
            .request(|request_id| GatewayMessage::DownloadMedia {
                request_id,
                message_id: msg.message_id.clone(),
            })
            .await?;
        let SidecarMessage::Media { mimetype, data, .. } = response else {
            return Err(Error::invalid_input(format!(
                "unexpected sidecar response: {response:?}"
            )));
        };
        let data = STANDARD
            .decode(data.as_bytes())
            .map_err(|e| Error::external("decode media payload", e))?;
        if data.is_empty() {
            return Err(Error::invalid_input("downloaded media is empty"));
        }
        Ok(MediaPayload {
            mime_type: mimetype,
            data,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_send_result() {
        let ok = SidecarMessage::SendResult {
            request_id: "r".into(),
            success: true,
            error: None,
        };
        assert!(expect_sent(ok).is_ok());
    }

    #[test]
    fn failed_send_result_is_rejected() {
        let failed = SidecarMessage::SendResult {
            request_id: "r".into(),
            success: false,
            error: Some("not on whatsapp".into()),
        };
        let err = expect_sent(failed).unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }));
        assert!(err.to_string().contains("not on whatsapp"));
    }

    #[test]
    fn wrong_response_type_is_an_error() {
        let media = SidecarMessage::Media {
            request_id: "r".into(),
            mimetype: "image/png".into(),
            data: String::new(),
        };
        assert!(matches!(
            expect_sent(media),
            Err(Error::InvalidInput { .. })
        ));
    }
}
