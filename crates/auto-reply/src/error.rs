use std::fmt;

/// Why an inbound event was dropped before reaching the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The conversation is mid-turn or inside its echo window.
    Busy,
    /// Sent by our own account outside the self-chat.
    OwnMessage,
    GroupOrBroadcast,
    /// Neither text nor media the bridge can use.
    NoContent,
    /// Sender is not on the allow-list.
    Unauthorized,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Busy => "busy",
            Self::OwnMessage => "own_message",
            Self::GroupOrBroadcast => "group_or_broadcast",
            Self::NoContent => "no_content",
            Self::Unauthorized => "unauthorized",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can go wrong inside one turn. Converted to a chat reply at
/// the task boundary.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("could not download media: {0}")]
    Media(#[from] relay_channels::Error),

    #[error("could not transcribe voice message: {0}")]
    Transcription(#[from] relay_voice::Error),

    #[error("could not save image: {0}")]
    Staging(#[from] relay_media::Error),

    #[error(transparent)]
    Agent(#[from] relay_agents::AgentError),
}

impl TurnError {
    /// Whether the conversation's session should be dropped.
    #[must_use]
    pub fn invalidates_session(&self) -> bool {
        matches!(self, Self::Agent(e) if e.invalidates_session())
    }
}

pub type Result<T> = std::result::Result<T, TurnError>;
