use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{tool} not found")]
    BinaryNotFound { tool: String },

    #[error("whisper model not found at {0}")]
    ModelNotFound(String),

    #[error("{tool} failed: {detail}")]
    ToolFailed { tool: String, detail: String },

    #[error("{tool} timed out after {}s", .after.as_secs())]
    Timeout { tool: String, after: Duration },

    #[error("transcription was empty")]
    EmptyTranscript,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn tool_failed(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
