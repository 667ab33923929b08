use std::time::Duration;

/// Failures of a single agent invocation.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The process ran past the configured wall-clock limit and was killed.
    #[error("agent timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The process exited unsuccessfully without producing output.
    #[error("agent exited with {}: {}", describe_code(.code), .stderr.trim())]
    Exit { code: Option<i32>, stderr: String },

    /// The process could not be started.
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Whether the continuation token should be discarded after this failure.
    ///
    /// The CLI has no structured error code for an unknown or corrupt session,
    /// so an unsuccessful exit whose diagnostics mention the session counts as
    /// invalidating it. Timeouts and spawn failures never do: the session is
    /// fine, the process just did not finish.
    #[must_use]
    pub fn invalidates_session(&self) -> bool {
        match self {
            Self::Exit { stderr, .. } => stderr.to_ascii_lowercase().contains("session"),
            Self::Timeout(_) | Self::Spawn { .. } | Self::Io(_) => false,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("code {c}"))
}

pub type Result<T> = std::result::Result<T, AgentError>;
