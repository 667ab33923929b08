use std::path::Path;

use async_trait::async_trait;

use crate::Result;

/// What one agent turn produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentReply {
    /// Human-readable reply text (may be empty).
    pub text: String,
    /// Total spend for the turn, when the agent reports it.
    pub cost_usd: Option<f64>,
    /// Wall-clock time the agent reports for the turn.
    pub duration_ms: Option<u64>,
    /// Session the agent says it used.
    pub session_id: Option<String>,
}

impl AgentReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Run one prompt through the agent.
///
/// `session_token` is the conversation's continuation token; `is_resume`
/// says whether the agent has seen it before (resume) or should start a new
/// session under that ID. `outbox_dir`, when set, is where this turn may
/// leave files to be sent back to the conversation.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(
        &self,
        text: &str,
        session_token: &str,
        is_resume: bool,
        outbox_dir: Option<&Path>,
    ) -> Result<AgentReply>;
}
