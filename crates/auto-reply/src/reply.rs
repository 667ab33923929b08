//! Text the bridge writes back to the chat.

use std::path::Path;

use relay_agents::AgentReply;

/// Sent when the agent finishes without saying anything.
pub const EMPTY_REPLY: &str = "(no response)";

const DEFAULT_IMAGE_CAPTION: &str = "Describe this image";

/// `\n_Cost: $0.0123 | Time: 4.2s_`, or empty if nothing is known.
pub fn footer(cost_usd: Option<f64>, duration_ms: Option<u64>) -> String {
    let mut parts = Vec::with_capacity(2);
    if let Some(cost) = cost_usd {
        parts.push(format!("Cost: ${cost:.4}"));
    }
    if let Some(ms) = duration_ms {
        parts.push(format!("Time: {:.1}s", ms as f64 / 1000.0));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("\n_{}_", parts.join(" | "))
    }
}

/// Full outbound text for a successful turn.
pub fn compose(reply: &AgentReply) -> String {
    let body = if reply.text.trim().is_empty() {
        EMPTY_REPLY
    } else {
        reply.text.as_str()
    };
    format!("{body}{}", footer(reply.cost_usd, reply.duration_ms))
}

pub fn error_reply(detail: &str, session_reset: bool) -> String {
    if session_reset {
        format!("Error (session reset): {detail}")
    } else {
        format!("Error: {detail}")
    }
}

/// Prompt pointing the agent at a staged image.
pub fn image_prompt(path: &Path, caption: &str) -> String {
    let caption = caption.trim();
    let caption = if caption.is_empty() {
        DEFAULT_IMAGE_CAPTION
    } else {
        caption
    };
    format!("Read the image at {} and then: {caption}", path.display())
}
