//! Bridge-local slash commands. These never reach the agent.

use std::{fmt::Write as _, path::Path, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
    Status,
    Reload,
    Help,
}

impl Command {
    /// Match a message body. Only an exact command (ignoring case and
    /// surrounding whitespace) counts; `/reset now` is a normal prompt.
    pub fn parse(body: &str) -> Option<Self> {
        match body.trim().to_lowercase().as_str() {
            "/reset" => Some(Self::Reset),
            "/status" => Some(Self::Status),
            "/reload" => Some(Self::Reload),
            "/help" => Some(Self::Help),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Status => "status",
            Self::Reload => "reload",
            Self::Help => "help",
        }
    }
}

pub const RESET_REPLY: &str = "Session reset. Next message starts a fresh conversation.";
pub const RELOAD_REPLY: &str = "Reloading... back in a few seconds.";

pub fn help_text() -> String {
    [
        "*Commands*",
        "/reset - Start a fresh Claude conversation",
        "/status - Show current session info",
        "/reload - Restart the bridge",
        "/help - Show this message",
        "",
        "Any other message is sent to Claude Code.",
    ]
    .join("\n")
}

/// What `/status` reports about one conversation.
#[derive(Debug, Clone)]
pub struct StatusReport<'a> {
    pub session: Option<&'a str>,
    pub working_dir: &'a Path,
    pub max_budget_usd: Option<f64>,
    pub timeout: Duration,
}

impl StatusReport<'_> {
    pub fn render(&self) -> String {
        let mut out = String::from("*Status*\n");
        let _ = writeln!(
            out,
            "Session active: {}",
            if self.session.is_some() { "yes" } else { "no" }
        );
        if let Some(token) = self.session {
            let _ = writeln!(out, "Session ID: {token}");
        }
        let _ = writeln!(out, "Working dir: {}", self.working_dir.display());
        match self.max_budget_usd {
            Some(budget) => {
                let _ = writeln!(out, "Budget: ${budget}/call");
            },
            None => out.push_str("Budget: unlimited\n"),
        }
        let _ = write!(out, "Timeout: {}s", self.timeout.as_secs_f64());
        out
    }
}
