//! Startup checks for the bridge configuration.
//!
//! Nothing here is fatal on its own; the binary logs every diagnostic and
//! keeps running so a misconfigured bridge is visible rather than silent.

use crate::schema::BridgeConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Environment variable the diagnostic is about.
    pub variable: &'static str,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, variable: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            variable,
            message: message.into(),
        });
    }
}

/// Chunks shorter than this make long answers arrive as dozens of bubbles.
const MIN_SENSIBLE_CHUNK_LEN: usize = 200;

/// Check a loaded configuration for problems worth reporting at startup.
#[must_use]
pub fn validate(config: &BridgeConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.allowed_numbers.is_empty() {
        result.push(
            Severity::Error,
            "ALLOWED_PHONE_NUMBERS",
            "not set, no messages will be processed",
        );
    }

    if !config.working_dir.is_dir() {
        result.push(
            Severity::Error,
            "CLAUDE_WORKING_DIR",
            format!("{} is not a directory", config.working_dir.display()),
        );
    }

    if config.max_chunk_len < MIN_SENSIBLE_CHUNK_LEN {
        result.push(
            Severity::Warning,
            "MAX_MESSAGE_CHUNK_SIZE",
            format!(
                "{} characters is very small, replies will be split into many messages",
                config.max_chunk_len
            ),
        );
    }

    if config.max_budget_usd.is_none() {
        result.push(
            Severity::Info,
            "CLAUDE_MAX_BUDGET_USD",
            "no per-call budget ceiling",
        );
    }

    if !config.transcription.model_path.exists() {
        result.push(
            Severity::Warning,
            "WHISPER_MODEL_PATH",
            format!(
                "{} not found, voice messages will fail to transcribe",
                config.transcription.model_path.display()
            ),
        );
    }

    result
}
