use std::{path::PathBuf, time::Duration};

/// Default sidecar WebSocket port.
pub const DEFAULT_SIDECAR_PORT: u16 = 9876;

/// Default AI invocation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(120_000);

/// Default per-call spending ceiling passed to the AI CLI.
pub const DEFAULT_MAX_BUDGET_USD: f64 = 1.0;

/// WhatsApp's practical message size for a single bubble.
pub const DEFAULT_MAX_CHUNK_LEN: usize = 4096;

/// Echo-suppression window after a reply.
pub const DEFAULT_BUSY_GRACE: Duration = Duration::from_millis(2_000);

/// Top-level bridge configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Phone numbers allowed to talk to the bridge.
    pub allowed_numbers: Vec<String>,
    /// Working directory for the AI process.
    pub working_dir: PathBuf,
    /// AI executable name or path.
    pub claude_binary: String,
    /// Hard wall-clock limit for one AI invocation.
    pub timeout: Duration,
    /// Per-invocation budget ceiling in USD. `None` omits the flag.
    pub max_budget_usd: Option<f64>,
    /// Maximum characters per outbound text message.
    pub max_chunk_len: usize,
    /// How long a chat stays busy after a turn completes.
    pub busy_grace: Duration,
    pub transcription: TranscriptionSettings,
    pub sidecar: SidecarSettings,
}

impl BridgeConfig {
    /// Where inbound images are staged for the AI to read.
    #[must_use]
    pub fn image_dir(&self) -> PathBuf {
        self.working_dir.join(".wa-images")
    }

    /// Where the AI leaves files to be sent back to the chat.
    #[must_use]
    pub fn outbox_dir(&self) -> PathBuf {
        self.working_dir.join(".wa-media-out")
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            allowed_numbers: Vec::new(),
            working_dir: PathBuf::from("."),
            claude_binary: "claude".into(),
            timeout: DEFAULT_TIMEOUT,
            max_budget_usd: Some(DEFAULT_MAX_BUDGET_USD),
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
            busy_grace: DEFAULT_BUSY_GRACE,
            transcription: TranscriptionSettings::default(),
            sidecar: SidecarSettings::default(),
        }
    }
}

/// Local speech-to-text toolchain (ffmpeg + whisper.cpp).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionSettings {
    pub ffmpeg_binary: String,
    pub whisper_binary: String,
    pub model_path: PathBuf,
    pub language: String,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            ffmpeg_binary: "ffmpeg".into(),
            whisper_binary: "whisper-cli".into(),
            model_path: PathBuf::from("models/ggml-base.bin"),
            language: "en".into(),
        }
    }
}

/// WhatsApp sidecar process settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarSettings {
    /// Explicit sidecar checkout; discovered when unset.
    pub dir: Option<PathBuf>,
    pub port: u16,
    pub auth_dir: Option<PathBuf>,
}

impl Default for SidecarSettings {
    fn default() -> Self {
        Self {
            dir: None,
            port: DEFAULT_SIDECAR_PORT,
            auth_dir: None,
        }
    }
}
