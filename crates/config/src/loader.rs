use std::{path::PathBuf, str::FromStr, time::Duration};

use tracing::warn;

use crate::schema::{BridgeConfig, SidecarSettings, TranscriptionSettings};

/// Load the configuration from the process environment.
pub fn from_env() -> BridgeConfig {
    from_lookup(|name| std::env::var(name).ok())
}

/// Load the configuration through a custom lookup function.
///
/// This is the implementation used by [`from_env`]; the separate signature
/// makes it testable without mutating the process environment. Invalid or
/// non-positive numbers fall back to their defaults with a warning.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> BridgeConfig {
    let defaults = BridgeConfig::default();
    let get = |name: &str| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let allowed_numbers = get("ALLOWED_PHONE_NUMBERS")
        .map(|raw| relay_channels::gating::parse_allowlist(&raw))
        .unwrap_or_default();

    let working_dir = get("CLAUDE_WORKING_DIR")
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or(defaults.working_dir);

    let timeout = positive::<u64>(&get, "CLAUDE_TIMEOUT_MS")
        .map(Duration::from_millis)
        .unwrap_or(defaults.timeout);

    let max_budget_usd = match get("CLAUDE_MAX_BUDGET_USD") {
        None => defaults.max_budget_usd,
        Some(raw) => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => Some(v),
            _ => {
                warn!(value = %raw, "invalid CLAUDE_MAX_BUDGET_USD, using default");
                defaults.max_budget_usd
            },
        },
    };

    let max_chunk_len =
        positive::<usize>(&get, "MAX_MESSAGE_CHUNK_SIZE").unwrap_or(defaults.max_chunk_len);

    let busy_grace = positive::<u64>(&get, "BUSY_GRACE_MS")
        .map(Duration::from_millis)
        .unwrap_or(defaults.busy_grace);

    let stt_defaults = TranscriptionSettings::default();
    let transcription = TranscriptionSettings {
        ffmpeg_binary: get("FFMPEG_BINARY").unwrap_or(stt_defaults.ffmpeg_binary),
        whisper_binary: get("WHISPER_BINARY").unwrap_or(stt_defaults.whisper_binary),
        model_path: get("WHISPER_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(stt_defaults.model_path),
        language: get("WHISPER_LANGUAGE").unwrap_or(stt_defaults.language),
    };

    let sidecar = SidecarSettings {
        dir: get("RELAY_WHATSAPP_SIDECAR_DIR").map(PathBuf::from),
        port: positive::<u16>(&get, "RELAY_WHATSAPP_PORT")
            .unwrap_or(SidecarSettings::default().port),
        auth_dir: get("RELAY_WHATSAPP_AUTH_DIR").map(PathBuf::from),
    };

    BridgeConfig {
        allowed_numbers,
        working_dir,
        claude_binary: get("CLAUDE_BINARY").unwrap_or(defaults.claude_binary),
        timeout,
        max_budget_usd,
        max_chunk_len,
        busy_grace,
        transcription,
        sidecar,
    }
}

/// Parse a strictly positive integer variable, warning on bad input.
fn positive<T>(get: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    let raw = get(name)?;
    match raw.parse::<T>() {
        Ok(v) if v > T::default() => Some(v),
        _ => {
            warn!(variable = name, value = %raw, "invalid value, using default");
            None
        },
    }
}
