//! Helpers for driving local command line tools.

use std::{
    path::{Path, PathBuf},
    process::{Output, Stdio},
    time::Duration,
};

use {tokio::process::Command, tracing::debug};

use crate::{Error, Result};

/// Find a binary given either a path or a bare name to look up in PATH.
pub fn find_binary(name_or_path: &str) -> Option<PathBuf> {
    let path = expand_tilde(name_or_path);
    if path.components().count() > 1 {
        return path.is_file().then_some(path);
    }
    which::which(name_or_path).ok()
}

/// Expand `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}

/// File extension to give the raw audio so ffmpeg's probe has a hint.
pub fn audio_extension(mime_type: &str) -> &'static str {
    let base = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match base.as_str() {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => "m4a",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/webm" => "webm",
        _ => "ogg",
    }
}

/// Write audio into `dir` and return its path.
pub fn write_temp_audio(dir: &Path, audio: &[u8], mime_type: &str) -> Result<PathBuf> {
    let path = dir.join(format!("input.{}", audio_extension(mime_type)));
    std::fs::write(&path, audio)?;
    Ok(path)
}

/// Run a tool to completion, killing it after `limit`.
pub async fn run(tool: &str, mut cmd: Command, limit: Duration) -> Result<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn()?;
    let output = tokio::time::timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| Error::Timeout {
            tool: tool.to_string(),
            after: limit,
        })??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::tool_failed(tool, stderr.trim()));
    }

    debug!(tool, stdout_len = output.stdout.len(), "tool finished");
    Ok(output)
}
