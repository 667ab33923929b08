//! whisper.cpp transcription through its command line tool.
//!
//! Voice notes arrive as Opus in an Ogg container. whisper-cli only reads
//! 16 kHz mono WAV, so every request is two steps: ffmpeg converts into a
//! scratch directory, then whisper-cli prints the transcript to stdout.
//!
//! Installation:
//! - macOS: `brew install whisper-cpp ffmpeg`
//! - From source: https://github.com/ggerganov/whisper.cpp
//!
//! Models can be downloaded from:
//! https://huggingface.co/ggerganov/whisper.cpp

use std::{path::PathBuf, time::Duration};

use {async_trait::async_trait, tokio::process::Command, tracing::debug};

use crate::{Error, Result, Transcriber, cli_utils};

/// Limit for each external step.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct WhisperCli {
    ffmpeg_binary: String,
    whisper_binary: String,
    model_path: String,
    language: String,
    step_timeout: Duration,
}

impl WhisperCli {
    #[must_use]
    pub fn new(
        ffmpeg_binary: impl Into<String>,
        whisper_binary: impl Into<String>,
        model_path: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            ffmpeg_binary: ffmpeg_binary.into(),
            whisper_binary: whisper_binary.into(),
            model_path: model_path.into(),
            language: language.into(),
            step_timeout: STEP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    /// Whether both tools and the model are present.
    pub fn is_configured(&self) -> bool {
        cli_utils::find_binary(&self.ffmpeg_binary).is_some()
            && cli_utils::find_binary(&self.whisper_binary).is_some()
            && cli_utils::expand_tilde(&self.model_path).exists()
    }

    fn binary(name: &str) -> Result<PathBuf> {
        cli_utils::find_binary(name).ok_or_else(|| Error::BinaryNotFound {
            tool: name.to_string(),
        })
    }

    fn model(&self) -> Result<PathBuf> {
        let path = cli_utils::expand_tilde(&self.model_path);
        if path.exists() {
            Ok(path)
        } else {
            Err(Error::ModelNotFound(path.display().to_string()))
        }
    }
}

#[async_trait]
impl Transcriber for WhisperCli {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String> {
        let ffmpeg = Self::binary(&self.ffmpeg_binary)?;
        let whisper = Self::binary(&self.whisper_binary)?;
        let model = self.model()?;

        // Removed with everything in it when dropped, on every exit path.
        let scratch = tempfile::Builder::new().prefix("relay-audio-").tempdir()?;
        let input = cli_utils::write_temp_audio(scratch.path(), audio, mime_type)?;
        let wav = scratch.path().join("input.wav");

        let mut convert = Command::new(&ffmpeg);
        convert
            .arg("-i")
            .arg(&input)
            .args(["-ar", "16000", "-ac", "1", "-f", "wav", "-y"])
            .arg(&wav);
        cli_utils::run(&self.ffmpeg_binary, convert, self.step_timeout).await?;

        let mut recognize = Command::new(&whisper);
        recognize
            .arg("--model")
            .arg(&model)
            .args(["--no-prints", "--no-timestamps", "--language"])
            .arg(&self.language)
            .arg("-f")
            .arg(&wav);
        let output = cli_utils::run(&self.whisper_binary, recognize, self.step_timeout).await?;

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(Error::EmptyTranscript);
        }
        debug!(bytes = audio.len(), chars = text.chars().count(), "transcribed audio");
        Ok(text)
    }
}
