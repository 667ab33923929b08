//! Speech-to-text for inbound voice notes.
//!
//! The bridge only needs one direction: audio in, plain text out. The
//! [`Transcriber`] trait is what the conversation handler calls;
//! [`WhisperCli`] implements it with a local ffmpeg + whisper.cpp pipeline.

mod cli_utils;
pub mod error;
pub mod whisper_cli;

use async_trait::async_trait;

pub use {
    error::{Error, Result},
    whisper_cli::WhisperCli,
};

/// Speech-to-text capability.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe raw audio bytes. `mime_type` is the container reported by
    /// the transport (e.g. `audio/ogg; codecs=opus`).
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String>;
}
