//! Files the agent leaves for delivery after a turn.
//!
//! Each conversation has its own subdirectory of the outbox root, so turns
//! running side by side never pick up each other's files. The agent is told
//! the directory for the current turn and writes any image or document it
//! wants to send there. After the turn the handler collects the sendable
//! files, delivers them, and removes them. Files with an unknown extension
//! stay where they are.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{Result, error::Context as _, mime};

/// A sendable file found in the outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxFile {
    pub path: PathBuf,
    pub file_name: String,
    pub mime_type: &'static str,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct Outbox {
    dir: PathBuf,
}

impl Outbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The outbox for one conversation, a subdirectory named after the chat.
    pub fn for_chat(&self, chat_id: &str) -> Self {
        let name: String = chat_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        Self::new(self.dir.join(name))
    }

    /// Create the directory so the agent can write into it.
    pub async fn prepare(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create outbox {}", self.dir.display()))
    }

    /// Sendable files currently in the outbox, ordered by name.
    ///
    /// A missing directory is an empty outbox.
    pub async fn collect(&self) -> Result<Vec<OutboxFile>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("read outbox {}", self.dir.display()));
            },
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("read outbox {}", self.dir.display()))?
        {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot stat outbox entry");
                    continue;
                },
            };

            let file_name = entry.file_name().to_string_lossy().into_owned();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            let Some(mime_type) = mime::from_extension(ext) else {
                info!(file = %file_name, "skipping outbox file of unknown type");
                continue;
            };

            files.push(OutboxFile {
                path,
                file_name,
                mime_type,
                size: metadata.len(),
            });
        }

        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(files)
    }

    /// Delete a file after a delivery attempt.
    pub async fn remove(&self, file: &OutboxFile) {
        if let Err(e) = tokio::fs::remove_file(&file.path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(file = %file.file_name, error = %e, "failed to remove outbox file");
        }
    }
}
