use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    tracing::{debug, warn},
};

use crate::{Error, Result, error::Context as _, mime};

/// Somewhere to put inbound media so the agent can open it by path.
#[async_trait]
pub trait MediaStaging: Send + Sync {
    /// Persist `data` and return the file path.
    async fn save(&self, data: &[u8], mime_type: &str) -> Result<PathBuf>;

    /// Remove a previously saved file. Failures are logged, not returned.
    async fn cleanup(&self, path: &Path);
}

/// Stages images inside the agent's working directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_name(mime_type: &str) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "img-{}-{}{}",
            relay_common::types::now_ms(),
            &id[..8],
            mime::image_extension(mime_type)
        )
    }
}

#[async_trait]
impl MediaStaging for ImageStore {
    async fn save(&self, data: &[u8], mime_type: &str) -> Result<PathBuf> {
        if data.is_empty() {
            return Err(Error::invalid_input("image payload is empty"));
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create {}", self.dir.display()))?;

        let path = self.dir.join(Self::file_name(mime_type));
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        debug!(path = %path.display(), bytes = data.len(), "staged image");
        Ok(path)
    }

    async fn cleanup(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), error = %e, "failed to remove staged image");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_creates_dir_and_names_file() {
        let root = tempfile::tempdir().unwrap();
        let store = ImageStore::new(root.path().join(".wa-images"));

        let path = store.save(b"png bytes", "image/png").await.unwrap();
        assert_eq!(path.parent().unwrap(), root.path().join(".wa-images"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("img-"), "{name}");
        assert!(name.ends_with(".png"), "{name}");
        // img-<millis>-<8 hex>.png
        let stem = name.trim_end_matches(".png");
        let suffix = stem.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert_eq!(std::fs::read(&path).unwrap(), b"png bytes");
    }

    #[tokio::test]
    async fn names_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let store = ImageStore::new(root.path());
        let a = store.save(b"a", "image/jpeg").await.unwrap();
        let b = store.save(b"b", "image/jpeg").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn cleanup_removes_and_tolerates_missing() {
        let root = tempfile::tempdir().unwrap();
        let store = ImageStore::new(root.path());
        let path = store.save(b"x", "image/webp").await.unwrap();
        store.cleanup(&path).await;
        assert!(!path.exists());
        store.cleanup(&path).await;
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let store = ImageStore::new(root.path());
        assert!(store.save(b"", "image/png").await.is_err());
    }
}
