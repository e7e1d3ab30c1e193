//! Content-addressed photo storage on the local filesystem.
//!
//! Files are named `<sha256>.<ext>` under the image root and served back
//! from `/images/`.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("image file is empty")]
    Empty,
    #[error("image too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
    #[error("unsupported image format '{0}'; expected png, jpg, jpeg, webp, or gif")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub file_name: String,
    pub url: String,
    /// `false` when identical content was already on disk.
    pub newly_written: bool,
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    public_base_url: String,
    max_bytes: usize,
}

impl ImageStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_owned(),
            max_bytes,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Create the image root if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Check size and extension, returning the normalized (lowercase) extension.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Empty`], [`StorageError::TooLarge`] or
    /// [`StorageError::UnsupportedFormat`].
    pub fn validate(&self, file_name: Option<&str>, data: &[u8]) -> Result<String, StorageError> {
        if data.is_empty() {
            return Err(StorageError::Empty);
        }
        if data.len() > self.max_bytes {
            return Err(StorageError::TooLarge {
                size: data.len(),
                max: self.max_bytes,
            });
        }

        let ext = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if SUPPORTED_FORMATS.contains(&ext.as_str()) {
            Ok(ext)
        } else {
            Err(StorageError::UnsupportedFormat(ext))
        }
    }

    /// Validate and persist an upload. Identical content maps to the same file,
    /// so re-uploads are not written twice.
    ///
    /// # Errors
    ///
    /// Returns any validation error from [`ImageStore::validate`] or
    /// [`StorageError::Io`] if the write fails.
    pub async fn store(
        &self,
        file_name: Option<&str>,
        data: &[u8],
    ) -> Result<StoredImage, StorageError> {
        let ext = self.validate(file_name, data)?;
        let hash = format!("{:x}", Sha256::digest(data));
        let stored_name = format!("{hash}.{ext}");
        let path = self.root.join(&stored_name);

        let newly_written = if tokio::fs::try_exists(&path).await? {
            tracing::debug!(file = %stored_name, "image already stored");
            false
        } else {
            self.ensure_root().await?;
            tokio::fs::write(&path, data).await?;
            tracing::info!(file = %stored_name, bytes = data.len(), "image stored");
            true
        };

        Ok(StoredImage {
            url: format!("{}/images/{stored_name}", self.public_base_url),
            file_name: stored_name,
            newly_written,
        })
    }

    /// Remove a file written by [`ImageStore::store`] whose record was never
    /// saved. Files that predate the upload may belong to other machines and
    /// are kept.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the file exists but cannot be removed.
    pub async fn discard(&self, image: &StoredImage) -> Result<(), StorageError> {
        if !image.newly_written {
            return Ok(());
        }
        match tokio::fs::remove_file(self.root.join(&image.file_name)).await {
            Ok(()) => {
                tracing::debug!(file = %image.file_name, "discarded unsaved image");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> ImageStore {
        ImageStore::new(dir, "http://localhost:3001/", 16)
    }

    #[test]
    fn validate_rejects_empty_and_oversized() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        assert!(matches!(
            store.validate(Some("a.png"), &[]),
            Err(StorageError::Empty)
        ));
        assert!(matches!(
            store.validate(Some("a.png"), &[0_u8; 17]),
            Err(StorageError::TooLarge { size: 17, max: 16 })
        ));
    }

    #[test]
    fn validate_normalizes_extension_case() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        assert_eq!(store.validate(Some("Photo.JPG"), b"x").expect("ok"), "jpg");
    }

    #[test]
    fn validate_rejects_unknown_or_missing_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        assert!(matches!(
            store.validate(Some("notes.txt"), b"x"),
            Err(StorageError::UnsupportedFormat(ref e)) if e == "txt"
        ));
        assert!(matches!(
            store.validate(None, b"x"),
            Err(StorageError::UnsupportedFormat(ref e)) if e.is_empty()
        ));
    }

    #[tokio::test]
    async fn store_writes_content_addressed_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir.path().join("nested"));

        let stored = store.store(Some("snack.png"), b"png-bytes").await.expect("store");
        let expected_hash = format!("{:x}", Sha256::digest(b"png-bytes"));

        assert_eq!(stored.file_name, format!("{expected_hash}.png"));
        assert_eq!(
            stored.url,
            format!("http://localhost:3001/images/{expected_hash}.png")
        );
        let on_disk = tokio::fs::read(dir.path().join("nested").join(&stored.file_name))
            .await
            .expect("read back");
        assert_eq!(on_disk, b"png-bytes");
    }

    #[tokio::test]
    async fn identical_uploads_share_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        let first = store.store(Some("a.webp"), b"same").await.expect("first");
        let second = store.store(Some("b.webp"), b"same").await.expect("second");
        assert_eq!(first.file_name, second.file_name);
        assert_eq!(first.url, second.url);
        assert!(first.newly_written);
        assert!(!second.newly_written);
    }

    #[tokio::test]
    async fn discard_removes_a_fresh_upload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        let stored = store.store(Some("a.png"), b"fresh").await.expect("store");
        store.discard(&stored).await.expect("discard");
        assert!(!dir.path().join(&stored.file_name).exists());
    }

    #[tokio::test]
    async fn discard_keeps_content_that_was_already_stored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        let existing = store.store(Some("a.png"), b"shared").await.expect("first");
        let reused = store.store(Some("b.png"), b"shared").await.expect("second");
        store.discard(&reused).await.expect("discard");
        assert!(dir.path().join(&existing.file_name).exists());
    }
}
