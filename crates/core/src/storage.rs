// crates/core/src/storage.rs
//! Media storage collaborator: persists uploaded bytes, one directory per job.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::error::StorageError;
use crate::job::JobId;

/// Extension used when the uploaded filename has none.
pub const DEFAULT_EXTENSION: &str = "mp4";

/// Stem of the single media file stored per job.
const MEDIA_STEM: &str = "video";

/// Opaque handle to persisted media, returned once the bytes are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference(PathBuf);

impl MediaReference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for MediaReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Where uploaded media lives between submission and analysis.
///
/// Implementations are responsible for their own concurrency safety.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Stream `reader` into storage for `job_id`.
    async fn store(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        job_id: JobId,
        original_filename: &str,
    ) -> Result<MediaReference, StorageError>;

    /// Find the media previously stored for `job_id`.
    async fn resolve_reference(&self, job_id: JobId) -> Result<MediaReference, StorageError>;

    /// Remove everything persisted for `job_id`. Missing data is not an error.
    async fn cleanup(&self, job_id: JobId) -> Result<(), StorageError>;
}

/// Filesystem storage rooted at an upload directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create storage rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn job_dir(&self, job_id: JobId) -> PathBuf {
        self.root.join(job_id.to_string())
    }

    async fn write_media(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        job_dir: &Path,
        path: &Path,
    ) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(job_dir)
            .await
            .map_err(|e| StorageError::io(job_dir, e))?;

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        tokio::io::copy(reader, &mut file)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        file.flush().await.map_err(|e| StorageError::io(path, e))?;
        Ok(())
    }
}

#[async_trait]
impl MediaStorage for LocalStorage {
    async fn store(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        job_id: JobId,
        original_filename: &str,
    ) -> Result<MediaReference, StorageError> {
        let job_dir = self.job_dir(job_id);
        let path = job_dir.join(format!("{MEDIA_STEM}.{}", media_extension(original_filename)));

        if let Err(e) = self.write_media(reader, &job_dir, &path).await {
            // Never leave a truncated file behind for a later resolve_reference.
            if let Err(cleanup_err) = tokio::fs::remove_dir_all(&job_dir).await {
                tracing::debug!(job_id = %job_id, error = %cleanup_err, "No partial upload to remove");
            }
            return Err(e);
        }

        tracing::debug!(job_id = %job_id, path = %path.display(), "Stored uploaded media");
        Ok(MediaReference::new(path))
    }

    async fn resolve_reference(&self, job_id: JobId) -> Result<MediaReference, StorageError> {
        let job_dir = self.job_dir(job_id);
        let mut entries = match tokio::fs::read_dir(&job_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(job_id));
            }
            Err(e) => return Err(StorageError::io(&job_dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&job_dir, e))?
        {
            let path = entry.path();
            if path.file_stem().and_then(|s| s.to_str()) == Some(MEDIA_STEM) {
                return Ok(MediaReference::new(path));
            }
        }
        Err(StorageError::NotFound(job_id))
    }

    async fn cleanup(&self, job_id: JobId) -> Result<(), StorageError> {
        let job_dir = self.job_dir(job_id);
        match tokio::fs::remove_dir_all(&job_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(job_dir, e)),
        }
    }
}

/// Extension for the stored file: the upload's own extension when it is a
/// plain alphanumeric token, otherwise [`DEFAULT_EXTENSION`].
pub fn media_extension(original_filename: &str) -> String {
    Path::new(original_filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
