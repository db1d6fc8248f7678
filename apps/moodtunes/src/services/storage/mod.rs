//! Storage of uploaded media files under the media root.
//!
//! Uploaded audio lands directly in the media root, thumbnails in the
//! thumbnail root. Deletions are best-effort: the catalog is authoritative
//! and a file that cannot be removed is only logged.

mod naming;

pub use naming::{extension_of, sanitize_filename};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::services::resolver::ResolverSettings;

pub struct MediaStorage {
    media_root: PathBuf,
    thumbnail_root: PathBuf,
}

impl MediaStorage {
    pub fn new(media_root: PathBuf, thumbnail_root: PathBuf) -> Self {
        Self {
            media_root,
            thumbnail_root,
        }
    }

    pub fn from_settings(settings: &ResolverSettings) -> Self {
        Self::new(settings.media_root.clone(), settings.thumbnail_root.clone())
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    pub fn thumbnail_root(&self) -> &Path {
        &self.thumbnail_root
    }

    /// Creates the thumbnail directory if it is missing.
    pub async fn ensure_thumbnail_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.thumbnail_root).await?;
        Ok(())
    }

    /// Writes an uploaded audio file into the media root under its
    /// sanitized name. An existing file with that name is a conflict.
    pub async fn store_upload(&self, original_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let name = sanitize_filename(original_name);
        if name.trim_matches('.').is_empty() {
            return Err(AppError::BadRequest("Invalid file name".to_string()));
        }

        let path = self.media_root.join(&name);
        write_new(&path, bytes).await.map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => {
                AppError::Conflict(format!("A file named {} already exists", name))
            }
            _ => AppError::Io(e),
        })?;

        tracing::info!(path = %path.display(), size = bytes.len(), "Stored upload");
        Ok(path)
    }

    /// Writes a playlist cover as `playlist_<uuid>.<ext>` in the thumbnail root.
    pub async fn store_playlist_thumbnail(&self, ext: &str, bytes: &[u8]) -> Result<PathBuf> {
        self.ensure_thumbnail_root().await?;

        let ext = sanitize_filename(ext.trim_start_matches('.'));
        let name = if ext.is_empty() {
            format!("playlist_{}", uuid::Uuid::new_v4())
        } else {
            format!("playlist_{}.{}", uuid::Uuid::new_v4(), ext)
        };

        let path = self.thumbnail_root.join(name);
        write_new(&path, bytes).await?;

        tracing::info!(path = %path.display(), "Stored playlist thumbnail");
        Ok(path)
    }

    /// Fresh thumbnail location for an audio file:
    /// `<thumbnail root>/<stem>_<uuid>.jpg`. Files sharing a stem in
    /// different folders never share a thumbnail.
    pub fn thumbnail_path_for(&self, audio_path: &Path) -> PathBuf {
        let stem = audio_path
            .file_stem()
            .map(|s| sanitize_filename(&s.to_string_lossy()))
            .filter(|s| !s.trim_matches('.').is_empty())
            .unwrap_or_else(|| "thumbnail".to_string());
        self.thumbnail_root
            .join(format!("{}_{}.jpg", stem, uuid::Uuid::new_v4().simple()))
    }
}

async fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

/// Deletes `path`, treating an already-missing file as success. Other
/// failures are logged and swallowed.
pub async fn remove_best_effort(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "File already gone");
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}
