//! Bulk import of an existing music folder.
//!
//! The media root is expected to hold one directory per emotion
//! (`<root>/Joy/...`, `<root>/Sad/...`). Every audio file below those
//! directories that is not cataloged yet is inserted with the directory
//! name as its emotion.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Serialize;
use tokio::sync::Mutex;
use walkdir::WalkDir;

use crate::config::MediaConfig;
use crate::db::models::NewSong;
use crate::db::CatalogStore;
use crate::error::{AppError, Result};
use crate::services::metadata;
use crate::services::storage::MediaStorage;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub scanned: usize,
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug)]
struct Candidate {
    emotion: String,
    path: PathBuf,
}

/// Imports every uncataloged audio file found under the emotion folders.
pub async fn import_library(
    db: &Mutex<Connection>,
    storage: &MediaStorage,
    media: &MediaConfig,
) -> Result<ImportSummary> {
    let root = storage.media_root().to_path_buf();
    let thumbnail_root = storage.thumbnail_root().to_path_buf();
    let media = media.clone();

    let candidates =
        tokio::task::spawn_blocking(move || discover(&root, &thumbnail_root, &media))
            .await
            .map_err(|e| AppError::Internal(format!("Library scan failed: {}", e)))??;

    tracing::info!(count = candidates.len(), "Importing library");

    let mut summary = ImportSummary::default();
    for candidate in candidates {
        summary.scanned += 1;

        let file_name = candidate
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let meta = metadata::inspect(candidate.path.clone()).await;
        let title = meta.title_or_stem(&file_name);

        {
            let conn = db.lock().await;
            if conn.find_song_by_title(&title)?.is_some() {
                tracing::debug!(title = %title, "Already cataloged, skipping");
                summary.skipped += 1;
                continue;
            }
        }

        let thumbnail_path = match meta.artwork.clone() {
            Some(artwork) => {
                let dest = storage.thumbnail_path_for(&candidate.path);
                match metadata::render_thumbnail(artwork, dest.clone()).await {
                    Ok(()) => Some(dest.to_string_lossy().into_owned()),
                    Err(e) => {
                        tracing::warn!(path = %candidate.path.display(), error = %e, "Failed to render thumbnail");
                        None
                    }
                }
            }
            None => None,
        };

        let song = NewSong {
            title,
            artist: meta.artist_or_default(),
            album: meta.album_or_default(),
            duration_seconds: meta.duration_seconds,
            emotion: candidate.emotion,
            file_path: candidate.path.to_string_lossy().into_owned(),
            thumbnail_path,
        };

        let conn = db.lock().await;
        match conn.insert_song(&song) {
            Ok(inserted) => {
                tracing::info!(id = inserted.id, title = %inserted.title, emotion = %inserted.emotion, "Imported song");
                summary.imported += 1;
            }
            Err(e) => {
                tracing::error!(path = %song.file_path, error = %e, "Failed to import song");
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        scanned = summary.scanned,
        imported = summary.imported,
        skipped = summary.skipped,
        failed = summary.failed,
        "Library import finished"
    );
    Ok(summary)
}

fn discover(root: &Path, thumbnail_root: &Path, media: &MediaConfig) -> Result<Vec<Candidate>> {
    let mut emotion_dirs: Vec<(String, PathBuf)> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if name.starts_with('.') || same_dir(&path, thumbnail_root) {
                None
            } else {
                Some((name, path))
            }
        })
        .collect();
    emotion_dirs.sort();

    let mut candidates = Vec::new();
    for (emotion, dir) in emotion_dirs {
        for entry in WalkDir::new(&dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let accepted = entry
                .path()
                .extension()
                .map(|ext| media.is_audio_extension(&ext.to_string_lossy()))
                .unwrap_or(false);
            if accepted {
                candidates.push(Candidate {
                    emotion: emotion.clone(),
                    path: entry.into_path(),
                });
            }
        }
    }

    Ok(candidates)
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
