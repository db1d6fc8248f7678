//! Audio tag reading and thumbnail rendering.
//!
//! Tags are read with lofty. Embedded artwork is cropped to a square
//! thumbnail and written as JPEG. Unreadable files are not an error: callers
//! get an empty record and fall back to file-name derived values.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::ImageFormat;
use lofty::picture::PictureType;
use lofty::prelude::*;
use lofty::probe::Probe;
use thiserror::Error;

pub const THUMBNAIL_SIZE: u32 = 300;
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Default)]
pub struct AudioMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_seconds: f64,
    /// Raw bytes of the front cover, or the first picture found.
    pub artwork: Option<Vec<u8>>,
}

impl AudioMetadata {
    /// Tagged title, or the stem of `file_name`.
    pub fn title_or_stem(&self, file_name: &str) -> String {
        self.title.clone().unwrap_or_else(|| {
            Path::new(file_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_name.to_string())
        })
    }

    pub fn artist_or_default(&self) -> String {
        self.artist
            .clone()
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string())
    }

    pub fn album_or_default(&self) -> String {
        self.album
            .clone()
            .unwrap_or_else(|| UNKNOWN_ALBUM.to_string())
    }
}

/// Reads tags, duration and artwork from an audio file.
pub fn read_metadata(path: &Path) -> AudioMetadata {
    let tagged_file = match Probe::open(path).and_then(|probe| probe.read()) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read audio metadata");
            return AudioMetadata::default();
        }
    };

    let duration_seconds = round_duration(tagged_file.properties().duration().as_secs_f64());

    let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
        tracing::debug!(path = %path.display(), "Audio file has no tags");
        return AudioMetadata {
            duration_seconds,
            ..Default::default()
        };
    };

    let artwork = tag
        .pictures()
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| tag.pictures().first())
        .map(|p| p.data().to_vec());

    AudioMetadata {
        title: non_blank(tag.title().map(|s| s.into_owned())),
        artist: non_blank(tag.artist().map(|s| s.into_owned())),
        album: non_blank(tag.album().map(|s| s.into_owned())),
        duration_seconds,
        artwork,
    }
}

/// Decodes `artwork`, crops it to a square thumbnail and writes it to
/// `dest` as JPEG. An existing file at `dest` is never replaced.
pub fn write_thumbnail(artwork: &[u8], dest: &Path) -> Result<(), MetadataError> {
    let img = image::load_from_memory(artwork)?;
    let thumb = img
        .resize_to_fill(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3)
        .to_rgb8();

    let mut buffer = Cursor::new(Vec::new());
    thumb.write_to(&mut buffer, ImageFormat::Jpeg)?;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)?;
    file.write_all(buffer.get_ref())?;
    Ok(())
}

/// [`read_metadata`] on the blocking pool.
pub async fn inspect(path: PathBuf) -> AudioMetadata {
    let shown = path.display().to_string();
    match tokio::task::spawn_blocking(move || read_metadata(&path)).await {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!(path = %shown, error = %e, "Metadata task failed");
            AudioMetadata::default()
        }
    }
}

/// [`write_thumbnail`] on the blocking pool.
pub async fn render_thumbnail(artwork: Vec<u8>, dest: PathBuf) -> Result<(), MetadataError> {
    tokio::task::spawn_blocking(move || write_thumbnail(&artwork, &dest))
        .await
        .map_err(|e| MetadataError::Task(e.to_string()))?
}

fn round_duration(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
