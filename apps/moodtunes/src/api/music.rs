//! Song catalog endpoints: listing, lookup, search, upload and deletion.

use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};

use crate::config::{Config, MediaConfig};
use crate::db::models::{NewSong, Song};
use crate::db::CatalogStore;
use crate::error::{AppError, Result};
use crate::response::{Envelope, JsonResponse};
use crate::services::library::import_library;
use crate::services::metadata;
use crate::services::resolver::is_http_url;
use crate::services::storage::{extension_of, remove_best_effort};
use crate::AppState;

/// Emotion stored when none was supplied and classification is unavailable.
pub const UNKNOWN_EMOTION: &str = "Unknown";

/// Multipart framing overhead allowed on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListSongsQuery {
    pub emotion: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub keyword: Option<String>,
}

/// What a client needs to start playback.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackView {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub file_url: String,
    pub thumbnail_url: String,
    pub default_thumbnail: bool,
}

// =============================================================================
// Router
// =============================================================================

pub fn router(config: &Config) -> Router<AppState> {
    let upload_limit = config.media.max_upload_bytes() + MULTIPART_OVERHEAD;

    Router::new()
        .route(
            "/",
            get(list_songs)
                .post(upload_song)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/emotions", get(list_emotions))
        .route("/search", get(search_songs))
        .route("/import", post(import_songs))
        .route("/play/:title", get(play_song))
        .route("/:id", get(get_song).delete(delete_song))
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/music?emotion=<tag>
pub async fn list_songs(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ListSongsQuery>, AppError>,
) -> Result<JsonResponse> {
    let db = state.db.lock().await;
    let songs = match query.emotion.as_deref().map(str::trim) {
        Some(emotion) if !emotion.is_empty() => db.find_songs_by_emotion(emotion)?,
        _ => db.list_songs()?,
    };
    drop(db);

    let resolved = state.resolver.resolve_songs(&songs).await;
    let count = resolved.len();
    Envelope::data(resolved)
        .with_count(count)
        .render(&state.resolver)
}

/// GET /api/music/:id
pub async fn get_song(
    State(state): State<AppState>,
    WithRejection(Path(song_id), _): WithRejection<Path<i64>, AppError>,
) -> Result<JsonResponse> {
    let song = state.db.lock().await.find_song(song_id)?;

    let resolved = state.resolver.resolve_song(&song).await;
    Envelope::data(resolved).render(&state.resolver)
}

/// GET /api/music/play/:title
pub async fn play_song(
    State(state): State<AppState>,
    WithRejection(Path(title), _): WithRejection<Path<String>, AppError>,
) -> Result<JsonResponse> {
    let song = state
        .db
        .lock()
        .await
        .find_song_by_title(&title)?
        .ok_or_else(|| AppError::NotFound("Song not found".to_string()))?;

    let resolved = state.resolver.resolve_song(&song).await;
    let view = PlaybackView {
        id: resolved.song.id,
        title: resolved.song.title,
        artist: resolved.song.artist,
        file_url: resolved.file_url,
        thumbnail_url: resolved.thumbnail_url,
        default_thumbnail: resolved.default_thumbnail,
    };
    Envelope::data(view).render(&state.resolver)
}

/// GET /api/music/search?keyword=<kw>
pub async fn search_songs(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<SearchQuery>, AppError>,
) -> Result<JsonResponse> {
    let keyword = query
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::BadRequest("Search keyword is required".to_string()))?;

    let songs = state.db.lock().await.search_songs(keyword)?;

    let resolved = state.resolver.resolve_songs(&songs).await;
    let count = resolved.len();
    Envelope::data(resolved)
        .with_count(count)
        .render(&state.resolver)
}

/// GET /api/music/emotions
pub async fn list_emotions(State(state): State<AppState>) -> Result<JsonResponse> {
    let emotions = state.db.lock().await.list_emotions()?;

    let count = emotions.len();
    Envelope::data(emotions)
        .with_count(count)
        .render(&state.resolver)
}

/// POST /api/music
///
/// Multipart upload with an `audioFile` part and an optional `emotion` text
/// part. The file is stored first; if cataloging fails for any reason the
/// stored file is removed again.
pub async fn upload_song(
    State(state): State<AppState>,
    WithRejection(mut multipart, _): WithRejection<Multipart, AppError>,
) -> Result<JsonResponse> {
    let media = &state.config.media;
    let mut audio: Option<(String, Vec<u8>)> = None;
    let mut emotion: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("audioFile") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.trim().is_empty())
                    .ok_or_else(|| AppError::BadRequest("audioFile must be a file".to_string()))?;

                if !is_accepted_audio(&file_name, field.content_type(), media) {
                    return Err(AppError::BadRequest(format!(
                        "Only {} files are allowed",
                        media.audio_extensions.join(", ").to_uppercase()
                    )));
                }

                let bytes = field.bytes().await.map_err(multipart_error)?;
                if bytes.len() > media.max_upload_bytes() {
                    return Err(AppError::PayloadTooLarge(format!(
                        "Audio files are limited to {} MB",
                        media.max_upload_mb
                    )));
                }
                audio = Some((file_name, bytes.to_vec()));
            }
            Some("emotion") => {
                let text = field.text().await.map_err(multipart_error)?;
                emotion = Some(text.trim().to_string()).filter(|e| !e.is_empty());
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unexpected multipart field");
            }
        }
    }

    let (file_name, bytes) =
        audio.ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;

    let path = state.storage.store_upload(&file_name, &bytes).await?;

    let song = match register_upload(&state, &path, &file_name, emotion).await {
        Ok(song) => song,
        Err(e) => {
            remove_best_effort(&path).await;
            return Err(e);
        }
    };

    tracing::info!(
        song_id = song.id,
        title = %song.title,
        emotion = %song.emotion,
        "Song uploaded"
    );

    let resolved = state.resolver.resolve_song(&song).await;
    Envelope::data(resolved)
        .with_message("Song uploaded successfully")
        .render_with_status(StatusCode::CREATED, &state.resolver)
}

/// Reads tags, rejects duplicate titles, labels and catalogs a stored upload.
async fn register_upload(
    state: &AppState,
    path: &FsPath,
    original_name: &str,
    emotion: Option<String>,
) -> Result<Song> {
    let meta = metadata::inspect(path.to_path_buf()).await;
    let title = meta.title_or_stem(original_name);

    if state.db.lock().await.find_song_by_title(&title)?.is_some() {
        return Err(AppError::Conflict(
            "Song with this title already exists".to_string(),
        ));
    }

    let emotion = match emotion {
        Some(emotion) => emotion,
        None => classify(state, path).await,
    };

    let thumbnail_path = match meta.artwork.clone() {
        Some(artwork) => render_artwork(state, path, artwork).await,
        None => None,
    };

    let new_song = NewSong {
        title,
        artist: meta.artist_or_default(),
        album: meta.album_or_default(),
        duration_seconds: meta.duration_seconds,
        emotion,
        file_path: path.to_string_lossy().into_owned(),
        thumbnail_path: thumbnail_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned()),
    };

    let inserted = state.db.lock().await.insert_song(&new_song);
    match inserted {
        Ok(song) => Ok(song),
        Err(e) => {
            if let Some(thumbnail) = &thumbnail_path {
                remove_best_effort(thumbnail).await;
            }
            Err(e.into())
        }
    }
}

async fn classify(state: &AppState, path: &FsPath) -> String {
    let Some(classifier) = &state.classifier else {
        return UNKNOWN_EMOTION.to_string();
    };

    match classifier.classify(path).await {
        Ok(emotion) => emotion,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Emotion classification failed");
            UNKNOWN_EMOTION.to_string()
        }
    }
}

async fn render_artwork(state: &AppState, path: &FsPath, artwork: Vec<u8>) -> Option<PathBuf> {
    let dest = state.storage.thumbnail_path_for(path);
    match metadata::render_thumbnail(artwork, dest.clone()).await {
        Ok(()) => Some(dest),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to render thumbnail");
            None
        }
    }
}

/// DELETE /api/music/:id
///
/// The catalog row is removed first; file cleanup afterwards is best-effort.
pub async fn delete_song(
    State(state): State<AppState>,
    WithRejection(Path(song_id), _): WithRejection<Path<i64>, AppError>,
) -> Result<JsonResponse> {
    let song = state.db.lock().await.delete_song(song_id)?;

    let audio = state.resolver.rebase(FsPath::new(&song.file_path));
    remove_best_effort(&audio).await;

    if let Some(thumbnail) = song.thumbnail_path.as_deref() {
        if is_removable_thumbnail(&state, thumbnail) {
            remove_best_effort(&state.resolver.rebase(FsPath::new(thumbnail))).await;
        }
    }

    tracing::info!(song_id = song.id, title = %song.title, "Song deleted");

    let resolved = state.resolver.resolve_song(&song).await;
    Envelope::data(resolved)
        .with_message("Song and associated files deleted successfully")
        .render(&state.resolver)
}

/// POST /api/music/import
pub async fn import_songs(State(state): State<AppState>) -> Result<JsonResponse> {
    let summary = import_library(&state.db, &state.storage, &state.config.media).await?;

    Envelope::data(summary)
        .with_message("Library import finished")
        .render(&state.resolver)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Maps multipart failures, keeping the 413 the body limit produces.
pub(crate) fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Accepts files with a configured audio extension and an audio media type.
/// A missing or generic content type is guessed from the file name.
fn is_accepted_audio(file_name: &str, content_type: Option<&str>, media: &MediaConfig) -> bool {
    let extension_ok = extension_of(file_name)
        .map(|ext| media.is_audio_extension(&ext))
        .unwrap_or(false);

    let mime = match content_type {
        Some(ct) if ct != "application/octet-stream" => ct.to_string(),
        _ => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    };

    extension_ok && mime.starts_with("audio/")
}

/// Shared defaults and remote URLs are never deleted with a song.
fn is_removable_thumbnail(state: &AppState, thumbnail: &str) -> bool {
    if is_http_url(thumbnail) {
        return false;
    }
    let settings = state.resolver.settings();
    let path = state.resolver.rebase(FsPath::new(thumbnail));
    path != settings.default_thumbnail && path != settings.default_playlist_thumbnail
}
