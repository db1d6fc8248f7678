//! Playlist endpoints.

use std::path::Path as FsPath;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};

use crate::api::music::multipart_error;
use crate::config::Config;
use crate::db::models::NewPlaylist;
use crate::db::CatalogStore;
use crate::error::{AppError, Result};
use crate::response::{Envelope, JsonResponse};
use crate::services::resolver::{ResolvedPlaylist, ResolvedSong};
use crate::services::storage::{extension_of, remove_best_effort};
use crate::AppState;

const DEFAULT_CREATOR: &str = "Anonymous";

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaylistRequest {
    pub name: Option<String>,
    pub created_by: Option<String>,
    /// Absolute path or URL of a cover image.
    pub thumbnail: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistListItem {
    #[serde(flatten)]
    pub playlist: ResolvedPlaylist,
    pub song_count: i64,
}

#[derive(Debug, Serialize)]
pub struct PlaylistDetail {
    #[serde(flatten)]
    pub playlist: ResolvedPlaylist,
    pub songs: Vec<ResolvedSong>,
}

// =============================================================================
// Router
// =============================================================================

pub fn router(config: &Config) -> Router<AppState> {
    let thumbnail_limit = config.media.max_thumbnail_bytes() + 64 * 1024;

    Router::new()
        .route("/", get(list_playlists).post(create_playlist))
        .route("/:id", get(get_playlist).delete(delete_playlist))
        .route(
            "/:id/thumbnail",
            put(upload_thumbnail).layer(DefaultBodyLimit::max(thumbnail_limit)),
        )
        .route(
            "/:id/songs/:song_id",
            post(add_song).delete(remove_song),
        )
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/playlists
pub async fn list_playlists(State(state): State<AppState>) -> Result<JsonResponse> {
    let summaries = state.db.lock().await.list_playlists()?;

    let mut items = Vec::with_capacity(summaries.len());
    for summary in summaries {
        items.push(PlaylistListItem {
            playlist: state.resolver.resolve_playlist(&summary.playlist).await,
            song_count: summary.song_count,
        });
    }

    let count = items.len();
    Envelope::data(items)
        .with_count(count)
        .render(&state.resolver)
}

/// GET /api/playlists/:id
///
/// The playlist with every member song resolved.
pub async fn get_playlist(
    State(state): State<AppState>,
    WithRejection(Path(playlist_id), _): WithRejection<Path<i64>, AppError>,
) -> Result<JsonResponse> {
    let db = state.db.lock().await;
    let playlist = db.find_playlist(playlist_id)?;
    let songs = db.playlist_songs(playlist_id)?;
    drop(db);

    let detail = PlaylistDetail {
        playlist: state.resolver.resolve_playlist(&playlist).await,
        songs: state.resolver.resolve_songs(&songs).await,
    };
    Envelope::data(detail).render(&state.resolver)
}

/// POST /api/playlists
pub async fn create_playlist(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<CreatePlaylistRequest>, AppError>,
) -> Result<JsonResponse> {
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::BadRequest("Playlist name is required".to_string()))?;

    let new_playlist = NewPlaylist {
        name: name.to_string(),
        created_by: req
            .created_by
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CREATOR)
            .to_string(),
        thumbnail_path: req
            .thumbnail
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
    };

    let playlist = state.db.lock().await.insert_playlist(&new_playlist)?;

    tracing::info!(playlist_id = playlist.id, name = %playlist.name, "Playlist created");

    let resolved = state.resolver.resolve_playlist(&playlist).await;
    Envelope::data(resolved)
        .with_message("Playlist created successfully")
        .render_with_status(StatusCode::CREATED, &state.resolver)
}

/// DELETE /api/playlists/:id
///
/// Memberships go with the playlist; songs and files are kept.
pub async fn delete_playlist(
    State(state): State<AppState>,
    WithRejection(Path(playlist_id), _): WithRejection<Path<i64>, AppError>,
) -> Result<JsonResponse> {
    let playlist = state.db.lock().await.delete_playlist(playlist_id)?;

    tracing::info!(playlist_id = playlist.id, name = %playlist.name, "Playlist deleted");

    let resolved = state.resolver.resolve_playlist(&playlist).await;
    Envelope::data(resolved)
        .with_message("Playlist deleted successfully")
        .render(&state.resolver)
}

/// PUT /api/playlists/:id/thumbnail
///
/// Multipart upload with a `thumbnail` image part. A previously uploaded
/// cover is removed once the new one is recorded.
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    WithRejection(Path(playlist_id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(mut multipart, _): WithRejection<Multipart, AppError>,
) -> Result<JsonResponse> {
    let media = &state.config.media;
    let previous = state.db.lock().await.find_playlist(playlist_id)?;

    let mut image: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("thumbnail") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let is_image = field
            .content_type()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or_else(|| {
                mime_guess::from_path(&file_name)
                    .first()
                    .map(|m| m.type_() == mime_guess::mime::IMAGE)
                    .unwrap_or(false)
            });
        if !is_image {
            return Err(AppError::BadRequest(
                "Only image files are allowed".to_string(),
            ));
        }

        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.len() > media.max_thumbnail_bytes() {
            return Err(AppError::PayloadTooLarge(format!(
                "Thumbnails are limited to {} MB",
                media.max_thumbnail_mb
            )));
        }
        image = Some((file_name, bytes.to_vec()));
    }

    let (file_name, bytes) =
        image.ok_or_else(|| AppError::BadRequest("No thumbnail uploaded".to_string()))?;

    let ext = extension_of(&file_name).unwrap_or_else(|| "jpg".to_string());
    let path = state.storage.store_playlist_thumbnail(&ext, &bytes).await?;
    let stored = path.to_string_lossy().into_owned();

    let updated = state
        .db
        .lock()
        .await
        .set_playlist_thumbnail(playlist_id, &stored);
    let playlist = match updated {
        Ok(playlist) => playlist,
        Err(e) => {
            remove_best_effort(&path).await;
            return Err(e.into());
        }
    };

    if let Some(old) = previous.thumbnail_path.as_deref() {
        if is_uploaded_cover(&state, old) {
            remove_best_effort(FsPath::new(old)).await;
        }
    }

    tracing::info!(playlist_id = playlist.id, path = %stored, "Playlist thumbnail updated");

    let resolved = state.resolver.resolve_playlist(&playlist).await;
    Envelope::data(resolved)
        .with_message("Playlist thumbnail updated successfully")
        .render(&state.resolver)
}

/// POST /api/playlists/:id/songs/:song_id
pub async fn add_song(
    State(state): State<AppState>,
    WithRejection(Path((playlist_id, song_id)), _): WithRejection<Path<(i64, i64)>, AppError>,
) -> Result<JsonResponse> {
    let entry = state
        .db
        .lock()
        .await
        .add_song_to_playlist(playlist_id, song_id)?;

    tracing::debug!(playlist_id, song_id, "Song added to playlist");

    Envelope::data(entry)
        .with_message("Song added to playlist successfully")
        .render_with_status(StatusCode::CREATED, &state.resolver)
}

/// DELETE /api/playlists/:id/songs/:song_id
pub async fn remove_song(
    State(state): State<AppState>,
    WithRejection(Path((playlist_id, song_id)), _): WithRejection<Path<(i64, i64)>, AppError>,
) -> Result<JsonResponse> {
    let entry = state
        .db
        .lock()
        .await
        .remove_song_from_playlist(playlist_id, song_id)?;

    tracing::debug!(playlist_id, song_id, "Song removed from playlist");

    Envelope::data(entry)
        .with_message("Song removed from playlist successfully")
        .render(&state.resolver)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Covers written by [`upload_thumbnail`] live in the thumbnail root and
/// start with `playlist_`.
fn is_uploaded_cover(state: &AppState, stored: &str) -> bool {
    let path = FsPath::new(stored);
    path.parent() == Some(state.storage.thumbnail_root())
        && path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with("playlist_"))
            .unwrap_or(false)
}
