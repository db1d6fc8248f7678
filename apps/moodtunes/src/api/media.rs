//! Raw file streaming for `/music/*` and `/thumbnails/*`.
//!
//! The URL segment after the mount is resolved back to a file by the
//! resolver and served by tower-http, which handles content type, range
//! requests and conditional headers.

use axum::{
    body::Body,
    extract::{Request, State},
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::{AppError, Result};
use crate::services::MediaKind;
use crate::AppState;

/// GET /music/*path
pub async fn serve_music(State(state): State<AppState>, request: Request) -> Result<Response> {
    serve(&state, MediaKind::Audio, request).await
}

/// GET /thumbnails/*path
pub async fn serve_thumbnail(State(state): State<AppState>, request: Request) -> Result<Response> {
    serve(&state, MediaKind::Thumbnail, request).await
}

async fn serve(state: &AppState, kind: MediaKind, request: Request) -> Result<Response> {
    // The raw path keeps the segment percent-encoded exactly as issued.
    let prefix = format!("/{}/", kind.mount());
    let segment = request
        .uri()
        .path()
        .strip_prefix(&prefix)
        .unwrap_or_default()
        .to_string();

    let path = state
        .resolver
        .resolve_url_to_file(&segment, kind)
        .await
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    tracing::debug!(mount = kind.mount(), path = %path.display(), "Serving media file");

    let response = ServeFile::new(&path)
        .oneshot(request)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to serve {}: {}", path.display(), e)))?;

    Ok(response.map(Body::new))
}
