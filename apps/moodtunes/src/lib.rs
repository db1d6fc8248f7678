//! moodtunes library
//!
//! Personal music library server: an emotion-tagged song catalog with
//! playlists, served over HTTP together with the audio and thumbnail files.
//! This library exposes modules for use in integration tests.

use axum::{middleware::from_fn_with_state, response::Json, routing::get, Router};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod response;
pub mod services;

use config::Config;
use services::{EmotionClassifier, MediaStorage, PathResolver};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Mutex<Connection>>,
    pub resolver: Arc<PathResolver>,
    pub storage: Arc<MediaStorage>,
    pub classifier: Option<Arc<EmotionClassifier>>,
}

impl AppState {
    /// Builds the state around an initialized database connection.
    pub fn new(config: Config, conn: Connection) -> error::Result<Self> {
        let settings = config.resolver_settings()?;
        let storage = MediaStorage::from_settings(&settings);
        let classifier = EmotionClassifier::from_config(&config.classifier).map(Arc::new);

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(Mutex::new(conn)),
            resolver: Arc::new(PathResolver::new(settings)),
            storage: Arc::new(storage),
            classifier,
        })
    }
}

#[derive(Serialize)]
pub struct ApiResponse {
    pub message: String,
    pub version: String,
}

pub async fn health_check() -> Json<ApiResponse> {
    Json(ApiResponse {
        message: "moodtunes is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/music", api::music::router(&state.config))
        .nest("/api/playlists", api::playlists::router(&state.config))
        .route("/music/*path", get(api::media::serve_music))
        .route("/thumbnails/*path", get(api::media::serve_thumbnail))
        .layer(from_fn_with_state(
            state.config.clone(),
            middleware::expose_error_details,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
