//! Test infrastructure for moodtunes integration tests.
//!
//! Provides a `TestApp` wrapper around `axum_test::TestServer` backed by an
//! in-memory database and a temporary media root, with helpers for seeding
//! songs, playlists and files.

#![allow(dead_code)]

use axum_test::TestServer;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

use moodtunes::config::{Config, DatabaseConfig, MediaConfig, ServerConfig};
use moodtunes::db::models::{NewPlaylist, NewSong, Playlist, Song};
use moodtunes::db::{self, CatalogStore};
use moodtunes::{app, AppState};

/// Public base URL every test server is configured with.
pub const BASE_URL: &str = "https://host:3000";

/// Test application wrapper around axum_test::TestServer.
pub struct TestApp {
    server: TestServer,
    db: Arc<Mutex<Connection>>,
    media_dir: TempDir,
}

impl TestApp {
    /// Create a test application with default settings.
    ///
    /// The media root is a fresh temporary directory holding
    /// `thumb/default.jpg` and `thumb/default_playlist.jpg`.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test application, letting the caller adjust the config.
    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let media_dir = TempDir::new().expect("Failed to create media root");
        let thumb = media_dir.path().join("thumb");
        std::fs::create_dir_all(&thumb).expect("Failed to create thumbnail root");
        std::fs::write(thumb.join("default.jpg"), b"default-jpg").unwrap();
        std::fs::write(thumb.join("default_playlist.jpg"), b"default-playlist-jpg").unwrap();

        let mut config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                base_url: Some(BASE_URL.to_string()),
                ..Default::default()
            },
            database: DatabaseConfig {
                path: ":memory:".into(),
            },
            media: MediaConfig {
                root: media_dir.path().to_path_buf(),
                ..Default::default()
            },
            classifier: Default::default(),
        };
        adjust(&mut config);

        let conn = db::init_db_memory().expect("Failed to initialize test database");
        let state = AppState::new(config, conn).expect("Failed to build application state");
        let db = Arc::clone(&state.db);

        let server = TestServer::new(app(state)).expect("Failed to create test server");

        Self {
            server,
            db,
            media_dir,
        }
    }

    pub fn server(&self) -> &TestServer {
        &self.server
    }

    pub fn db(&self) -> &Arc<Mutex<Connection>> {
        &self.db
    }

    pub fn media_root(&self) -> &Path {
        self.media_dir.path()
    }

    pub fn thumbnail_root(&self) -> PathBuf {
        self.media_root().join("thumb")
    }

    /// Write a file below the media root, creating parent directories.
    pub fn write_file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.media_root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Insert a song whose audio file exists at `<root>/<emotion>/<title>.mp3`.
    pub async fn seed_song(&self, title: &str, artist: &str, emotion: &str) -> Song {
        let path = self.write_file(&format!("{}/{}.mp3", emotion, title), b"ID3-fake-audio");
        self.insert_song(title, artist, emotion, &path.to_string_lossy(), None)
            .await
    }

    /// Insert a song row without touching the filesystem.
    pub async fn insert_song(
        &self,
        title: &str,
        artist: &str,
        emotion: &str,
        file_path: &str,
        thumbnail_path: Option<&str>,
    ) -> Song {
        let song = NewSong {
            title: title.to_string(),
            artist: artist.to_string(),
            album: "Unknown Album".to_string(),
            duration_seconds: 200.0,
            emotion: emotion.to_string(),
            file_path: file_path.to_string(),
            thumbnail_path: thumbnail_path.map(String::from),
        };
        self.db
            .lock()
            .await
            .insert_song(&song)
            .expect("Failed to seed song")
    }

    pub async fn seed_playlist(&self, name: &str, thumbnail_path: Option<&str>) -> Playlist {
        let playlist = NewPlaylist {
            name: name.to_string(),
            created_by: "tester".to_string(),
            thumbnail_path: thumbnail_path.map(String::from),
        };
        self.db
            .lock()
            .await
            .insert_playlist(&playlist)
            .expect("Failed to seed playlist")
    }

    pub async fn add_to_playlist(&self, playlist_id: i64, song_id: i64) {
        self.db
            .lock()
            .await
            .add_song_to_playlist(playlist_id, song_id)
            .expect("Failed to seed playlist membership");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_creation() {
        let app = TestApp::new().await;
        assert!(app.thumbnail_root().join("default.jpg").is_file());

        let response = app.server().get("/health").await;
        response.assert_status_ok();
    }
}
