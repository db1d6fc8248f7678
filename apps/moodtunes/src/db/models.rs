use serde::{Deserialize, Serialize};

/// A cataloged song. Paths are stored exactly as recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_seconds: f64,
    pub emotion: String,
    pub file_path: String,
    pub thumbnail_path: Option<String>,
    pub added_at: String,
}

/// Fields needed to insert a song.
#[derive(Debug, Clone)]
pub struct NewSong {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_seconds: f64,
    pub emotion: String,
    pub file_path: String,
    pub thumbnail_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    pub created_by: String,
    /// Absolute path or, for older records, an absolute URL.
    pub thumbnail_path: Option<String>,
    pub created_at: String,
}

/// Playlist row as listed, with its membership count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub song_count: i64,
}

#[derive(Debug, Clone)]
pub struct NewPlaylist {
    pub name: String,
    pub created_by: String,
    pub thumbnail_path: Option<String>,
}

/// A playlist membership row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    pub id: i64,
    pub playlist_id: i64,
    pub song_id: i64,
    pub added_at: String,
}
