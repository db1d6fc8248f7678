//! Catalog store: songs, playlists and playlist memberships.
//!
//! Handlers only talk to the catalog through [`CatalogStore`], implemented
//! here for a plain SQLite connection.

use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;

use super::models::{NewPlaylist, NewSong, Playlist, PlaylistEntry, PlaylistSummary, Song};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Read/write contract of the song and playlist catalog.
pub trait CatalogStore {
    fn insert_song(&self, song: &NewSong) -> CatalogResult<Song>;
    fn list_songs(&self) -> CatalogResult<Vec<Song>>;
    fn find_song(&self, id: i64) -> CatalogResult<Song>;
    /// Exact, case-sensitive title match.
    fn find_song_by_title(&self, title: &str) -> CatalogResult<Option<Song>>;
    fn find_songs_by_emotion(&self, emotion: &str) -> CatalogResult<Vec<Song>>;
    /// Case-insensitive substring match over title and artist, sorted by title.
    fn search_songs(&self, keyword: &str) -> CatalogResult<Vec<Song>>;
    fn delete_song(&self, id: i64) -> CatalogResult<Song>;
    fn list_emotions(&self) -> CatalogResult<Vec<String>>;

    fn insert_playlist(&self, playlist: &NewPlaylist) -> CatalogResult<Playlist>;
    fn list_playlists(&self) -> CatalogResult<Vec<PlaylistSummary>>;
    fn find_playlist(&self, id: i64) -> CatalogResult<Playlist>;
    fn playlist_songs(&self, playlist_id: i64) -> CatalogResult<Vec<Song>>;
    fn set_playlist_thumbnail(&self, id: i64, thumbnail_path: &str) -> CatalogResult<Playlist>;
    /// Deletes the playlist and its memberships; songs are untouched.
    fn delete_playlist(&self, id: i64) -> CatalogResult<Playlist>;
    fn add_song_to_playlist(&self, playlist_id: i64, song_id: i64)
        -> CatalogResult<PlaylistEntry>;
    fn remove_song_from_playlist(
        &self,
        playlist_id: i64,
        song_id: i64,
    ) -> CatalogResult<PlaylistEntry>;
}

const SONG_COLUMNS: &str = "id, title, artist, album, duration_seconds, emotion, \
                            file_path, thumbnail_path, added_at";

const PLAYLIST_COLUMNS: &str = "id, name, created_by, thumbnail_path, created_at";

impl CatalogStore for Connection {
    fn insert_song(&self, song: &NewSong) -> CatalogResult<Song> {
        self.execute(
            r#"
            INSERT INTO songs (
                title, artist, album, duration_seconds, emotion, file_path, thumbnail_path
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            rusqlite::params![
                song.title,
                song.artist,
                song.album,
                song.duration_seconds,
                song.emotion,
                song.file_path,
                song.thumbnail_path,
            ],
        )?;

        self.find_song(self.last_insert_rowid())
    }

    fn list_songs(&self) -> CatalogResult<Vec<Song>> {
        let mut stmt = self.prepare(&format!(
            "SELECT {} FROM songs ORDER BY title COLLATE NOCASE, id",
            SONG_COLUMNS
        ))?;
        let songs = stmt
            .query_map([], map_song_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(songs)
    }

    fn find_song(&self, id: i64) -> CatalogResult<Song> {
        self.query_row(
            &format!("SELECT {} FROM songs WHERE id = ?1", SONG_COLUMNS),
            [id],
            map_song_row,
        )
        .optional()?
        .ok_or_else(|| CatalogError::NotFound("Song not found".to_string()))
    }

    fn find_song_by_title(&self, title: &str) -> CatalogResult<Option<Song>> {
        let song = self
            .query_row(
                &format!(
                    "SELECT {} FROM songs WHERE title = ?1 ORDER BY id LIMIT 1",
                    SONG_COLUMNS
                ),
                [title],
                map_song_row,
            )
            .optional()?;
        Ok(song)
    }

    fn find_songs_by_emotion(&self, emotion: &str) -> CatalogResult<Vec<Song>> {
        let mut stmt = self.prepare(&format!(
            "SELECT {} FROM songs WHERE emotion = ?1 COLLATE NOCASE \
             ORDER BY title COLLATE NOCASE, id",
            SONG_COLUMNS
        ))?;
        let songs = stmt
            .query_map([emotion], map_song_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(songs)
    }

    fn search_songs(&self, keyword: &str) -> CatalogResult<Vec<Song>> {
        let pattern = format!("%{}%", escape_like(keyword));
        let mut stmt = self.prepare(&format!(
            r#"
            SELECT {} FROM songs
            WHERE title LIKE ?1 ESCAPE '\' OR artist LIKE ?1 ESCAPE '\'
            ORDER BY title COLLATE NOCASE, id
            "#,
            SONG_COLUMNS
        ))?;
        let songs = stmt
            .query_map([pattern], map_song_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(songs)
    }

    fn delete_song(&self, id: i64) -> CatalogResult<Song> {
        let song = self.find_song(id)?;
        self.execute("DELETE FROM songs WHERE id = ?1", [id])?;
        Ok(song)
    }

    fn list_emotions(&self) -> CatalogResult<Vec<String>> {
        let mut stmt =
            self.prepare("SELECT DISTINCT emotion FROM songs ORDER BY emotion COLLATE NOCASE")?;
        let emotions = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(emotions)
    }

    fn insert_playlist(&self, playlist: &NewPlaylist) -> CatalogResult<Playlist> {
        self.execute(
            "INSERT INTO playlists (name, created_by, thumbnail_path) VALUES (?1, ?2, ?3)",
            rusqlite::params![playlist.name, playlist.created_by, playlist.thumbnail_path],
        )?;

        self.find_playlist(self.last_insert_rowid())
    }

    fn list_playlists(&self) -> CatalogResult<Vec<PlaylistSummary>> {
        let mut stmt = self.prepare(
            r#"
            SELECT p.id, p.name, p.created_by, p.thumbnail_path, p.created_at,
                   COUNT(ps.song_id) AS song_count
            FROM playlists p
            LEFT JOIN playlist_songs ps ON p.id = ps.playlist_id
            GROUP BY p.id
            ORDER BY p.name COLLATE NOCASE, p.id
            "#,
        )?;
        let playlists = stmt
            .query_map([], |row| {
                Ok(PlaylistSummary {
                    playlist: map_playlist_row(row)?,
                    song_count: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(playlists)
    }

    fn find_playlist(&self, id: i64) -> CatalogResult<Playlist> {
        self.query_row(
            &format!("SELECT {} FROM playlists WHERE id = ?1", PLAYLIST_COLUMNS),
            [id],
            map_playlist_row,
        )
        .optional()?
        .ok_or_else(|| CatalogError::NotFound("Playlist not found".to_string()))
    }

    fn playlist_songs(&self, playlist_id: i64) -> CatalogResult<Vec<Song>> {
        let mut stmt = self.prepare(
            r#"
            SELECT s.id, s.title, s.artist, s.album, s.duration_seconds, s.emotion,
                   s.file_path, s.thumbnail_path, s.added_at
            FROM songs s
            JOIN playlist_songs ps ON s.id = ps.song_id
            WHERE ps.playlist_id = ?1
            ORDER BY s.title COLLATE NOCASE, s.id
            "#,
        )?;
        let songs = stmt
            .query_map([playlist_id], map_song_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(songs)
    }

    fn set_playlist_thumbnail(&self, id: i64, thumbnail_path: &str) -> CatalogResult<Playlist> {
        let updated = self.execute(
            "UPDATE playlists SET thumbnail_path = ?1 WHERE id = ?2",
            rusqlite::params![thumbnail_path, id],
        )?;
        if updated == 0 {
            return Err(CatalogError::NotFound("Playlist not found".to_string()));
        }
        self.find_playlist(id)
    }

    fn delete_playlist(&self, id: i64) -> CatalogResult<Playlist> {
        let playlist = self.find_playlist(id)?;
        // ON DELETE CASCADE removes the memberships
        self.execute("DELETE FROM playlists WHERE id = ?1", [id])?;
        Ok(playlist)
    }

    fn add_song_to_playlist(
        &self,
        playlist_id: i64,
        song_id: i64,
    ) -> CatalogResult<PlaylistEntry> {
        self.find_playlist(playlist_id)?;
        self.find_song(song_id)?;

        let inserted = self.execute(
            "INSERT INTO playlist_songs (playlist_id, song_id) VALUES (?1, ?2)",
            [playlist_id, song_id],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(CatalogError::Conflict(
                    "Song already exists in this playlist".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        let entry = self.query_row(
            "SELECT id, playlist_id, song_id, added_at FROM playlist_songs WHERE id = ?1",
            [self.last_insert_rowid()],
            map_entry_row,
        )?;
        Ok(entry)
    }

    fn remove_song_from_playlist(
        &self,
        playlist_id: i64,
        song_id: i64,
    ) -> CatalogResult<PlaylistEntry> {
        let entry = self
            .query_row(
                r#"
                SELECT id, playlist_id, song_id, added_at FROM playlist_songs
                WHERE playlist_id = ?1 AND song_id = ?2
                "#,
                [playlist_id, song_id],
                map_entry_row,
            )
            .optional()?
            .ok_or_else(|| CatalogError::NotFound("Song not found in this playlist".to_string()))?;

        self.execute("DELETE FROM playlist_songs WHERE id = ?1", [entry.id])?;
        Ok(entry)
    }
}

/// Escapes LIKE wildcards so the keyword matches literally.
fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Maps a database row to a Song struct.
fn map_song_row(row: &rusqlite::Row) -> rusqlite::Result<Song> {
    Ok(Song {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        album: row.get(3)?,
        duration_seconds: row.get(4)?,
        emotion: row.get(5)?,
        file_path: row.get(6)?,
        thumbnail_path: row.get(7)?,
        added_at: row.get(8)?,
    })
}

/// Maps a database row to a Playlist struct.
fn map_playlist_row(row: &rusqlite::Row) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: row.get(0)?,
        name: row.get(1)?,
        created_by: row.get(2)?,
        thumbnail_path: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_entry_row(row: &rusqlite::Row) -> rusqlite::Result<PlaylistEntry> {
    Ok(PlaylistEntry {
        id: row.get(0)?,
        playlist_id: row.get(1)?,
        song_id: row.get(2)?,
        added_at: row.get(3)?,
    })
}
