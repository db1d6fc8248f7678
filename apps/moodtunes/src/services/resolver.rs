//! Path and URL resolution for media files.
//!
//! Every stored file location goes through [`PathResolver`] on its way out
//! (absolute path -> public URL) and on its way back in (URL segment ->
//! file on disk for streaming). The base URL is read once at startup and is
//! the only source of scheme, host and port.

use std::path::{Component, Path, PathBuf};

use axum::http::Uri;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use walkdir::WalkDir;

use crate::db::models::{Playlist, Song};

/// Bytes left untouched when encoding a single URI component.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("media root {0} is not an existing directory")]
    MissingMediaRoot(PathBuf),
}

/// Public origin of the server: `scheme://host[:port]`, http or https.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    origin: String,
    secure: bool,
}

impl BaseUrl {
    pub fn parse(raw: &str) -> Result<Self, ResolverError> {
        let invalid = |reason: &str| ResolverError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim().trim_end_matches('/');
        let uri: Uri = trimmed.parse().map_err(|_| invalid("not a URL"))?;

        let secure = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            _ => return Err(invalid("scheme must be http or https")),
        };

        let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
        if authority.host().is_empty() || authority.as_str().contains('@') {
            return Err(invalid("expected host[:port]"));
        }
        if !matches!(uri.path(), "" | "/") || uri.query().is_some() {
            return Err(invalid("must not contain a path or query"));
        }

        let scheme = if secure { "https" } else { "http" };
        Ok(Self {
            origin: format!("{}://{}", scheme, authority),
            secure,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.origin
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }
}

impl std::fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.origin)
    }
}

/// Which public mount a file is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Thumbnail,
}

impl MediaKind {
    pub fn mount(self) -> &'static str {
        match self {
            MediaKind::Audio => "music",
            MediaKind::Thumbnail => "thumbnails",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub base_url: BaseUrl,
    pub media_root: PathBuf,
    pub thumbnail_root: PathBuf,
    pub default_thumbnail: PathBuf,
    pub default_playlist_thumbnail: PathBuf,
    /// Old root prefixes rebased onto `media_root`.
    pub legacy_roots: Vec<PathBuf>,
}

/// A song with its public URLs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSong {
    #[serde(flatten)]
    pub song: Song,
    pub file_url: String,
    pub thumbnail_url: String,
    pub default_thumbnail: bool,
}

/// A playlist with its public thumbnail URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPlaylist {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub thumbnail_url: String,
    pub default_thumbnail: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedThumbnail {
    pub url: String,
    pub is_default: bool,
}

pub struct PathResolver {
    settings: ResolverSettings,
}

impl PathResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.settings.base_url
    }

    pub fn media_root(&self) -> &Path {
        &self.settings.media_root
    }

    pub fn thumbnail_root(&self) -> &Path {
        &self.settings.thumbnail_root
    }

    fn root_for(&self, kind: MediaKind) -> &Path {
        match kind {
            MediaKind::Audio => &self.settings.media_root,
            MediaKind::Thumbnail => &self.settings.thumbnail_root,
        }
    }

    /// Fails unless the media root is an existing directory.
    pub fn verify_media_root(&self) -> Result<(), ResolverError> {
        let root = &self.settings.media_root;
        match std::fs::metadata(root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(ResolverError::MissingMediaRoot(root.clone())),
        }
    }

    /// Maps a stored absolute path onto the current media root when it lives
    /// under one of the legacy roots.
    pub fn rebase(&self, path: &Path) -> PathBuf {
        for legacy in &self.settings.legacy_roots {
            if let Ok(rest) = path.strip_prefix(legacy) {
                return self.settings.media_root.join(rest);
            }
        }
        path.to_path_buf()
    }

    /// Public URL of a stored file. Relative inputs are taken as already
    /// relative to the mount's root.
    pub fn url_for(&self, path: &Path, kind: MediaKind) -> String {
        let relative = if path.is_absolute() {
            to_relative(&self.rebase(path), self.root_for(kind))
        } else {
            path.to_string_lossy().into_owned()
        };

        format!(
            "{}/{}/{}",
            self.settings.base_url,
            kind.mount(),
            encode_component(&relative)
        )
    }

    /// Thumbnail URL for a stored value, falling back to `default` when the
    /// value is unset or names no regular file.
    pub async fn resolve_thumbnail(&self, stored: Option<&str>, default: &Path) -> ResolvedThumbnail {
        if let Some(value) = stored.map(str::trim).filter(|v| !v.is_empty()) {
            if is_http_url(value) {
                return ResolvedThumbnail {
                    url: value.to_string(),
                    is_default: false,
                };
            }

            let path = self.locate(Path::new(value), MediaKind::Thumbnail);
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => {
                    return ResolvedThumbnail {
                        url: self.url_for(&path, MediaKind::Thumbnail),
                        is_default: false,
                    };
                }
                Ok(_) => {
                    tracing::debug!(path = %path.display(), "Thumbnail is not a regular file");
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Thumbnail unavailable");
                }
            }
        }

        ResolvedThumbnail {
            url: self.url_for(default, MediaKind::Thumbnail),
            is_default: true,
        }
    }

    pub async fn resolve_song(&self, song: &Song) -> ResolvedSong {
        let thumbnail = self
            .resolve_thumbnail(
                song.thumbnail_path.as_deref(),
                &self.settings.default_thumbnail,
            )
            .await;

        ResolvedSong {
            song: song.clone(),
            file_url: self.url_for(Path::new(&song.file_path), MediaKind::Audio),
            thumbnail_url: thumbnail.url,
            default_thumbnail: thumbnail.is_default,
        }
    }

    pub async fn resolve_songs(&self, songs: &[Song]) -> Vec<ResolvedSong> {
        let mut resolved = Vec::with_capacity(songs.len());
        for song in songs {
            resolved.push(self.resolve_song(song).await);
        }
        resolved
    }

    pub async fn resolve_playlist(&self, playlist: &Playlist) -> ResolvedPlaylist {
        let thumbnail = self
            .resolve_thumbnail(
                playlist.thumbnail_path.as_deref(),
                &self.settings.default_playlist_thumbnail,
            )
            .await;

        ResolvedPlaylist {
            playlist: playlist.clone(),
            thumbnail_url: thumbnail.url,
            default_thumbnail: thumbnail.is_default,
        }
    }

    /// Rewrites every `http://` string in `value` to `https://` when the
    /// deployment is served over TLS.
    pub fn secure_json(&self, value: &mut Value) {
        if self.settings.base_url.is_secure() {
            upgrade_scheme(value);
        }
    }

    /// Finds the file behind an encoded URL segment of the given mount.
    ///
    /// The exact relative path under the mount's root wins; otherwise the
    /// whole media root is scanned for the first file with the same name.
    /// The scan is linear in the number of files in the library.
    pub async fn resolve_url_to_file(&self, encoded: &str, kind: MediaKind) -> Option<PathBuf> {
        let decoded = match percent_decode_str(encoded).decode_utf8() {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => {
                tracing::debug!(segment = encoded, "Rejected non UTF-8 media path");
                return None;
            }
        };

        let Some(relative) = safe_relative(&decoded) else {
            tracing::debug!(path = %decoded, "Rejected unsafe media path");
            return None;
        };

        let root = self.root_for(kind).to_path_buf();
        let media_root = self.settings.media_root.clone();

        match tokio::task::spawn_blocking(move || find_file(&root, &media_root, &relative)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "Media lookup task failed");
                None
            }
        }
    }

    fn locate(&self, path: &Path, kind: MediaKind) -> PathBuf {
        if path.is_absolute() {
            self.rebase(path)
        } else {
            self.root_for(kind).join(path)
        }
    }
}

/// Path of `path` relative to `root`, or its basename when it is not under
/// `root`. The prefix match is per path component.
pub fn to_relative(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rest) if !rest.as_os_str().is_empty() => rest.to_string_lossy().into_owned(),
        _ => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned()),
    }
}

/// Encodes `value` as a single URI component (`/` becomes `%2F`).
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// Case-insensitive prefix match; URL schemes ignore case.
fn has_prefix(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Whether `value` is an absolute http(s) URL rather than a file path.
pub fn is_http_url(value: &str) -> bool {
    has_prefix(value, "http://") || has_prefix(value, "https://")
}

fn upgrade_scheme(value: &mut Value) {
    match value {
        Value::String(s) if has_prefix(s, "http://") => s.replace_range(.."http://".len(), "https://"),
        Value::Array(items) => items.iter_mut().for_each(upgrade_scheme),
        Value::Object(map) => map.values_mut().for_each(upgrade_scheme),
        _ => {}
    }
}

/// Relative path made only of normal components, or `None` if the input
/// climbs out of its root or is absolute.
fn safe_relative(decoded: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(decoded).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

fn find_file(root: &Path, scan_root: &Path, relative: &Path) -> Option<PathBuf> {
    let candidate = root.join(relative);
    if let (Ok(real), Ok(real_root)) = (candidate.canonicalize(), root.canonicalize()) {
        if real.starts_with(&real_root) && real.is_file() {
            return Some(real);
        }
    }

    let name = relative.file_name()?;
    WalkDir::new(scan_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == name)
        .map(|entry| entry.into_path())
}
