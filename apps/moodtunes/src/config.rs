//! Configuration module for the moodtunes server.
//!
//! Loads configuration from `config.toml` with environment variable overrides.

use config::{Config as ConfigLoader, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::error::AppError;
use crate::services::resolver::{BaseUrl, ResolverSettings};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL (scheme, host and port) used to build every media URL.
    /// Falls back to `http://localhost:{port}` when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Include internal error details in 500 responses (development only).
    #[serde(default)]
    pub expose_errors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
            cors_origins: Vec::new(),
            expose_errors: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/moodtunes.db")
}

/// Media library layout and upload limits
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_media_root")]
    pub root: PathBuf,
    /// Thumbnail directory, defaults to `<root>/thumb`.
    #[serde(default)]
    pub thumbnail_dir: Option<PathBuf>,
    /// Defaults to `<thumbnail_dir>/default.jpg`.
    #[serde(default)]
    pub default_thumbnail: Option<PathBuf>,
    /// Defaults to `<thumbnail_dir>/default_playlist.jpg`.
    #[serde(default)]
    pub default_playlist_thumbnail: Option<PathBuf>,
    /// Stale root prefixes found in historical records; rebased onto `root`.
    #[serde(default)]
    pub legacy_roots: Vec<PathBuf>,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
    #[serde(default = "default_max_thumbnail_mb")]
    pub max_thumbnail_mb: u64,
    #[serde(default = "default_audio_extensions")]
    pub audio_extensions: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: default_media_root(),
            thumbnail_dir: None,
            default_thumbnail: None,
            default_playlist_thumbnail: None,
            legacy_roots: Vec::new(),
            max_upload_mb: default_max_upload_mb(),
            max_thumbnail_mb: default_max_thumbnail_mb(),
            audio_extensions: default_audio_extensions(),
        }
    }
}

fn default_media_root() -> PathBuf {
    PathBuf::from("./data/media")
}

fn default_max_upload_mb() -> u64 {
    10
}

fn default_max_thumbnail_mb() -> u64 {
    5
}

fn default_audio_extensions() -> Vec<String> {
    vec!["mp3".to_string()]
}

impl MediaConfig {
    pub fn thumbnail_dir(&self) -> PathBuf {
        self.thumbnail_dir
            .clone()
            .unwrap_or_else(|| self.root.join("thumb"))
    }

    pub fn default_thumbnail(&self) -> PathBuf {
        self.default_thumbnail
            .clone()
            .unwrap_or_else(|| self.thumbnail_dir().join("default.jpg"))
    }

    pub fn default_playlist_thumbnail(&self) -> PathBuf {
        self.default_playlist_thumbnail
            .clone()
            .unwrap_or_else(|| self.thumbnail_dir().join("default_playlist.jpg"))
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb * 1024 * 1024) as usize
    }

    pub fn max_thumbnail_bytes(&self) -> usize {
        (self.max_thumbnail_mb * 1024 * 1024) as usize
    }

    /// Whether `extension` (without dot) is an accepted audio format.
    pub fn is_audio_extension(&self, extension: &str) -> bool {
        self.audio_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

/// External emotion classifier process
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Program to run; the classifier is disabled when unset.
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments placed before the audio file path.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
    /// Emotion used when the classifier prints an unknown label.
    #[serde(default = "default_fallback_emotion")]
    pub fallback_emotion: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: default_classifier_timeout(),
            fallback_emotion: default_fallback_emotion(),
        }
    }
}

fn default_classifier_timeout() -> u64 {
    60
}

fn default_fallback_emotion() -> String {
    "Joy".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` in current directory (optional)
    /// 3. Environment variables with `MOODTUNES_` prefix
    /// 4. Plain `BASE_URL` and `PORT`
    ///
    /// Environment variables use double underscore for nesting:
    /// - `MOODTUNES_SERVER__PORT=9000` sets `server.port`
    /// - `MOODTUNES_MEDIA__ROOT=/srv/music` sets `media.root`
    pub fn load() -> Result<Self, AppError> {
        Self::load_from("config.toml")
    }

    /// Load configuration from a specific file path.
    pub fn load_from(config_path: &str) -> Result<Self, AppError> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.trim().parse::<i64>().ok());
        let base_url = std::env::var("BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let config = ConfigLoader::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.path", "./data/moodtunes.db")?
            .set_default("media.root", "./data/media")?
            .set_default("media.max_upload_mb", 10)?
            .set_default("media.max_thumbnail_mb", 5)?
            .add_source(File::with_name(config_path).required(false))
            // MOODTUNES_SERVER__PORT=9000 -> server.port = 9000
            .add_source(
                Environment::with_prefix("MOODTUNES")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", port)?
            .set_override_option("server.base_url", base_url)?
            .build()?;

        let config: Config = config.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values that cannot be checked by serde.
    fn validate(&self) -> Result<(), AppError> {
        self.base_url()?;

        if self.media.audio_extensions.is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "media.audio_extensions must list at least one extension".to_string(),
            )));
        }

        if self.server.base_url.is_none() {
            tracing::warn!(
                "BASE_URL not configured - media URLs will use http://localhost:{}",
                self.server.port
            );
        }

        if self.server.expose_errors {
            tracing::warn!("Internal error details are exposed to clients");
        }

        Ok(())
    }

    /// Parsed public base URL.
    pub fn base_url(&self) -> Result<BaseUrl, AppError> {
        let raw = self
            .server
            .base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.server.port));
        Ok(BaseUrl::parse(&raw)?)
    }

    /// Resolver settings derived from the media section.
    ///
    /// Every path is made absolute against the working directory, so stored
    /// file paths are absolute and URL derivation can strip the roots.
    pub fn resolver_settings(&self) -> Result<ResolverSettings, AppError> {
        Ok(ResolverSettings {
            base_url: self.base_url()?,
            media_root: std::path::absolute(&self.media.root)?,
            thumbnail_root: std::path::absolute(self.media.thumbnail_dir())?,
            default_thumbnail: std::path::absolute(self.media.default_thumbnail())?,
            default_playlist_thumbnail: std::path::absolute(
                self.media.default_playlist_thumbnail(),
            )?,
            legacy_roots: self
                .media
                .legacy_roots
                .iter()
                .map(std::path::absolute)
                .collect::<std::io::Result<_>>()?,
        })
    }

    /// Get the server socket address
    pub fn server_addr(&self) -> std::net::SocketAddr {
        use std::net::{IpAddr, Ipv4Addr, SocketAddr};
        let ip: IpAddr = self.server.host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid host '{}', using 0.0.0.0", self.server.host);
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        });
        SocketAddr::new(ip, self.server.port)
    }
}
