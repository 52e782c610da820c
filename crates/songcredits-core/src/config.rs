//! JSON configuration store.
//!
//! The whole configuration lives in one JSON document. Readers take cheap
//! snapshots; writers mutate through [`ConfigStore::update`] and persist with
//! [`ConfigStore::save`] or [`ConfigStore::save_quietly`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::provider::ProviderKind;

/// Default text written to sinks when nothing is playing
pub const DEFAULT_PLACEHOLDER_TEXT: &str = "No Song playing";

/// Root of the configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub sources: SourcesConfig,
}

/// Settings shared by every provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralConfig {
    pub placeholder_text: String,
    /// Destination the current cover image is copied to
    pub cover_file: Option<PathBuf>,
    /// Copy `placeholder_cover_file` to `cover_file` when playback stops
    pub default_placeholder_cover: bool,
    pub placeholder_cover_file: Option<PathBuf>,
    /// Delay (ms) before refreshing after a transport control
    pub click_refresh_delay: u64,
    pub output_formatters: Vec<SinkConfig>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            placeholder_text: DEFAULT_PLACEHOLDER_TEXT.to_string(),
            cover_file: None,
            default_placeholder_cover: true,
            placeholder_cover_file: None,
            click_refresh_delay: 500,
            output_formatters: Vec::new(),
        }
    }
}

/// Persisted representation of one output sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub file: PathBuf,
    pub format: String,
    #[serde(default)]
    pub append: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourcesConfig {
    pub active: Option<ProviderKind>,
    pub vlc: VlcConfig,
    pub spotify: SpotifyConfig,
}

/// Settings for the VLC HTTP interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VlcConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Polling interval in milliseconds
    pub refresh_rate: u64,
    /// Path to the `vlcrc` file used by `vlc-setup`
    pub config_file: Option<PathBuf>,
}

impl Default for VlcConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            password: None,
            refresh_rate: 1000,
            config_file: None,
        }
    }
}

impl VlcConfig {
    pub fn is_complete(&self) -> bool {
        !self.host.is_empty() && self.password.is_some()
    }

    /// Reduce user input such as `http://127.0.0.1:8080/` to a bare host name
    pub fn normalize_host(raw: &str) -> String {
        let mut host = raw.trim();
        if let Some(index) = host.find("://") {
            host = &host[index + 3..];
        }
        if let Some(index) = host.find('/') {
            host = &host[..index];
        }
        if let Some(index) = host.rfind(':') {
            // Keep bracketed IPv6 literals intact
            if !host[index..].contains(']') {
                host = &host[..index];
            }
        }
        if host.is_empty() {
            "localhost".to_string()
        } else {
            host.to_string()
        }
    }
}

/// Settings for the Spotify Web API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Treat a paused player as stopped
    pub count_paused_as_stopped: bool,
    /// Polling interval in milliseconds
    pub refresh_rate: u64,
    /// Loopback port of the login callback listener
    pub callback_port: u16,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    /// Expiry of `access_token` as Unix milliseconds
    pub access_token_expire: Option<i64>,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            count_paused_as_stopped: true,
            refresh_rate: 2000,
            callback_port: 8888,
            refresh_token: None,
            access_token: None,
            access_token_expire: None,
        }
    }
}

impl SpotifyConfig {
    pub fn is_complete(&self) -> bool {
        self.client_id.as_deref().is_some_and(|s| !s.is_empty())
            && self.client_secret.as_deref().is_some_and(|s| !s.is_empty())
    }
}

impl AppConfig {
    /// Polling interval configured for `kind`
    pub fn refresh_rate(&self, kind: ProviderKind) -> Duration {
        let millis = match kind {
            ProviderKind::Vlc => self.sources.vlc.refresh_rate,
            ProviderKind::Spotify => self.sources.spotify.refresh_rate,
        };
        Duration::from_millis(millis.max(1))
    }

    pub fn is_complete(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Vlc => self.sources.vlc.is_complete(),
            ProviderKind::Spotify => self.sources.spotify.is_complete(),
        }
    }
}

/// Config document bound to its file
pub struct ConfigStore {
    path: PathBuf,
    config: RwLock<AppConfig>,
}

impl ConfigStore {
    /// Load the config from `path`, writing defaults if the file does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let config = match fs::read_to_string(&path) {
            Ok(content) => {
                let config: AppConfig = serde_json::from_str(&content)?;
                debug!("Loaded config from {}", path.display());
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Config {} not found, writing defaults", path.display());
                let store = Self::new(&path, AppConfig::default());
                store.save()?;
                return Ok(store);
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self::new(path, config))
    }

    /// Bind an in-memory config to `path` without touching the file
    pub fn new<P: AsRef<Path>>(path: P, config: AppConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config: RwLock::new(config),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current config
    pub fn snapshot(&self) -> AppConfig {
        self.config
            .read()
            .map(|config| config.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Mutate the in-memory config. Call [`save`](Self::save) to persist.
    pub fn update<R>(&self, f: impl FnOnce(&mut AppConfig) -> R) -> R {
        let mut config = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut config)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.snapshot())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, content)?;
        debug!("Saved config to {}", self.path.display());
        Ok(())
    }

    /// Save, logging instead of returning the failure
    pub fn save_quietly(&self) -> bool {
        match self.save() {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save config {}: {}", self.path.display(), e);
                false
            }
        }
    }

    /// Register a sink. Destinations are compared by canonical path.
    pub fn add_sink(&self, mut sink: SinkConfig) -> Result<()> {
        sink.file = canonical_path(&sink.file);
        self.update(|config| {
            let sinks = &mut config.general.output_formatters;
            if sinks
                .iter()
                .any(|existing| canonical_path(&existing.file) == sink.file)
            {
                return Err(Error::DuplicateSink(sink.file.clone()));
            }
            sinks.push(sink);
            Ok(())
        })
    }

    /// Remove the sink writing to `file`
    pub fn remove_sink(&self, file: &Path) -> Result<SinkConfig> {
        let file = canonical_path(file);
        self.update(|config| {
            let sinks = &mut config.general.output_formatters;
            let index = sinks
                .iter()
                .position(|existing| canonical_path(&existing.file) == file)
                .ok_or_else(|| Error::UnknownSink(file.clone()))?;
            Ok(sinks.remove(index))
        })
    }
}

/// Canonical form of a destination path, even if the file does not exist yet
pub fn canonical_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| absolute.clone()),
        _ => absolute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let store = ConfigStore::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.snapshot(), AppConfig::default());
    }

    #[test]
    fn test_camel_case_round_trip() {
        let json = r#"{
            "general": {
                "placeholderText": "idle",
                "clickRefreshDelay": 250,
                "outputFormatters": [
                    {"file": "/tmp/song.txt", "format": "{title}", "append": true}
                ]
            },
            "sources": {
                "active": "spotify",
                "spotify": {"clientId": "id", "clientSecret": "secret", "accessTokenExpire": 42}
            }
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.general.placeholder_text, "idle");
        assert_eq!(config.general.click_refresh_delay, 250);
        assert!(config.general.default_placeholder_cover);
        assert_eq!(config.general.output_formatters.len(), 1);
        assert!(config.general.output_formatters[0].append);
        assert_eq!(config.sources.active, Some(ProviderKind::Spotify));
        assert!(config.sources.spotify.is_complete());
        assert!(config.sources.spotify.count_paused_as_stopped);
        assert_eq!(config.sources.spotify.access_token_expire, Some(42));
        assert_eq!(config.sources.vlc.port, 8080);

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["general"]["placeholderText"], "idle");
        assert_eq!(value["sources"]["spotify"]["clientId"], "id");
    }

    #[test]
    fn test_add_sink_rejects_duplicate_path() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"), AppConfig::default());

        let file = dir.path().join("song.txt");
        store
            .add_sink(SinkConfig {
                file: file.clone(),
                format: "{title}".to_string(),
                append: false,
            })
            .unwrap();

        let same_file = dir.path().join(".").join("song.txt");
        let err = store
            .add_sink(SinkConfig {
                file: same_file,
                format: "{artist}".to_string(),
                append: true,
            })
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateSink(_)));
        assert_eq!(store.snapshot().general.output_formatters.len(), 1);
    }

    #[test]
    fn test_remove_sink() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"), AppConfig::default());
        let file = dir.path().join("song.txt");
        store
            .add_sink(SinkConfig {
                file: file.clone(),
                format: "{title}".to_string(),
                append: false,
            })
            .unwrap();

        let removed = store.remove_sink(&file).unwrap();
        assert_eq!(removed.format, "{title}");
        assert!(matches!(
            store.remove_sink(&file).unwrap_err(),
            Error::UnknownSink(_)
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let store = ConfigStore::load(&path).unwrap();
        store.update(|config| {
            config.sources.active = Some(ProviderKind::Vlc);
            config.sources.vlc.password = Some("secret".to_string());
        });
        assert!(store.save_quietly());

        let reloaded = ConfigStore::load(&path).unwrap().snapshot();
        assert_eq!(reloaded.sources.active, Some(ProviderKind::Vlc));
        assert!(reloaded.is_complete(ProviderKind::Vlc));
        assert!(!reloaded.is_complete(ProviderKind::Spotify));
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(VlcConfig::normalize_host("http://127.0.0.1:8080/"), "127.0.0.1");
        assert_eq!(VlcConfig::normalize_host("media-box"), "media-box");
        assert_eq!(VlcConfig::normalize_host("https://media-box/requests"), "media-box");
        assert_eq!(VlcConfig::normalize_host(""), "localhost");
        assert_eq!(VlcConfig::normalize_host("[::1]"), "[::1]");
    }

    #[test]
    fn test_refresh_rate() {
        let config = AppConfig::default();
        assert_eq!(
            config.refresh_rate(ProviderKind::Vlc),
            Duration::from_millis(1000)
        );
        assert_eq!(
            config.refresh_rate(ProviderKind::Spotify),
            Duration::from_millis(2000)
        );
    }
}
