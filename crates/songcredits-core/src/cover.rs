//! Cover image destination.
//!
//! On a new song the track's cover is copied to `general.coverFile`: remote
//! URLs are downloaded, `file://` URLs and plain paths are copied. When
//! playback stops (or the track has no cover) the placeholder cover is copied
//! instead, if one is configured.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::GeneralConfig;
use crate::error::SinkError;
use crate::provider::http::agent;
use crate::schedule::WorkerPool;
use crate::track::Track;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

pub struct CoverUpdater {
    destination: Option<PathBuf>,
    placeholder: Option<PathBuf>,
    agent: ureq::Agent,
}

impl CoverUpdater {
    pub fn from_config(config: &GeneralConfig) -> Self {
        let placeholder = if config.default_placeholder_cover {
            config.placeholder_cover_file.clone()
        } else {
            None
        };
        Self {
            destination: config.cover_file.clone(),
            placeholder,
            agent: agent(DOWNLOAD_TIMEOUT),
        }
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.destination.is_some()
    }

    /// Update the destination for `track`, or for "nothing playing"
    pub fn update(&self, track: Option<&Track>) -> Result<(), SinkError> {
        let Some(destination) = self.destination.as_deref() else {
            return Ok(());
        };

        match track.and_then(Track::cover_url) {
            Some(url) => self.store(url, destination),
            None => self.clear(destination),
        }
    }

    /// Run [`update`](Self::update) on `pool`, keyed by the destination file
    pub fn dispatch(self: &Arc<Self>, pool: &WorkerPool, track: Option<Arc<Track>>) {
        let Some(destination) = self.destination.clone() else {
            return;
        };
        let updater = Arc::clone(self);
        pool.execute(&destination, move || {
            if let Err(e) = updater.update(track.as_deref()) {
                warn!("Failed to update cover: {}", e);
            }
        });
    }

    fn store(&self, url: &str, destination: &Path) -> Result<(), SinkError> {
        let result = if url.starts_with("http://") || url.starts_with("https://") {
            self.download(url)
                .and_then(|bytes| fs::write(destination, bytes))
        } else {
            fs::copy(local_path(url), destination).map(|_| ())
        };
        result.map_err(|source| SinkError {
            path: destination.to_path_buf(),
            source,
        })?;
        debug!("Cover updated from {}", url);
        Ok(())
    }

    fn clear(&self, destination: &Path) -> Result<(), SinkError> {
        let Some(placeholder) = self.placeholder.as_deref() else {
            return Ok(());
        };
        fs::copy(placeholder, destination).map_err(|source| SinkError {
            path: destination.to_path_buf(),
            source,
        })?;
        debug!("Cover reset to placeholder");
        Ok(())
    }

    fn download(&self, url: &str) -> io::Result<Vec<u8>> {
        let mut response = self.agent.get(url).call().map_err(io::Error::other)?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(io::Error::other(format!("HTTP {} for {}", status, url)));
        }
        response.body_mut().read_to_vec().map_err(io::Error::other)
    }
}

/// Path of a `file://` URL or a plain path
fn local_path(url: &str) -> PathBuf {
    match url.strip_prefix("file://") {
        Some(rest) => {
            let decoded = urlencoding::decode(rest)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| rest.to_string());
            PathBuf::from(decoded)
        }
        None => PathBuf::from(url),
    }
}
