//! Provider adapters.
//!
//! A provider normalizes one external "now playing" source into a
//! [`Playback`]. The set of providers is closed: [`ProviderKind`] names every
//! variant and [`create_provider`] resolves a kind to its adapter.
//!
//! - **VLC**: stateless polling of the local HTTP interface
//! - **Spotify**: Web API polling authorized by an [`AuthSupervisor`](crate::auth::AuthSupervisor)

pub(crate) mod http;
#[cfg(test)]
pub mod mock;
pub mod spotify;
pub mod vlc;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::config::ConfigStore;
use crate::error::{Error, ProviderError, Result};
use crate::track::{PlaybackState, Track};

pub use spotify::SpotifyProvider;
pub use vlc::VlcProvider;

/// Provider variants
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ProviderKind {
    #[strum(serialize = "VLC")]
    Vlc,
    #[strum(serialize = "Spotify")]
    Spotify,
}

impl ProviderKind {
    /// Key of this provider in the `sources` config object
    pub fn config_name(&self) -> &'static str {
        match self {
            Self::Vlc => "vlc",
            Self::Spotify => "spotify",
        }
    }

    pub fn display_name(&self) -> &'static str {
        self.into()
    }
}

/// Playback control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Control {
    Next,
    Previous,
    Pause,
    Resume,
}

/// Result of one provider fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Playback {
    pub state: PlaybackState,
    pub track: Option<Arc<Track>>,
    pub position: Option<Duration>,
    pub length: Option<Duration>,
}

impl Playback {
    pub fn new(state: PlaybackState, track: Option<Track>) -> Self {
        Self {
            state,
            track: track.map(Arc::new),
            position: None,
            length: None,
        }
    }

    pub fn stopped() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, position: Duration, length: Duration) -> Self {
        self.position = Some(position);
        self.length = Some(length);
        self
    }
}

/// Capability set every provider adapter implements.
///
/// All methods may be called from several threads; implementations keep any
/// mutable state behind their own locks.
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// One synchronous round-trip to the provider
    fn fetch(&self) -> std::result::Result<Playback, ProviderError>;

    /// Issue a playback control. Returns whether the provider reached the
    /// expected state afterwards.
    fn transport(&self, control: Control) -> std::result::Result<bool, ProviderError>;

    /// Establish or refresh the session the adapter needs. Idempotent.
    fn authorize(&self) -> Result<()>;

    /// Release adapter-owned resources
    fn close(&self);
}

/// Build the adapter for `kind` from the current configuration
pub fn create_provider(kind: ProviderKind, store: &Arc<ConfigStore>) -> Result<Arc<dyn Provider>> {
    let config = store.snapshot();
    if !config.is_complete(kind) {
        return Err(Error::IncompleteConfig(kind));
    }

    let provider: Arc<dyn Provider> = match kind {
        ProviderKind::Vlc => Arc::new(VlcProvider::new(&config.sources.vlc)?),
        ProviderKind::Spotify => Arc::new(SpotifyProvider::new(Arc::clone(store))?),
    };
    Ok(provider)
}
