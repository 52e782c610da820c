//! Spotify adapter.
//!
//! Every request carries the bearer token held by the [`AuthSupervisor`].
//! Track details are fetched once per track id and reused while the same
//! track keeps playing.

mod api;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use self::api::{CurrentlyPlaying, TrackObject};
use super::http::{agent, excerpt, parse_json, read_body, transport_error};
use super::{Control, Playback, Provider, ProviderKind};
use crate::auth::AuthSupervisor;
use crate::config::ConfigStore;
use crate::error::{ProviderError, Result};
use crate::track::Track;

pub const API_BASE: &str = "https://api.spotify.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SpotifyProvider {
    store: Arc<ConfigStore>,
    auth: AuthSupervisor,
    api_base: String,
    agent: ureq::Agent,
    /// Details of the last track, keyed by track id
    details: Mutex<Option<(String, Arc<Track>)>>,
}

enum Method {
    Get,
    Post,
    Put,
}

impl SpotifyProvider {
    pub fn new(store: Arc<ConfigStore>) -> Result<Self> {
        Self::with_api_base(store, API_BASE)
    }

    fn with_api_base(store: Arc<ConfigStore>, api_base: &str) -> Result<Self> {
        let auth = AuthSupervisor::new(Arc::clone(&store))?;
        Ok(Self {
            store,
            auth,
            api_base: api_base.trim_end_matches('/').to_string(),
            agent: agent(REQUEST_TIMEOUT),
            details: Mutex::new(None),
        })
    }

    pub fn auth(&self) -> &AuthSupervisor {
        &self.auth
    }

    /// Send one API request, returning the status and body of a 2xx response
    fn request(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
    ) -> std::result::Result<(u16, String), ProviderError> {
        let token = self
            .auth
            .access_token()
            .ok_or_else(|| ProviderError::permanent(operation, "not logged in to Spotify"))?;
        let url = format!("{}{}", self.api_base, path);
        let bearer = format!("Bearer {}", token);

        let result = match method {
            Method::Get => self.agent.get(&url).header("Authorization", &bearer).call(),
            Method::Post => self
                .agent
                .post(&url)
                .header("Authorization", &bearer)
                .send_empty(),
            Method::Put => self
                .agent
                .put(&url)
                .header("Authorization", &bearer)
                .send_empty(),
        };
        let mut response = result.map_err(|e| transport_error(operation, e))?;

        let status = response.status().as_u16();
        let body = read_body(operation, &mut response)?;
        match status {
            200..=299 => Ok((status, body)),
            401 | 429 | 500..=599 => Err(ProviderError::transient(
                operation,
                format!("HTTP {}: {}", status, excerpt(&body)),
            )),
            _ => Err(ProviderError::permanent(
                operation,
                format!("HTTP {}: {}", status, excerpt(&body)),
            )),
        }
    }

    fn track_details(&self, id: &str) -> std::result::Result<Arc<Track>, ProviderError> {
        let mut details = self.details.lock().unwrap_or_else(|p| p.into_inner());
        if let Some((cached_id, track)) = details.as_ref() {
            if cached_id == id {
                return Ok(Arc::clone(track));
            }
        }

        let operation = "fetch Spotify track";
        let (_, body) = self.request(operation, Method::Get, &format!("/tracks/{}", id))?;
        let object: TrackObject = parse_json(operation, &body)?;
        let track = Arc::new(object.into_track());
        debug!("Fetched Spotify track {}: {}", id, track.describe());

        *details = Some((id.to_string(), Arc::clone(&track)));
        Ok(track)
    }
}

impl Provider for SpotifyProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Spotify
    }

    fn fetch(&self) -> std::result::Result<Playback, ProviderError> {
        let operation = "fetch Spotify player";
        let (status, body) =
            self.request(operation, Method::Get, "/me/player/currently-playing")?;
        if status == 204 || body.trim().is_empty() {
            return Ok(Playback::stopped());
        }

        let current: CurrentlyPlaying = parse_json(operation, &body)?;
        let count_paused_as_stopped = self
            .store
            .snapshot()
            .sources
            .spotify
            .count_paused_as_stopped;
        let state = current.state(count_paused_as_stopped);

        // A paused item is not reported as the current song
        let item = current.item.as_ref();
        let track = match item.and_then(|item| item.id.as_deref()) {
            Some(id) if current.is_playing => Some(self.track_details(id)?),
            _ => None,
        };

        let mut playback = Playback {
            state,
            track,
            position: None,
            length: None,
        };
        if let (Some(progress), Some(duration)) =
            (current.progress_ms, item.and_then(|item| item.duration_ms))
        {
            playback = playback.with_progress(
                Duration::from_millis(progress),
                Duration::from_millis(duration),
            );
        }
        Ok(playback)
    }

    fn transport(&self, control: Control) -> std::result::Result<bool, ProviderError> {
        let (method, path) = match control {
            Control::Next => (Method::Post, "/me/player/next"),
            Control::Previous => (Method::Post, "/me/player/previous"),
            Control::Pause => (Method::Put, "/me/player/pause"),
            Control::Resume => (Method::Put, "/me/player/play"),
        };
        match self.request("send Spotify command", method, path) {
            Ok(_) => Ok(true),
            // Restriction violated (already paused, no active device, ...)
            Err(ProviderError::Permanent { message, .. }) if message.starts_with("HTTP 403") => {
                debug!("Spotify refused {}: {}", control, message);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn authorize(&self) -> Result<()> {
        self.auth.authorize()
    }

    fn close(&self) {
        self.auth.close();
    }
}
