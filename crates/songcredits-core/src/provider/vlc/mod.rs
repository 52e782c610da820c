//! VLC adapter.
//!
//! Polls `http://host:port/requests/status.json` with HTTP basic auth (empty
//! user name, configured password). There is no session, so `authorize` is a
//! no-op. "Connection refused" means VLC is not running and is reported as a
//! transient error; the engine polls on quietly in that case.

pub mod setup;

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::http::{agent, excerpt, parse_json, read_body, transport_error};
use super::{Control, Playback, Provider, ProviderKind};
use crate::config::VlcConfig;
use crate::error::{ProviderError, Result};
use crate::track::{Field, PlaybackState, Track};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct StatusResponse {
    state: String,
    /// Length of the current item in seconds
    #[serde(default)]
    length: Option<f64>,
    /// Position as a fraction of `length`
    #[serde(default)]
    position: Option<f64>,
    #[serde(default)]
    information: Option<Information>,
}

#[derive(Debug, Deserialize)]
struct Information {
    #[serde(default)]
    category: Category,
}

#[derive(Debug, Default, Deserialize)]
struct Category {
    #[serde(default)]
    meta: Map<String, Value>,
}

pub struct VlcProvider {
    base_url: String,
    authorization: String,
    agent: ureq::Agent,
}

impl VlcProvider {
    pub fn new(config: &VlcConfig) -> Result<Self> {
        let host = VlcConfig::normalize_host(&config.host);
        let base_url = format!("http://{}:{}/requests", host, config.port);
        let password = config.password.as_deref().unwrap_or("");
        let authorization = format!("Basic {}", STANDARD.encode(format!(":{}", password)));

        debug!("VLC endpoint: {}", base_url);
        Ok(Self {
            base_url,
            authorization,
            agent: agent(REQUEST_TIMEOUT),
        })
    }

    fn request(
        &self,
        operation: &'static str,
        command: Option<&str>,
    ) -> std::result::Result<StatusResponse, ProviderError> {
        let url = match command {
            Some(command) => format!("{}/status.json?command={}", self.base_url, command),
            None => format!("{}/status.json", self.base_url),
        };

        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &self.authorization)
            .call()
            .map_err(|e| transport_error(operation, e))?;

        let status = response.status().as_u16();
        let body = read_body(operation, &mut response)?;
        match status {
            200..=299 => parse_json(operation, &body),
            401 => Err(ProviderError::permanent(
                operation,
                "authorization rejected, check the VLC HTTP password",
            )),
            _ => Err(ProviderError::permanent(
                operation,
                format!("HTTP {}: {}", status, excerpt(&body)),
            )),
        }
    }
}

impl Provider for VlcProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Vlc
    }

    fn fetch(&self) -> std::result::Result<Playback, ProviderError> {
        let status = self.request("fetch VLC status", None)?;
        playback_from_status(status)
    }

    fn transport(&self, control: Control) -> std::result::Result<bool, ProviderError> {
        let (command, expected) = match control {
            Control::Next => ("pl_next", PlaybackState::Playing),
            Control::Previous => ("pl_previous", PlaybackState::Playing),
            Control::Pause => ("pl_pause", PlaybackState::Paused),
            Control::Resume => ("pl_forceresume", PlaybackState::Playing),
        };
        let status = self.request("send VLC command", Some(command))?;
        Ok(parse_state(&status.state)? == expected)
    }

    fn authorize(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) {}
}

fn parse_state(state: &str) -> std::result::Result<PlaybackState, ProviderError> {
    state.parse().map_err(|_| {
        ProviderError::permanent("parse VLC state", format!("unknown state '{}'", state))
    })
}

fn playback_from_status(status: StatusResponse) -> std::result::Result<Playback, ProviderError> {
    let state = parse_state(&status.state)?;
    let track = status
        .information
        .map(|information| track_from_meta(information.category.meta));

    let mut playback = Playback::new(state, track);
    if let (Some(length), Some(position)) = (status.length, status.position) {
        if length >= 0.0 {
            let length = Duration::from_secs_f64(length);
            let position = length.mul_f64(position.clamp(0.0, 1.0));
            playback = playback.with_progress(position, length);
        }
    }
    Ok(playback)
}

fn track_from_meta(meta: Map<String, Value>) -> Track {
    let mut builder = Track::builder();
    for (key, value) in meta {
        let value = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        builder = builder.insert(&key, value);
    }

    // VLC reports the file as "filename"; expose it under the well-known id too
    if let Some(file_name) = builder.get_extra("filename").map(str::to_string) {
        builder = builder.field(Field::FileName, file_name);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYING: &str = r#"{
        "state": "playing",
        "length": 200,
        "position": 0.25,
        "information": {
            "category": {
                "meta": {
                    "TITLE": "Foo",
                    "artist": "Bar",
                    "album": "Baz",
                    "filename": "foo.mp3",
                    "track_number": 3
                },
                "Stream 0": {"Codec": "MPEG Audio"}
            }
        }
    }"#;

    fn parse(json: &str) -> Playback {
        let status: StatusResponse = serde_json::from_str(json).unwrap();
        playback_from_status(status).unwrap()
    }

    #[test]
    fn test_playing_status() {
        let playback = parse(PLAYING);
        assert_eq!(playback.state, PlaybackState::Playing);

        let track = playback.track.unwrap();
        assert_eq!(track.get("title"), Some("Foo"));
        assert_eq!(track.get("artist"), Some("Bar"));
        assert_eq!(track.get("album"), Some("Baz"));
        assert_eq!(track.get("file_name"), Some("foo.mp3"));
        assert_eq!(track.get("filename"), Some("foo.mp3"));
        assert_eq!(track.get("track_number"), Some("3"));

        assert_eq!(playback.length, Some(Duration::from_secs(200)));
        assert_eq!(playback.position, Some(Duration::from_secs(50)));
    }

    #[test]
    fn test_stopped_status_without_information() {
        let playback = parse(r#"{"state": "stopped", "length": 0, "position": 0}"#);
        assert_eq!(playback.state, PlaybackState::Stopped);
        assert!(playback.track.is_none());
    }

    #[test]
    fn test_unknown_state_is_permanent() {
        let status: StatusResponse = serde_json::from_str(r#"{"state": "buffering"}"#).unwrap();
        let err = playback_from_status(status).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_authorization_header() {
        let config = VlcConfig {
            password: Some("secret".to_string()),
            ..VlcConfig::default()
        };
        let provider = VlcProvider::new(&config).unwrap();
        // base64(":secret")
        assert_eq!(provider.authorization, "Basic OnNlY3JldA==");
        assert_eq!(provider.base_url, "http://localhost:8080/requests");
    }

    #[test]
    fn test_fetch_without_player_is_transient() {
        // Bind and drop a listener to get a port nobody listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = VlcConfig {
            host: "127.0.0.1".to_string(),
            port,
            password: Some("pw".to_string()),
            ..VlcConfig::default()
        };
        let provider = VlcProvider::new(&config).unwrap();
        let err = provider.fetch().unwrap_err();
        assert!(err.is_transient(), "unexpected error: {}", err);
    }
}
