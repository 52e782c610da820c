//! # songcredits-core
//!
//! Core library for the SongCredits now-playing exporter.
//!
//! This crate provides:
//! - The track model and playback state shared by every provider
//! - Provider adapters for a local VLC instance and a Spotify account
//! - The Spotify authorization supervisor (login, token refresh, callback listener)
//! - Template-driven output sinks that write text files for stream overlays
//! - The polling engine that detects song transitions and fans them out
//! - A JSON configuration store and the application context that ties it together

pub mod auth;
pub mod config;
pub mod context;
pub mod cover;
pub mod engine;
pub mod error;
pub mod provider;
pub mod schedule;
pub mod sink;
pub mod track;

pub use auth::{AuthState, AuthSupervisor, Credential};
pub use config::{AppConfig, ConfigStore, GeneralConfig, SinkConfig, SpotifyConfig, VlcConfig};
pub use context::AppContext;
pub use cover::CoverUpdater;
pub use engine::{Engine, EngineState, EngineStatus, Transition};
pub use error::{AuthError, Error, ProviderError, Result, SinkError};
pub use provider::{Control, Playback, Provider, ProviderKind, create_provider};
pub use schedule::{CancelToken, TaskHandle, TimerSlot, WorkerPool};
pub use sink::{OutputSink, SinkSet, Template};
pub use track::{Field, PlaybackState, Track, TrackBuilder};
