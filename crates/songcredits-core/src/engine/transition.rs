use std::sync::Arc;

use crate::provider::Playback;
use crate::track::{PlaybackState, Track};

/// Outcome of one tick relative to the previous one
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// A track is present and differs from the last one fanned out
    NewSong(Arc<Track>),
    /// Playback entered `Stopped`
    Stopped,
    Unchanged,
}

impl Transition {
    /// Classify `playback` against the previous tick.
    ///
    /// A `last_state` of `None` means there was no previous tick, which counts
    /// as a change: the first `Stopped` tick writes the placeholder.
    pub fn classify(
        last_state: Option<PlaybackState>,
        last_track: Option<&Track>,
        playback: &Playback,
    ) -> Self {
        if let Some(track) = &playback.track {
            if last_track != Some(track.as_ref()) {
                return Self::NewSong(Arc::clone(track));
            }
        }

        if playback.state == PlaybackState::Stopped && last_state != Some(PlaybackState::Stopped)
        {
            return Self::Stopped;
        }

        Self::Unchanged
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

/// Last-known pair, written only by the tick handler.
///
/// `last_track` only changes on a new song, so a stop followed by the same
/// track does not rewrite it.
#[derive(Debug, Default)]
pub(super) struct TickState {
    pub last_state: Option<PlaybackState>,
    pub last_track: Option<Arc<Track>>,
}

impl TickState {
    /// Classify `playback` and remember it
    pub fn advance(&mut self, playback: &Playback) -> Transition {
        let transition =
            Transition::classify(self.last_state, self.last_track.as_deref(), playback);
        self.last_state = Some(playback.state);
        if let Transition::NewSong(track) = &transition {
            self.last_track = Some(Arc::clone(track));
        }
        transition
    }

    /// Forget the last state so the next `Stopped` tick writes the placeholder
    pub fn clear_state(&mut self) {
        self.last_state = None;
    }

    /// Forget both state and track, for a new provider
    pub fn reset(&mut self) {
        self.last_state = None;
        self.last_track = None;
    }
}
