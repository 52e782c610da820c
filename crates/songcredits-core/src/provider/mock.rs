//! Scripted provider for engine tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{Control, Playback, Provider, ProviderKind};
use crate::error::{AuthError, ProviderError, Result};
use crate::track::{Field, PlaybackState, Track};

/// Replays a queue of fetch results. Once the queue is empty the last
/// result is repeated.
pub struct MockProvider {
    kind: ProviderKind,
    script: Mutex<VecDeque<std::result::Result<Playback, ProviderError>>>,
    last: Mutex<Option<Playback>>,
    controls: Mutex<Vec<Control>>,
    fetches: AtomicUsize,
    authorized: AtomicUsize,
    reject_authorize: AtomicBool,
    closed: AtomicBool,
}

impl MockProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            controls: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            authorized: AtomicUsize::new(0),
            reject_authorize: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn push(&self, result: std::result::Result<Playback, ProviderError>) -> &Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn push_playing(&self, title: &str) -> &Self {
        self.push(Ok(playing(title)))
    }

    pub fn push_stopped(&self) -> &Self {
        self.push(Ok(Playback::stopped()))
    }

    /// Make every `authorize` call fail
    pub fn fail_authorize(&self) -> &Self {
        self.reject_authorize.store(true, Ordering::SeqCst);
        self
    }

    pub fn controls(&self) -> Vec<Control> {
        self.controls.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn authorized(&self) -> usize {
        self.authorized.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub fn track(title: &str) -> Track {
    Track::builder()
        .field(Field::Title, title)
        .field(Field::Artist, "Artist")
        .build()
}

pub fn playing(title: &str) -> Playback {
    Playback::new(PlaybackState::Playing, Some(track(title)))
}

impl Provider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn fetch(&self) -> std::result::Result<Playback, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(Ok(playback)) => {
                *last = Some(playback.clone());
                Ok(playback)
            }
            Some(Err(e)) => Err(e),
            None => Ok(last.clone().unwrap_or_default()),
        }
    }

    fn transport(&self, control: Control) -> std::result::Result<bool, ProviderError> {
        self.controls.lock().unwrap().push(control);
        Ok(true)
    }

    fn authorize(&self) -> Result<()> {
        self.authorized.fetch_add(1, Ordering::SeqCst);
        if self.reject_authorize.load(Ordering::SeqCst) {
            return Err(AuthError::NoRefreshToken.into());
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
