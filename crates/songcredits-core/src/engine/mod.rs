//! Polling engine.
//!
//! ```text
//! Stopped -> Starting -> Running -(tick)-> Running -> Stopping -> Stopped
//! ```
//!
//! A repeating timer thread calls the active provider's `fetch` once per
//! refresh interval. Ticks never overlap: the tick lock is held from fetch to
//! classification. Qualifying transitions are handed to the worker pool, so
//! slow file writes or cover downloads never delay the next tick.
//!
//! Errors never stop the timer. The VLC "not running" case is ignored
//! quietly, everything else is logged and recorded in the status snapshot.

mod transition;

pub use transition::Transition;

use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Local};
use strum::{Display, IntoStaticStr};
use tracing::{debug, info, trace, warn};

use self::transition::TickState;
use crate::config::ConfigStore;
use crate::cover::CoverUpdater;
use crate::error::{Error, ProviderError, Result};
use crate::provider::{Control, Playback, Provider, ProviderKind, create_provider};
use crate::schedule::{TimerSlot, WorkerPool, spawn_once, spawn_repeating};
use crate::sink::SinkSet;
use crate::track::{PlaybackState, Track};

/// Delay before the first scheduled tick after `start`
pub const INITIAL_DELAY: Duration = Duration::from_millis(20);
const FAN_OUT_THREADS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, IntoStaticStr)]
pub enum EngineState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Snapshot for status readers. May lag the tick handler slightly.
#[derive(Debug, Clone, Default)]
pub struct EngineStatus {
    pub state: EngineState,
    pub provider: Option<ProviderKind>,
    pub playback: PlaybackState,
    pub track: Option<Arc<Track>>,
    pub position: Option<Duration>,
    pub length: Option<Duration>,
    pub refresh_rate: Option<Duration>,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Local>>,
}

pub struct Engine {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<ConfigStore>,
    provider: RwLock<Option<Arc<dyn Provider>>>,
    sinks: RwLock<SinkSet>,
    cover: RwLock<Arc<CoverUpdater>>,
    pool: WorkerPool,
    ticker: TimerSlot,
    control_refresh: TimerSlot,
    /// Serializes start/stop/switch and holds the lifecycle state
    lifecycle: Mutex<EngineState>,
    tick: Mutex<TickState>,
    status: RwLock<EngineStatus>,
}

impl Engine {
    pub fn new(store: Arc<ConfigStore>) -> Result<Self> {
        let config = store.snapshot();
        let sinks = SinkSet::from_config(&config.general)?;
        let cover = CoverUpdater::from_config(&config.general);
        let pool = WorkerPool::new("fan-out", FAN_OUT_THREADS)?;

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                provider: RwLock::new(None),
                sinks: RwLock::new(sinks),
                cover: RwLock::new(Arc::new(cover)),
                pool,
                ticker: TimerSlot::new(),
                control_refresh: TimerSlot::new(),
                lifecycle: Mutex::new(EngineState::Stopped),
                tick: Mutex::new(TickState::default()),
                status: RwLock::new(EngineStatus::default()),
            }),
        })
    }

    pub fn state(&self) -> EngineState {
        *self.inner.lifecycle()
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    pub fn status(&self) -> EngineStatus {
        self.inner
            .status
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    pub fn provider(&self) -> Option<Arc<dyn Provider>> {
        self.inner.provider()
    }

    /// Install `provider`, closing the previous one. Does not start polling.
    pub fn set_provider(&self, provider: Arc<dyn Provider>) {
        let kind = provider.kind();
        let old = {
            let mut current = self.inner.provider.write().unwrap_or_else(|p| p.into_inner());
            current.replace(provider)
        };
        if let Some(old) = old {
            old.close();
        }
        self.inner.tick_state().reset();
        self.inner.update_status(|status| {
            status.provider = Some(kind);
            status.track = None;
            status.playback = PlaybackState::Stopped;
        });
    }

    /// Rebuild sinks and cover destination from the current configuration
    pub fn reload_outputs(&self) -> Result<()> {
        let config = self.inner.store.snapshot();
        let sinks = SinkSet::from_config(&config.general)?;
        debug!("Loaded {} output(s)", sinks.len());
        *self.inner.sinks.write().unwrap_or_else(|p| p.into_inner()) = sinks;
        *self.inner.cover.write().unwrap_or_else(|p| p.into_inner()) =
            Arc::new(CoverUpdater::from_config(&config.general));
        Ok(())
    }

    pub fn sink_count(&self) -> usize {
        self.inner.sinks().len()
    }

    /// Seed the status with one fetch and start the tick timer
    pub fn start(&self) -> Result<()> {
        let inner = &self.inner;
        let mut lifecycle = inner.lifecycle();
        if *lifecycle == EngineState::Running {
            return Ok(());
        }

        let provider = inner.provider().ok_or(Error::NoProvider)?;
        let kind = provider.kind();
        let config = inner.store.snapshot();
        if !config.is_complete(kind) {
            return Err(Error::IncompleteConfig(kind));
        }

        *lifecycle = EngineState::Starting;
        inner.update_status(|status| status.state = EngineState::Starting);

        match provider.fetch() {
            Ok(playback) => inner.record(&playback),
            Err(e) if is_quiet(kind, &e) => {
                debug!("{} is not running yet, polling anyway", kind);
            }
            Err(e) => {
                warn!("Failed to start polling {}: {}", kind, e);
                *lifecycle = EngineState::Stopped;
                inner.update_status(|status| {
                    status.state = EngineState::Stopped;
                    status.last_error = Some(e.to_string());
                });
                return Err(e.into());
            }
        }

        // A tick that raced the last stop may have re-seeded the state
        inner.tick_state().clear_state();

        let rate = config.refresh_rate(kind);
        if let Err(e) = inner.schedule_ticks(INITIAL_DELAY, rate) {
            *lifecycle = EngineState::Stopped;
            inner.update_status(|status| status.state = EngineState::Stopped);
            return Err(e.into());
        }

        *lifecycle = EngineState::Running;
        inner.update_status(|status| {
            status.state = EngineState::Running;
            status.provider = Some(kind);
            status.refresh_rate = Some(rate);
        });
        info!("Polling {} every {}ms", kind, rate.as_millis());
        Ok(())
    }

    /// Stop scheduling ticks. Fan-out already queued still completes.
    pub fn stop(&self) {
        let inner = &self.inner;
        let mut lifecycle = inner.lifecycle();
        if *lifecycle != EngineState::Running {
            return;
        }

        *lifecycle = EngineState::Stopping;
        inner.update_status(|status| status.state = EngineState::Stopping);
        inner.ticker.cancel();
        inner.control_refresh.cancel();
        inner.tick_state().clear_state();

        *lifecycle = EngineState::Stopped;
        inner.update_status(|status| {
            status.state = EngineState::Stopped;
            status.refresh_rate = None;
        });
        info!("Polling stopped");
    }

    /// Replace the tick timer with one at `rate`. No effect while stopped.
    pub fn update_refresh_rate(&self, rate: Duration) -> Result<()> {
        let inner = &self.inner;
        let lifecycle = inner.lifecycle();
        if *lifecycle != EngineState::Running {
            return Ok(());
        }

        inner.schedule_ticks(rate, rate)?;
        inner.update_status(|status| status.refresh_rate = Some(rate));
        debug!("Refresh rate changed to {}ms", rate.as_millis());
        Ok(())
    }

    /// Stop, replace the provider with a freshly authorized `kind`, and
    /// restart if polling was running before.
    ///
    /// An authorization failure is returned only after polling has been
    /// restarted, so a failed login never leaves the engine stopped.
    pub fn switch_provider(&self, kind: ProviderKind) -> Result<()> {
        let was_running = self.is_running();
        self.stop();

        let provider = create_provider(kind, &self.inner.store)?;
        self.install(provider, was_running)
    }

    fn install(&self, provider: Arc<dyn Provider>, restart: bool) -> Result<()> {
        let kind = provider.kind();
        self.set_provider(Arc::clone(&provider));

        self.inner.store.update(|config| config.sources.active = Some(kind));
        self.inner.store.save_quietly();
        info!("Switched provider to {}", kind);

        let authorized = provider.authorize();
        if let Err(e) = &authorized {
            warn!("Failed to authorize {}: {}", kind, e);
        }
        if restart {
            if let Err(e) = self.start() {
                if authorized.is_ok() {
                    return Err(e);
                }
                warn!("Failed to restart polling {}: {}", kind, e);
            }
        }
        authorized
    }

    /// Send a playback control, then refresh once after the click delay.
    ///
    /// Repeated calls within the delay collapse into a single refresh.
    pub fn control(&self, control: Control) -> Result<bool> {
        let provider = self.inner.provider().ok_or(Error::NoProvider)?;
        let reached = provider.transport(control)?;
        debug!("{} sent to {} (reached: {})", control, provider.kind(), reached);

        let delay = Duration::from_millis(self.inner.store.snapshot().general.click_refresh_delay);
        let weak = Arc::downgrade(&self.inner);
        self.inner.control_refresh.replace_with(|| {
            spawn_once("control-refresh", delay, move || {
                if let Some(inner) = weak.upgrade() {
                    if inner.is_running() {
                        inner.tick();
                    }
                }
            })
        })?;
        Ok(reached)
    }

    pub fn next(&self) -> Result<bool> {
        self.control(Control::Next)
    }

    pub fn previous(&self) -> Result<bool> {
        self.control(Control::Previous)
    }

    pub fn pause(&self) -> Result<bool> {
        self.control(Control::Pause)
    }

    pub fn resume(&self) -> Result<bool> {
        self.control(Control::Resume)
    }

    /// Pause when playing, resume otherwise
    pub fn toggle(&self) -> Result<bool> {
        match self.status().playback {
            PlaybackState::Playing => self.pause(),
            _ => self.resume(),
        }
    }

    /// Run one tick on the calling thread
    pub fn tick(&self) -> Option<Transition> {
        self.inner.tick()
    }

    /// Wait for queued fan-out work
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.inner.pool.wait_idle(timeout)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
        if let Some(provider) = self.inner.provider() {
            provider.close();
        }
    }
}

impl Inner {
    fn lifecycle(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.lifecycle.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn tick_state(&self) -> std::sync::MutexGuard<'_, TickState> {
        self.tick.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn is_running(&self) -> bool {
        *self.lifecycle() == EngineState::Running
    }

    fn provider(&self) -> Option<Arc<dyn Provider>> {
        self.provider
            .read()
            .map(|p| p.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    fn sinks(&self) -> SinkSet {
        self.sinks
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    fn cover(&self) -> Arc<CoverUpdater> {
        self.cover
            .read()
            .map(|c| Arc::clone(&c))
            .unwrap_or_else(|p| Arc::clone(&p.into_inner()))
    }

    fn update_status(&self, f: impl FnOnce(&mut EngineStatus)) {
        let mut status = self.status.write().unwrap_or_else(|p| p.into_inner());
        f(&mut status);
    }

    fn record(&self, playback: &Playback) {
        self.update_status(|status| {
            status.playback = playback.state;
            status.track = playback.track.clone();
            status.position = playback.position;
            status.length = playback.length;
            status.last_error = None;
            status.updated_at = Some(Local::now());
        });
    }

    fn schedule_ticks(self: &Arc<Self>, initial_delay: Duration, rate: Duration) -> Result<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.ticker.replace_with(|| {
            spawn_repeating("poll", initial_delay, rate, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.tick();
                }
            })
        })?;
        Ok(())
    }

    fn tick(&self) -> Option<Transition> {
        let provider = self.provider()?;
        let kind = provider.kind();

        let mut tick = self.tick_state();
        let playback = match provider.fetch() {
            Ok(playback) => playback,
            Err(e) if is_quiet(kind, &e) => {
                trace!("{} not reachable: {}", kind, e);
                return None;
            }
            Err(e) => {
                warn!("Tick failed ({}): {}", kind, e);
                self.update_status(|status| status.last_error = Some(e.to_string()));
                return None;
            }
        };

        let transition = tick.advance(&playback);
        drop(tick);

        self.record(&playback);
        self.fan_out(&transition);
        Some(transition)
    }

    fn fan_out(&self, transition: &Transition) {
        let track = match transition {
            Transition::NewSong(track) => {
                info!("Now playing: {}", track.describe());
                Some(Arc::clone(track))
            }
            Transition::Stopped => {
                info!("Playback stopped");
                None
            }
            Transition::Unchanged => return,
        };

        self.sinks().dispatch(&self.pool, track.clone());
        self.cover().dispatch(&self.pool, track);
    }
}

/// VLC reports "not running" as a transient error; it is not worth a warning
fn is_quiet(kind: ProviderKind, err: &ProviderError) -> bool {
    kind == ProviderKind::Vlc && err.is_transient()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, SinkConfig};
    use crate::provider::mock::{MockProvider, track};
    use std::fs;
    use std::path::PathBuf;
    use std::thread;
    use tempfile::TempDir;

    const IDLE: Duration = Duration::from_secs(5);

    fn store(dir: &TempDir, sinks: &[(&PathBuf, bool)]) -> Arc<ConfigStore> {
        let mut config = AppConfig::default();
        config.general.placeholder_text = "idle".to_string();
        config.general.click_refresh_delay = 30;
        config.sources.vlc.password = Some("pw".to_string());
        config.sources.vlc.refresh_rate = 60_000;
        config.general.output_formatters = sinks
            .iter()
            .map(|(path, append)| SinkConfig {
                file: path.to_path_buf(),
                format: "{title}".to_string(),
                append: *append,
            })
            .collect();
        Arc::new(ConfigStore::new(dir.path().join("config.json"), config))
    }

    fn engine_with(dir: &TempDir, sinks: &[(&PathBuf, bool)]) -> (Engine, Arc<MockProvider>) {
        let engine = Engine::new(store(dir, sinks)).unwrap();
        let mock = Arc::new(MockProvider::new(ProviderKind::Vlc));
        engine.set_provider(mock.clone());
        (engine, mock)
    }

    fn out(dir: &TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }

    #[test]
    fn test_two_different_tracks_fan_out_once_each() {
        let dir = TempDir::new().unwrap();
        let file = out(&dir, "song.txt");
        let (engine, mock) = engine_with(&dir, &[(&file, true)]);
        mock.push_playing("T1").push_playing("T2");

        assert!(matches!(engine.tick(), Some(Transition::NewSong(_))));
        assert!(engine.wait_idle(IDLE));
        assert_eq!(fs::read_to_string(&file).unwrap(), "T1\n");

        match engine.tick() {
            Some(Transition::NewSong(track)) => assert_eq!(track.title(), Some("T2")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(engine.wait_idle(IDLE));
        assert_eq!(fs::read_to_string(&file).unwrap(), "T1\nT2\n");
    }

    #[test]
    fn test_equal_track_does_not_fan_out() {
        let dir = TempDir::new().unwrap();
        let file = out(&dir, "song.txt");
        let (engine, mock) = engine_with(&dir, &[(&file, true)]);
        mock.push_playing("A").push_playing("A");

        engine.tick();
        assert_eq!(engine.tick(), Some(Transition::Unchanged));
        assert!(engine.wait_idle(IDLE));
        assert_eq!(fs::read_to_string(&file).unwrap(), "A\n");
    }

    #[test]
    fn test_stop_writes_placeholder_once() {
        let dir = TempDir::new().unwrap();
        let file = out(&dir, "song.txt");
        let (engine, mock) = engine_with(&dir, &[(&file, true)]);
        mock.push_playing("A").push_stopped().push_stopped();

        engine.tick();
        assert_eq!(engine.tick(), Some(Transition::Stopped));
        assert_eq!(engine.tick(), Some(Transition::Unchanged));
        assert!(engine.wait_idle(IDLE));
        assert_eq!(fs::read_to_string(&file).unwrap(), "A\nidle\n");
    }

    #[test]
    fn test_scenario_sequence() {
        let dir = TempDir::new().unwrap();
        let file = out(&dir, "song.txt");
        let (engine, mock) = engine_with(&dir, &[(&file, true)]);
        mock.push_stopped()
            .push_playing("A")
            .push_playing("A")
            .push_playing("B")
            .push_stopped();

        for _ in 0..5 {
            engine.tick();
        }
        assert!(engine.wait_idle(IDLE));
        assert_eq!(fs::read_to_string(&file).unwrap(), "idle\nA\nB\nidle\n");
    }

    #[test]
    fn test_failing_sink_does_not_block_sibling() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("missing").join("bad.txt");
        let good = out(&dir, "good.txt");
        let (engine, mock) = engine_with(&dir, &[(&bad, false), (&good, false)]);
        mock.push_playing("A");

        engine.tick();
        assert!(engine.wait_idle(IDLE));
        assert_eq!(fs::read_to_string(&good).unwrap(), "A");
        assert!(!bad.exists());
    }

    #[test]
    fn test_errors_do_not_advance_state() {
        let dir = TempDir::new().unwrap();
        let file = out(&dir, "song.txt");
        let (engine, mock) = engine_with(&dir, &[(&file, true)]);
        mock.push_playing("A")
            .push(Err(ProviderError::transient("fetch", "refused")))
            .push(Err(ProviderError::permanent("fetch", "garbage")))
            .push_playing("A");

        engine.tick();
        assert_eq!(engine.tick(), None);
        assert_eq!(engine.tick(), None);
        assert_eq!(engine.status().last_error.as_deref(), Some("fetch: garbage"));
        assert_eq!(engine.tick(), Some(Transition::Unchanged));
        assert!(engine.status().last_error.is_none());
    }

    #[test]
    fn test_start_requires_provider() {
        let dir = TempDir::new().unwrap();
        let engine = Engine::new(store(&dir, &[])).unwrap();
        assert!(matches!(engine.start(), Err(Error::NoProvider)));
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn test_start_requires_complete_config() {
        let dir = TempDir::new().unwrap();
        let engine = Engine::new(store(&dir, &[])).unwrap();
        engine.set_provider(Arc::new(MockProvider::new(ProviderKind::Spotify)));
        assert!(matches!(
            engine.start(),
            Err(Error::IncompleteConfig(ProviderKind::Spotify))
        ));
    }

    #[test]
    fn test_start_tolerates_player_not_running() {
        let dir = TempDir::new().unwrap();
        let (engine, mock) = engine_with(&dir, &[]);
        mock.push(Err(ProviderError::transient("fetch", "refused")));

        engine.start().unwrap();
        assert!(engine.is_running());
        engine.stop();
    }

    #[test]
    fn test_start_fails_on_permanent_error() {
        let dir = TempDir::new().unwrap();
        let (engine, mock) = engine_with(&dir, &[]);
        mock.push(Err(ProviderError::permanent("fetch", "bad password")));

        assert!(matches!(engine.start(), Err(Error::Provider(_))));
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn test_start_seeds_status_and_first_tick_runs() {
        let dir = TempDir::new().unwrap();
        let file = out(&dir, "song.txt");
        let (engine, mock) = engine_with(&dir, &[(&file, false)]);
        mock.push_playing("A");

        engine.start().unwrap();
        let status = engine.status();
        assert_eq!(status.state, EngineState::Running);
        assert_eq!(status.playback, PlaybackState::Playing);
        assert_eq!(status.refresh_rate, Some(Duration::from_secs(60)));

        // The first scheduled tick fires after the short initial delay
        thread::sleep(Duration::from_millis(200));
        assert!(mock.fetches() >= 2);
        assert!(engine.wait_idle(IDLE));
        assert_eq!(fs::read_to_string(&file).unwrap(), "A");
        engine.stop();
    }

    #[test]
    fn test_stop_twice() {
        let dir = TempDir::new().unwrap();
        let (engine, mock) = engine_with(&dir, &[]);
        mock.push_stopped();

        engine.start().unwrap();
        engine.stop();
        let first = engine.status();
        engine.stop();
        let second = engine.status();

        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(first.state, second.state);
        assert_eq!(first.refresh_rate, second.refresh_rate);
    }

    #[test]
    fn test_update_refresh_rate() {
        let dir = TempDir::new().unwrap();
        let (engine, mock) = engine_with(&dir, &[]);
        mock.push_stopped();

        engine.update_refresh_rate(Duration::from_millis(10)).unwrap();
        assert_eq!(engine.status().refresh_rate, None);

        engine.start().unwrap();
        engine.update_refresh_rate(Duration::from_millis(10)).unwrap();
        assert_eq!(engine.status().refresh_rate, Some(Duration::from_millis(10)));

        thread::sleep(Duration::from_millis(200));
        assert!(mock.fetches() >= 5, "fetched {} times", mock.fetches());
        engine.stop();

        let after_stop = mock.fetches();
        thread::sleep(Duration::from_millis(100));
        assert!(mock.fetches() <= after_stop + 1);
    }

    #[test]
    fn test_controls_debounce_refresh() {
        let dir = TempDir::new().unwrap();
        let (engine, mock) = engine_with(&dir, &[]);
        mock.push_playing("A");

        engine.start().unwrap();
        thread::sleep(Duration::from_millis(150));
        let before = mock.fetches();

        engine.next().unwrap();
        engine.next().unwrap();
        engine.pause().unwrap();
        thread::sleep(Duration::from_millis(300));

        assert_eq!(mock.controls(), vec![Control::Next, Control::Next, Control::Pause]);
        assert_eq!(mock.fetches(), before + 1);
        engine.stop();
    }

    #[test]
    fn test_set_provider_closes_previous() {
        let dir = TempDir::new().unwrap();
        let (engine, first) = engine_with(&dir, &[]);
        engine.set_provider(Arc::new(MockProvider::new(ProviderKind::Vlc)));
        assert!(first.is_closed());
        assert_eq!(engine.status().provider, Some(ProviderKind::Vlc));
    }

    #[test]
    fn test_switch_restarts_after_failed_authorization() {
        let dir = TempDir::new().unwrap();
        let (engine, first) = engine_with(&dir, &[]);
        first.push_playing("A");
        engine.start().unwrap();

        let second = Arc::new(MockProvider::new(ProviderKind::Vlc));
        second.fail_authorize().push_playing("B");
        let was_running = engine.is_running();
        engine.stop();
        let result = engine.install(second.clone(), was_running);

        assert!(matches!(result, Err(Error::Auth(_))));
        assert_eq!(second.authorized(), 1);
        assert!(first.is_closed());
        assert!(engine.is_running());
        assert_eq!(
            engine.inner.store.snapshot().sources.active,
            Some(ProviderKind::Vlc)
        );
        // Restarted with a seed fetch from the new provider
        assert_eq!(engine.status().track.as_deref(), Some(&track("B")));
        engine.stop();
    }

    #[test]
    fn test_switch_while_stopped_stays_stopped() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = engine_with(&dir, &[]);
        let next = Arc::new(MockProvider::new(ProviderKind::Vlc));
        next.push_stopped();

        engine.install(next.clone(), false).unwrap();
        assert_eq!(next.authorized(), 1);
        assert_eq!(next.fetches(), 0);
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn test_paused_with_stale_track_writes_placeholder_once() {
        let dir = TempDir::new().unwrap();
        let file = out(&dir, "song.txt");
        let (engine, mock) = engine_with(&dir, &[(&file, true)]);
        let stale = || -> std::result::Result<Playback, ProviderError> {
            Ok(Playback::new(PlaybackState::Stopped, Some(track("A"))))
        };
        mock.push_playing("A").push(stale()).push(stale()).push(stale());

        assert!(matches!(engine.tick(), Some(Transition::NewSong(_))));
        assert_eq!(engine.tick(), Some(Transition::Stopped));
        assert_eq!(engine.tick(), Some(Transition::Unchanged));
        assert_eq!(engine.tick(), Some(Transition::Unchanged));
        assert!(engine.wait_idle(IDLE));
        assert_eq!(fs::read_to_string(&file).unwrap(), "A\nidle\n");
    }

    #[test]
    fn test_start_forgets_previous_state() {
        let dir = TempDir::new().unwrap();
        let file = out(&dir, "song.txt");
        let (engine, mock) = engine_with(&dir, &[(&file, true)]);
        mock.push_stopped();

        // A tick that ran after the last stop left `Stopped` behind
        assert_eq!(engine.tick(), Some(Transition::Stopped));

        engine.start().unwrap();
        thread::sleep(Duration::from_millis(200));
        engine.stop();
        assert!(engine.wait_idle(IDLE));
        assert_eq!(fs::read_to_string(&file).unwrap(), "idle\nidle\n");
    }

    #[test]
    fn test_reload_outputs() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = engine_with(&dir, &[]);
        assert_eq!(engine.sink_count(), 0);

        engine
            .inner
            .store
            .add_sink(SinkConfig {
                file: out(&dir, "new.txt"),
                format: "{title}".to_string(),
                append: false,
            })
            .unwrap();
        engine.reload_outputs().unwrap();
        assert_eq!(engine.sink_count(), 1);
    }
}
