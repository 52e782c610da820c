use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use songcredits_core::CancelToken;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Action bound to a key while running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Next,
    Previous,
    TogglePause,
    Quit,
}

/// Spawn a thread that maps key presses to playback controls.
///
/// - `n`: next track, `p`: previous track, space: pause/resume
/// - Esc, `q` or Ctrl+C: quit (cancels `shutdown`)
///
/// Other actions are passed to `on_action` on the monitor thread.
pub fn spawn_keyboard_monitor<F>(shutdown: Arc<CancelToken>, on_action: F) -> JoinHandle<()>
where
    F: Fn(KeyAction) + Send + 'static,
{
    thread::spawn(move || {
        debug!("Keyboard monitor started");

        while !shutdown.is_cancelled() {
            // Poll with a timeout so the shutdown flag is rechecked
            if event::poll(Duration::from_millis(100)).unwrap_or(false)
                && let Ok(Event::Key(key_event)) = event::read()
                && let Some(action) = action_for(&key_event)
            {
                debug!("Key {:?} -> {:?}", key_event.code, action);
                if action == KeyAction::Quit {
                    shutdown.cancel();
                    break;
                }
                on_action(action);
            }
        }

        debug!("Keyboard monitor stopped");
    })
}

fn action_for(event: &KeyEvent) -> Option<KeyAction> {
    if event.kind == KeyEventKind::Release {
        return None;
    }
    match event.code {
        KeyCode::Esc => Some(KeyAction::Quit),
        KeyCode::Char('q') | KeyCode::Char('Q') => Some(KeyAction::Quit),
        KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyAction::Quit)
        }
        KeyCode::Char('n') | KeyCode::Char('N') => Some(KeyAction::Next),
        KeyCode::Char('p') | KeyCode::Char('P') => Some(KeyAction::Previous),
        KeyCode::Char(' ') => Some(KeyAction::TogglePause),
        _ => None,
    }
}
