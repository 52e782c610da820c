//! Main polling mode command.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use songcredits_core::{AppContext, CancelToken, Engine};
use tracing::{info, warn};

use crate::input::{self, KeyAction};

const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll the active provider until Ctrl+C, Esc or q
pub fn run(config: &Path) -> Result<()> {
    let shutdown = Arc::new(CancelToken::new());
    let shutdown_ctrlc = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, stopping...");
        shutdown_ctrlc.cancel();
    })?;

    info!("SongCredits {}", env!("CARGO_PKG_VERSION"));

    let context = Arc::new(
        AppContext::load(config)
            .with_context(|| format!("Failed to load config from {}", config.display()))?,
    );
    if context.engine().sink_count() == 0 {
        warn!("No outputs configured, add one with `songcredits sink add`");
    }

    context.start().context("Failed to start polling")?;

    let keyboard_context = Arc::clone(&context);
    let _keyboard_handle =
        input::spawn_keyboard_monitor(Arc::clone(&shutdown), move |action| {
            handle_key(keyboard_context.engine(), action)
        });

    println!("Polling... (n: next, p: previous, space: pause, Esc or q: quit)");
    while !shutdown.wait(Duration::from_secs(1)) {}

    context.shutdown();
    if !context.engine().wait_idle(IDLE_TIMEOUT) {
        warn!("Outputs still busy after {:?}", IDLE_TIMEOUT);
    }
    info!("Stopped");
    Ok(())
}

fn handle_key(engine: &Engine, action: KeyAction) {
    let result = match action {
        KeyAction::Next => engine.next(),
        KeyAction::Previous => engine.previous(),
        KeyAction::TogglePause => engine.toggle(),
        KeyAction::Quit => return,
    };
    match result {
        Ok(true) => {}
        Ok(false) => warn!("Player did not accept {:?}", action),
        Err(e) => warn!("{:?} failed: {}", action, e),
    }
}
