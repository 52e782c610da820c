//! Provider switch command.

use std::path::Path;

use anyhow::{Context, Result};
use songcredits_core::{AppContext, ProviderKind};

pub fn run(config: &Path, kind: ProviderKind) -> Result<()> {
    let context = AppContext::load(config)
        .with_context(|| format!("Failed to load config from {}", config.display()))?;

    let result = context
        .engine()
        .switch_provider(kind)
        .with_context(|| format!("Failed to switch to {}", kind));
    context.shutdown();
    result?;

    println!("Active provider: {}", kind);
    Ok(())
}
