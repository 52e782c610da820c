//! Output file management commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use songcredits_core::{AppContext, ConfigStore, SinkConfig, Template};

pub fn add(config: &Path, file: PathBuf, format: String, append: bool) -> Result<()> {
    let context = load(config)?;
    let template = Template::new(&format);
    let sink = SinkConfig {
        file: file.clone(),
        format,
        append,
    };
    context
        .add_sink(sink)
        .with_context(|| format!("Failed to add output {}", file.display()))?;

    println!("Added {}", file.display());
    if template.placeholders().next().is_none() {
        println!("Note: the format contains no {{placeholders}}");
    }
    Ok(())
}

pub fn remove(config: &Path, file: &Path) -> Result<()> {
    let context = load(config)?;
    let removed = context
        .remove_sink(file)
        .with_context(|| format!("Failed to remove output {}", file.display()))?;
    println!("Removed {}", removed.file.display());
    Ok(())
}

pub fn list(config: &Path) -> Result<()> {
    let store = ConfigStore::load(config)
        .with_context(|| format!("Failed to load config from {}", config.display()))?;
    let general = store.snapshot().general;

    if general.output_formatters.is_empty() {
        println!("No outputs configured");
        return Ok(());
    }
    for sink in &general.output_formatters {
        let mode = if sink.append { "append" } else { "overwrite" };
        println!("{} [{}]", sink.file.display(), mode);
        println!("    {}", sink.format);
    }
    Ok(())
}

fn load(config: &Path) -> Result<AppContext> {
    AppContext::load(config)
        .with_context(|| format!("Failed to load config from {}", config.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_add_and_remove() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.json");
        let file = dir.path().join("song.txt");

        add(&config, file.clone(), "{title}".to_string(), true).unwrap();
        let sinks = ConfigStore::load(&config).unwrap().snapshot().general.output_formatters;
        assert_eq!(sinks.len(), 1);
        assert!(sinks[0].append);

        assert!(add(&config, file.clone(), "{artist}".to_string(), false).is_err());

        remove(&config, &file).unwrap();
        assert!(remove(&config, &file).is_err());
    }
}
