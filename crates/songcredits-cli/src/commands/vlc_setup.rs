//! vlcrc setup command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use songcredits_core::ConfigStore;
use songcredits_core::provider::vlc::setup::{self, VlcProperties};
use tracing::info;

/// Platform location of vlcrc
fn default_vlcrc() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        dirs::preference_dir().map(|dir| dir.join("org.videolan.vlc").join("vlcrc"))
    } else {
        dirs::config_dir().map(|dir| dir.join("vlc").join("vlcrc"))
    }
}

pub fn run(
    config: &Path,
    vlcrc: Option<PathBuf>,
    password: Option<String>,
    check: bool,
) -> Result<()> {
    let store = ConfigStore::load(config)
        .with_context(|| format!("Failed to load config from {}", config.display()))?;

    if let Some(password) = password {
        store.update(|config| config.sources.vlc.password = Some(password));
    }
    let vlc = store.snapshot().sources.vlc;
    if vlc.password.is_none() {
        bail!("A password for the VLC HTTP interface is required (--password)");
    }

    let vlcrc = match vlcrc.or_else(|| vlc.config_file.clone()).or_else(default_vlcrc) {
        Some(path) => path,
        None => bail!("Could not determine the vlcrc location, pass --vlcrc"),
    };
    if !vlcrc.exists() {
        bail!(
            "{} does not exist, start VLC once to create it",
            vlcrc.display()
        );
    }

    let properties = VlcProperties::load(&vlcrc)
        .with_context(|| format!("Failed to read {}", vlcrc.display()))?;
    let configured = setup::is_configured(&vlc, &properties)?;

    if check {
        if configured {
            println!("{} is configured", vlcrc.display());
        } else {
            println!("{} needs setup, run without --check", vlcrc.display());
        }
        return Ok(());
    }

    if configured {
        println!("{} is already configured", vlcrc.display());
    } else {
        setup::configure(&vlc, &vlcrc)
            .with_context(|| format!("Failed to update {}", vlcrc.display()))?;
        println!("Updated {}, restart VLC to apply", vlcrc.display());
    }

    store.update(|config| config.sources.vlc.config_file = Some(vlcrc.clone()));
    store.save().context("Failed to save config")?;
    info!("VLC setup complete");
    Ok(())
}
