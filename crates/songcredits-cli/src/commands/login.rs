//! Spotify login command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use songcredits_core::{AuthSupervisor, ConfigStore};

pub fn run(config: &Path, client_id: Option<String>, client_secret: Option<String>) -> Result<()> {
    let store = Arc::new(
        ConfigStore::load(config)
            .with_context(|| format!("Failed to load config from {}", config.display()))?,
    );

    if client_id.is_some() || client_secret.is_some() {
        store.update(|config| {
            let spotify = &mut config.sources.spotify;
            if let Some(id) = client_id {
                spotify.client_id = Some(id);
            }
            if let Some(secret) = client_secret {
                spotify.client_secret = Some(secret);
            }
        });
        store.save().context("Failed to save client credentials")?;
    }

    if !store.snapshot().sources.spotify.is_complete() {
        bail!("Spotify client id and secret are required (--client-id, --client-secret)");
    }

    let auth = AuthSupervisor::new(Arc::clone(&store))?;
    println!("Waiting for login in the browser...");
    auth.login().context("Spotify login failed")?;
    auth.close();

    println!("Logged in to Spotify");
    println!("Token saved to {}", store.path().display());
    Ok(())
}
