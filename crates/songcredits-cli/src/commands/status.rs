//! Configuration summary and one-shot fetch.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use songcredits_core::{
    AppConfig, ConfigStore, Playback, PlaybackState, ProviderKind, create_provider,
};

pub fn run(config: &Path, fetch: bool) -> Result<()> {
    let store = Arc::new(
        ConfigStore::load(config)
            .with_context(|| format!("Failed to load config from {}", config.display()))?,
    );
    let snapshot = store.snapshot();

    println!("{} {}", "Config:".bold(), store.path().display());
    print_sources(&snapshot);
    print_outputs(&snapshot);

    if !fetch {
        return Ok(());
    }

    let kind = snapshot
        .sources
        .active
        .context("No provider is active, select one with `songcredits source`")?;
    let provider = create_provider(kind, &store)?;
    provider
        .authorize()
        .with_context(|| format!("Failed to authorize {}", kind))?;
    let result = provider.fetch();
    provider.close();

    println!();
    match result {
        Ok(playback) => print_playback(&playback),
        Err(e) if e.is_transient() => println!("{} {}", "Unavailable:".yellow(), e),
        Err(e) => return Err(e).context("Failed to fetch the current track"),
    }
    Ok(())
}

fn print_sources(config: &AppConfig) {
    for kind in [ProviderKind::Vlc, ProviderKind::Spotify] {
        let active = config.sources.active == Some(kind);
        let marker = if active { "*" } else { " " };
        let complete = if config.is_complete(kind) {
            "configured".green().to_string()
        } else {
            "incomplete".red().to_string()
        };
        println!(
            "{} {:<8} {} (every {:?})",
            marker,
            kind.display_name(),
            complete,
            config.refresh_rate(kind)
        );
    }

    let vlc = &config.sources.vlc;
    println!("    VLC at {}:{}", vlc.host, vlc.port);

    let spotify = &config.sources.spotify;
    let login = if spotify.refresh_token.is_some() {
        "logged in".green().to_string()
    } else {
        "not logged in".dimmed().to_string()
    };
    println!("    Spotify {}", login);
}

fn print_outputs(config: &AppConfig) {
    let general = &config.general;
    println!(
        "{} {} file(s), placeholder \"{}\"",
        "Outputs:".bold(),
        general.output_formatters.len(),
        general.placeholder_text
    );
    for sink in &general.output_formatters {
        println!("    {} <- {}", sink.file.display(), sink.format.dimmed());
    }
    if let Some(cover) = &general.cover_file {
        println!("    {} <- cover", cover.display());
    }
}

fn print_playback(playback: &Playback) {
    let state = match playback.state {
        PlaybackState::Playing => "Playing".green().to_string(),
        PlaybackState::Paused => "Paused".yellow().to_string(),
        PlaybackState::Stopped => "Stopped".dimmed().to_string(),
    };
    match &playback.track {
        Some(track) => println!("{} {}", state, track.describe().bold()),
        None => println!("{}", state),
    }
    if let (Some(position), Some(length)) = (playback.position, playback.length) {
        println!("    {} / {}", clock(position), clock(length));
    }
    if let Some(track) = &playback.track {
        for (id, value) in track.fields() {
            println!("    {:<14} {}", id.dimmed(), value);
        }
    }
}

fn clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
