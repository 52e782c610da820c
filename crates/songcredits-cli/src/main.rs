mod commands;
mod input;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use songcredits_core::ProviderKind;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "songcredits")]
#[command(about = "Write the song currently playing in VLC or Spotify to text files")]
#[command(version)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "SONGCREDITS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the active provider and update all outputs (default)
    Run,

    /// Log in to Spotify in the browser and store the refresh token
    Login {
        #[arg(long)]
        client_id: Option<String>,

        #[arg(long)]
        client_secret: Option<String>,
    },

    /// Show configuration and, optionally, what is playing right now
    Status {
        /// Fetch the current track once
        #[arg(long)]
        fetch: bool,
    },

    /// Manage output files
    #[command(subcommand)]
    Sink(SinkCommand),

    /// Enable the VLC HTTP interface in vlcrc
    VlcSetup {
        /// Path to vlcrc (defaults to the configured or platform path)
        #[arg(long)]
        vlcrc: Option<PathBuf>,

        /// Password for the HTTP interface
        #[arg(long)]
        password: Option<String>,

        /// Only report whether vlcrc is configured
        #[arg(long)]
        check: bool,
    },

    /// Switch the active provider
    Source {
        #[arg(value_parser = parse_provider)]
        kind: ProviderKind,
    },
}

#[derive(Subcommand)]
enum SinkCommand {
    /// Add an output file
    Add {
        file: PathBuf,

        /// Template, e.g. "{title} - {artist}"
        format: String,

        /// Append a line per song instead of overwriting
        #[arg(long)]
        append: bool,
    },

    /// Remove an output file
    Remove { file: PathBuf },

    /// List output files
    List,
}

fn parse_provider(s: &str) -> Result<ProviderKind, String> {
    s.parse()
        .map_err(|_| format!("unknown provider '{}', expected vlc or spotify", s))
}

fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Failed to determine config directory")?;
    Ok(config_dir.join("songcredits").join("config.json"))
}

/// `RUST_LOG` wins when set. Otherwise log our own crates at info, or debug
/// with `--verbose`.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    match rust_log.filter(|directives| !directives.trim().is_empty()) {
        Some(directives) => EnvFilter::new(directives),
        None => {
            let level = if verbose { "debug" } else { "info" };
            EnvFilter::new(format!("songcredits={level},songcredits_core={level}"))
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(args.verbose, rust_log.as_deref()))
        .init();

    let config = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };

    match args.command.unwrap_or(Command::Run) {
        Command::Run => commands::run::run(&config),
        Command::Login {
            client_id,
            client_secret,
        } => commands::login::run(&config, client_id, client_secret),
        Command::Status { fetch } => commands::status::run(&config, fetch),
        Command::Sink(SinkCommand::Add {
            file,
            format,
            append,
        }) => commands::sink::add(&config, file, format, append),
        Command::Sink(SinkCommand::Remove { file }) => commands::sink::remove(&config, &file),
        Command::Sink(SinkCommand::List) => commands::sink::list(&config),
        Command::VlcSetup {
            vlcrc,
            password,
            check,
        } => commands::vlc_setup::run(&config, vlcrc, password, check),
        Command::Source { kind } => commands::source::run(&config, kind),
    }
}
