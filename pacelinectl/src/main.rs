//! `pacelinectl`: manage per-channel playback speeds from the terminal and
//! dry-run the page logic against a simulated watch page.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paceline_config::{ConfigSource, PacelineConfig, init_tracing};
use paceline_core::model::SpeedPreset;
use tracing::{debug, info};

mod commands;

#[derive(Parser)]
#[command(
    name = "pacelinectl",
    version,
    about = "Manage per-channel playback speeds"
)]
struct Cli {
    /// Settings file holding `channels` and `defaultSpeed`
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    /// Config file (TOML or JSON); defaults to $PACELINE_CONFIG_PATH, then ./paceline.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List channel overrides and the default speed
    List {
        /// Print the stored layout as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an override for a channel
    Add {
        channel: String,
        #[arg(value_parser = parse_preset)]
        speed: SpeedPreset,
    },
    /// Change the speed of an existing override
    Update {
        channel: String,
        #[arg(value_parser = parse_preset)]
        speed: SpeedPreset,
    },
    /// Remove a channel override
    Remove { channel: String },
    /// Set the speed used for channels without an override
    Default {
        #[arg(value_parser = parse_preset)]
        speed: SpeedPreset,
    },
    /// Show the speed a channel would get
    Resolve { channel: String },
    /// Report whether a URL is a watch page
    CheckUrl { url: String },
    /// Load a simulated watch page and apply the configured speed
    Simulate {
        url: String,
        /// Channel name rendered on the page
        #[arg(long)]
        channel: Option<String>,
        /// Never render a player, to exercise the retry bound
        #[arg(long)]
        no_player: bool,
    },
}

fn parse_preset(raw: &str) -> Result<SpeedPreset, String> {
    raw.parse::<SpeedPreset>().map_err(|err| {
        let choices: Vec<String> = SpeedPreset::ALL.iter().map(|p| p.to_string()).collect();
        format!("{err}; choose one of {}", choices.join(", "))
    })
}

fn load_config(path: Option<&PathBuf>) -> Result<(PacelineConfig, ConfigSource)> {
    match path {
        Some(path) => {
            let config = PacelineConfig::load_from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            Ok((config, ConfigSource::File(path.clone())))
        }
        None => PacelineConfig::load_from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, source) = load_config(cli.config.as_ref())?;
    init_tracing(&config)?;
    debug!(?source, "configuration loaded");

    let store_path = cli.store.unwrap_or_else(|| config.store_path.clone());
    info!(path = %store_path.display(), "using settings file");
    let session = commands::Session::new(config, store_path);

    match cli.command {
        Command::List { json } => commands::list(&session, json).await,
        Command::Add { channel, speed } => commands::add(&session, &channel, speed).await,
        Command::Update { channel, speed } => commands::update(&session, &channel, speed).await,
        Command::Remove { channel } => commands::remove(&session, &channel).await,
        Command::Default { speed } => commands::set_default(&session, speed).await,
        Command::Resolve { channel } => commands::resolve(&session, &channel).await,
        Command::CheckUrl { url } => {
            commands::check_url(&session, &url);
            Ok(())
        }
        Command::Simulate {
            url,
            channel,
            no_player,
        } => commands::simulate(&session, &url, channel.as_deref(), no_player).await,
    }
}
