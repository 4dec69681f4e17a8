//! codelab CLI
//!
//! Terminal front end for the codelab classroom server:
//! - Run a source file remotely with live output and input
//! - Pick a nickname and take part in games
//! - Inspect and initialise configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cl_core::config::{self, ClientConfig};
use cl_core::error::ConfigError;
use cl_core::identity::default_identity_path;
use codelab::commands;

#[derive(Parser)]
#[command(name = "codelab")]
#[command(author, version, about = "Run code on a codelab classroom server")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Server URL (overrides config)
    #[arg(short, long, global = true, env = "CODELAB_SERVER")]
    server: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a source file on the server
    Run {
        /// Source file to compile and run
        file: PathBuf,
    },

    /// Show or set your nickname
    Nickname {
        /// New nickname (omit to show the current one)
        name: Option<String>,
    },

    /// Classroom game
    Game {
        #[command(subcommand)]
        action: GameAction,
    },

    /// Show the game leaderboard
    Leaderboard,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum GameAction {
    /// Show whether a game is running and the current question
    Status,
    /// Join the running game under your nickname
    Join,
    /// Keep polling and print the status whenever it changes
    Watch,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show config file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Load the config file, falling back to defaults when there is none
fn load_client_config(cli: &Cli) -> Result<ClientConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);

    let mut client_config = match config::load_config::<ClientConfig>(&path) {
        Ok(c) => c,
        Err(ConfigError::NotFound(_)) if cli.config.is_none() => {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            ClientConfig::default()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load config: {:?}", path));
        }
    };

    if let Some(server) = &cli.server {
        client_config.server_url = server.clone();
    }
    client_config.validate().context("Invalid configuration")?;

    Ok(client_config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match &cli.command {
        Commands::Config { action } => {
            let path = cli.config.as_ref();
            match action {
                ConfigAction::Show => commands::config_show(path),
                ConfigAction::Path => commands::config_path(path),
                ConfigAction::Init { force } => commands::config_init(path, *force),
            }
        }
        Commands::Nickname { name } => {
            commands::nickname_command(&default_identity_path(), name.as_deref())
        }
        Commands::Run { file } => {
            let client_config = load_client_config(&cli)?;
            commands::run_command(&client_config, file, cli.quiet).await
        }
        Commands::Game { action } => {
            let client_config = load_client_config(&cli)?;
            match action {
                GameAction::Status => commands::game_status_command(&client_config).await,
                GameAction::Join => {
                    commands::game_join_command(&client_config, &default_identity_path()).await
                }
                GameAction::Watch => commands::game_watch_command(&client_config).await,
            }
        }
        Commands::Leaderboard => {
            let client_config = load_client_config(&cli)?;
            commands::leaderboard_command(&client_config).await
        }
    }
}
