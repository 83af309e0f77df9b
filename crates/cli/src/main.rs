//! urbanroute CLI: the main entry point.
//!
//! Commands:
//! - `chat`    : Interactive loop (default)
//! - `ask`     : Route a single request
//! - `classify`: Print the routing decision as JSON
//! - `config`  : Show, locate or initialize the config file
//! - `doctor`  : Diagnose config, checkpoint and credentials

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use urbanroute_config::{AppConfig, ConfigError};

mod commands;
mod logging;

#[derive(Parser)]
#[command(
    name = "urbanroute",
    about = "urbanroute: intent-routed city assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: ~/.urbanroute/config.toml)
    #[arg(short, long, global = true, env = "URBANROUTE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat interactively (type `reset` for a new session, `exit` to quit)
    Chat,

    /// Route a single request and print the answer
    Ask {
        /// The request text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Print the routing decision for a request as JSON
    Classify {
        /// The request text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose configuration, checkpoint and credentials
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    let loaded = AppConfig::load_with_env(&config_path);

    logging::init(loaded.as_ref().ok().map(|c| &c.logging), cli.verbose);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => commands::chat::run(&require(loaded)?).await?,
        Commands::Ask { text } => commands::ask::run(&require(loaded)?, &text.join(" ")).await?,
        Commands::Classify { text } => {
            commands::classify::run(&require(loaded)?, &text.join(" "))?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&require(loaded)?)?,
            ConfigAction::Path => commands::config_cmd::path(&config_path)?,
            ConfigAction::Init => commands::config_cmd::init(&config_path)?,
        },
        Commands::Doctor => commands::doctor::run(&config_path, loaded)?,
    }

    Ok(())
}

fn require(loaded: Result<AppConfig, ConfigError>) -> Result<AppConfig, String> {
    loaded.map_err(|e| format!("Failed to load config: {e}"))
}
