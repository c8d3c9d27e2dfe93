use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::Level;

mod commands;

#[derive(Parser)]
#[command(name = "onion-gate")]
#[command(about = "Onion gateway - supervises tor and gates .xyz/.onion fetches on it")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "onion-gate.yaml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    Validate,

    /// Print the torrc the configuration renders to
    Torrc,

    /// Boot the service, route the given URLs through it and shut down
    Run {
        /// URLs to route
        urls: Vec<String>,

        /// Seconds to wait for the service beyond its bootstrap budget
        #[arg(long, default_value_t = 5)]
        slack: u64,
    },

    /// Classify hosts without starting anything
    Classify {
        /// Hosts to classify
        #[arg(required = true)]
        hosts: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => configured_level(&cli.config).unwrap_or(Level::INFO),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .init();

    smol::block_on(async {
        match cli.command {
            Commands::Validate => commands::validate::run(&cli.config).await,
            Commands::Torrc => commands::torrc::run(&cli.config).await,
            Commands::Run { urls, slack } => commands::run::run(&cli.config, urls, slack).await,
            Commands::Classify { hosts } => commands::classify::run(hosts).await,
        }
    })
}

/// `settings.log_level` from the config file, if it parses
fn configured_level(config: &Path) -> Option<Level> {
    gate_config::parser::parse_file(config)
        .ok()?
        .settings
        .log_level?
        .parse()
        .ok()
}
