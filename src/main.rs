use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod sync;

use commands::{ConfigCommand, QueueCommand, SyncCommand, WatchCommand};
use config::Config;

#[derive(Parser)]
#[command(name = "haven")]
#[command(version)]
#[command(about = "Offline queue and sync for the Haven companion app", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add to, list, or clear the offline queue
    Queue(QueueCommand),

    /// Deliver queued actions once
    Sync(SyncCommand),

    /// Keep delivering queued actions whenever the server is reachable
    Watch(WatchCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "haven=warn,haven_core=warn",
        1 => "haven=info,haven_core=info",
        _ => "haven=debug,haven_core=debug",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(cli.config)?;

    match &cli.command {
        Some(Commands::Queue(cmd)) => {
            cmd.run(&config)?;
        }
        Some(Commands::Sync(cmd)) => {
            cmd.run(&config)?;
        }
        Some(Commands::Watch(cmd)) => {
            cmd.run(&config)?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
