use anyhow::Result;
use cagr2030::core::log::init_logging;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for cagr2030::AppCommand {
    fn from(cmd: Commands) -> cagr2030::AppCommand {
        match cmd {
            Commands::Project { symbols, refresh } => {
                cagr2030::AppCommand::Project { symbols, refresh }
            }
            Commands::Add { symbols } => cagr2030::AppCommand::Add(symbols),
            Commands::Remove { symbols } => cagr2030::AppCommand::Remove(symbols),
            Commands::Target {
                symbol,
                market_cap,
                weight,
            } => cagr2030::AppCommand::Target {
                symbol,
                market_cap,
                weight,
            },
            Commands::Share => cagr2030::AppCommand::Share,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Project 2030 prices and growth rates for the tracked symbols
    Project {
        /// Comma-separated symbols to project instead of the tracked list
        #[arg(short, long)]
        symbols: Option<String>,
        /// Ignore cached quotes and fetch fresh data
        #[arg(short, long)]
        refresh: bool,
    },
    /// Start tracking one or more symbols
    Add {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Stop tracking one or more symbols
    Remove {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Set the 2030 market cap target (in billions) and portfolio weight for a symbol
    Target {
        symbol: String,
        #[arg(short, long)]
        market_cap: Option<f64>,
        #[arg(short, long)]
        weight: Option<f64>,
    },
    /// Print the tracked symbols as a shareable list
    Share,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => cagr2030::cli::setup::setup(cli.config_path.as_deref()),
        Some(cmd) => cagr2030::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
