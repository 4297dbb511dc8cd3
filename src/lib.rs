pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::resolver::MarketDataResolver;
use crate::providers::yahoo_finance::YahooFinanceProvider;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Project {
        /// Share reference to project instead of the tracked list.
        symbols: Option<String>,
        refresh: bool,
    },
    Add(Vec<String>),
    Remove(Vec<String>),
    Target {
        symbol: String,
        market_cap: Option<f64>,
        weight: Option<f64>,
    },
    Share,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("cagr2030 starting...");

    let path = AppConfig::resolve_path(config_path)?;
    let mut config = AppConfig::load_or_default(&path)?;
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Project { symbols, refresh } => {
            let provider = Arc::new(YahooFinanceProvider::from_config(&config.yahoo()));
            let cache = store::open_cache(&config, "quotes");
            let resolver = MarketDataResolver::new(provider, cache, config.history_days);
            let saved = cli::project::run(&resolver, &config, symbols.as_deref(), refresh).await?;
            if let Some(store) = saved {
                store.save_to_config(&mut config);
                config.save_to_path(&path)?;
            }
            Ok(())
        }
        AppCommand::Add(symbols) => {
            cli::symbols::add(&mut config, &symbols)?;
            config.save_to_path(&path)
        }
        AppCommand::Remove(symbols) => {
            cli::symbols::remove(&mut config, &symbols);
            config.save_to_path(&path)
        }
        AppCommand::Target {
            symbol,
            market_cap,
            weight,
        } => {
            cli::symbols::target(&mut config, &symbol, market_cap, weight)?;
            config.save_to_path(&path)
        }
        AppCommand::Share => {
            cli::symbols::share(&config);
            Ok(())
        }
    }
}
