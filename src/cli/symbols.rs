use super::ui;
use crate::core::config::AppConfig;
use crate::core::{PortfolioStore, ProjectionTarget};
use anyhow::{Result, bail};

/// Starts tracking each symbol in `symbols`.
pub fn add(config: &mut AppConfig, symbols: &[String]) -> Result<()> {
    let mut store = PortfolioStore::from_config(config);
    for symbol in symbols {
        if store.add_symbol(symbol)? {
            println!("Tracking {}", symbol.trim().to_uppercase());
        } else {
            println!(
                "{}",
                ui::style_text(
                    &format!("{} is already tracked", symbol.trim().to_uppercase()),
                    ui::StyleType::Subtle
                )
            );
        }
    }
    store.save_to_config(config);
    Ok(())
}

pub fn remove(config: &mut AppConfig, symbols: &[String]) {
    let mut store = PortfolioStore::from_config(config);
    for symbol in symbols {
        if store.remove_symbol(symbol) {
            println!("Stopped tracking {}", symbol.trim().to_uppercase());
        } else {
            println!(
                "{}",
                ui::style_text(
                    &format!("{} is not tracked", symbol.trim().to_uppercase()),
                    ui::StyleType::Warning
                )
            );
        }
    }
    store.save_to_config(config);
}

/// Updates the saved target for a tracked symbol. Values not given keep
/// their saved value; a symbol without one needs `market_cap`.
pub fn target(
    config: &mut AppConfig,
    symbol: &str,
    market_cap: Option<f64>,
    weight: Option<f64>,
) -> Result<()> {
    if market_cap.is_none() && weight.is_none() {
        bail!("Nothing to update, pass --market-cap and/or --weight");
    }

    let mut store = PortfolioStore::from_config(config);
    let display = store.display_for(symbol)?;
    let saved = store.target(&display).copied();

    let market_cap = match (market_cap, saved) {
        (Some(market_cap), _) => market_cap,
        (None, Some(saved)) => saved.target_market_cap_billions,
        (None, None) => bail!("{display} has no saved target yet, pass --market-cap"),
    };
    let weight = weight
        .or(saved.map(|t| t.weight_percent))
        .unwrap_or(0.0);

    store.upsert_target(&display, ProjectionTarget::new(market_cap, weight)?)?;
    store.save_to_config(config);
    println!("{display}: target {market_cap:.2}B, weight {weight:.1}%");
    Ok(())
}

pub fn share(config: &AppConfig) {
    let reference = PortfolioStore::from_config(config).share_reference();
    println!("{reference}");
    println!(
        "{}",
        ui::style_text(
            &format!("cagr2030 project --symbols {reference}"),
            ui::StyleType::Subtle
        )
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TargetConfig;

    fn config(symbols: &[&str]) -> AppConfig {
        AppConfig {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_add_and_remove() -> Result<()> {
        let mut config = config(&["AAPL"]);
        add(&mut config, &["btc-usd".to_string(), "aapl".to_string()])?;
        assert_eq!(config.symbols, vec!["AAPL", "BTC-USD"]);

        remove(&mut config, &["BTC".to_string(), "MSFT".to_string()]);
        assert_eq!(config.symbols, vec!["AAPL"]);
        Ok(())
    }

    #[test]
    fn test_target_updates() -> Result<()> {
        let mut config = config(&["AAPL", "BTC-USD"]);

        assert!(target(&mut config, "BTC", None, Some(10.0)).is_err());
        assert!(target(&mut config, "BTC", None, None).is_err());
        assert!(target(&mut config, "ETH", Some(100.0), None).is_err());

        target(&mut config, "btc-usd", Some(5000.0), Some(40.0))?;
        target(&mut config, "BTC", None, Some(25.0))?;
        assert_eq!(
            config.targets["BTC"],
            TargetConfig {
                market_cap: 5000.0,
                weight: 25.0
            }
        );

        assert!(target(&mut config, "AAPL", Some(-1.0), None).is_err());
        assert!(!config.targets.contains_key("AAPL"));
        Ok(())
    }
}
