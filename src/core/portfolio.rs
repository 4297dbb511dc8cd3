//! The user's working set: tracked symbols plus per-symbol targets and weights.
use crate::core::config::{AppConfig, TargetConfig};
use crate::core::market::AssetQuote;
use crate::core::symbol::{SymbolKey, decode_share_reference, encode_share_reference};
use anyhow::{Result, bail};
use std::collections::HashMap;
use tracing::debug;

/// User intent for one display symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionTarget {
    pub target_market_cap_billions: f64,
    pub weight_percent: f64,
}

impl ProjectionTarget {
    pub fn new(target_market_cap_billions: f64, weight_percent: f64) -> Result<Self> {
        if !target_market_cap_billions.is_finite() || target_market_cap_billions <= 0.0 {
            bail!("Target market cap must be a positive number, got {target_market_cap_billions}");
        }
        if !(0.0..=100.0).contains(&weight_percent) {
            bail!("Weight must be between 0 and 100, got {weight_percent}");
        }
        Ok(ProjectionTarget {
            target_market_cap_billions,
            weight_percent,
        })
    }

    /// `multiplier` times the current market cap, no weight.
    pub fn default_for(quote: &AssetQuote, multiplier: f64) -> Self {
        ProjectionTarget {
            target_market_cap_billions: quote.market_cap_billions * multiplier,
            weight_percent: 0.0,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct PortfolioStore {
    symbols: Vec<SymbolKey>,
    targets: HashMap<String, ProjectionTarget>,
}

impl PortfolioStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a share reference, targets start empty.
    pub fn from_share_reference(reference: &str) -> Self {
        PortfolioStore {
            symbols: decode_share_reference(reference),
            targets: HashMap::new(),
        }
    }

    /// Loads tracked symbols and saved targets. Saved targets that are
    /// invalid or belong to untracked symbols are ignored.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut store = Self::from_share_reference(&config.symbols.join(","));
        store.load_targets(config);
        store
    }

    /// Replaces targets with the ones saved in `config`, for tracked symbols only.
    pub fn load_targets(&mut self, config: &AppConfig) {
        self.targets.clear();
        for (symbol, saved) in &config.targets {
            if !self.is_tracked(symbol) {
                debug!("Ignoring saved target for untracked symbol {}", symbol);
                continue;
            }
            match ProjectionTarget::new(saved.market_cap, saved.weight) {
                Ok(target) => {
                    self.targets.insert(symbol.clone(), target);
                }
                Err(e) => debug!("Ignoring saved target for {}: {}", symbol, e),
            }
        }
    }

    /// Writes symbols and targets back into `config`.
    pub fn save_to_config(&self, config: &mut AppConfig) {
        config.symbols = self.symbols.iter().map(|s| s.raw.clone()).collect();
        config.targets = self
            .targets
            .iter()
            .map(|(symbol, target)| {
                (
                    symbol.clone(),
                    TargetConfig {
                        market_cap: target.target_market_cap_billions,
                        weight: target.weight_percent,
                    },
                )
            })
            .collect();
    }

    pub fn list_symbols(&self) -> &[SymbolKey] {
        &self.symbols
    }

    pub fn share_reference(&self) -> String {
        encode_share_reference(&self.symbols)
    }

    fn is_tracked(&self, display: &str) -> bool {
        self.symbols.iter().any(|s| s.display == display)
    }

    /// Starts tracking `input`. Returns false if its lookup key is already tracked.
    pub fn add_symbol(&mut self, input: &str) -> Result<bool> {
        if input.trim().is_empty() {
            bail!("Symbol must not be empty");
        }
        let key = SymbolKey::normalize(input);
        if self.symbols.iter().any(|s| s.raw == key.raw) {
            return Ok(false);
        }
        debug!("Tracking {} as {}", key.raw, key.display);
        self.symbols.push(key);
        Ok(true)
    }

    /// Stops tracking every symbol whose lookup key or display name matches
    /// `input`, dropping targets no tracked symbol uses anymore.
    pub fn remove_symbol(&mut self, input: &str) -> bool {
        let key = SymbolKey::normalize(input);
        let before = self.symbols.len();
        self.symbols
            .retain(|s| s.raw != key.raw && s.display != key.raw);
        let symbols = &self.symbols;
        self.targets
            .retain(|display, _| symbols.iter().any(|s| &s.display == display));
        self.symbols.len() != before
    }

    /// Sets the target for a tracked symbol, given by lookup key or display name.
    pub fn upsert_target(&mut self, symbol: &str, target: ProjectionTarget) -> Result<()> {
        let display = self.display_for(symbol)?;
        ProjectionTarget::new(target.target_market_cap_billions, target.weight_percent)?;
        self.targets.insert(display, target);
        Ok(())
    }

    /// Display name of a tracked symbol given by lookup key or display name.
    pub fn display_for(&self, symbol: &str) -> Result<String> {
        let key = SymbolKey::normalize(symbol);
        match self
            .symbols
            .iter()
            .find(|s| s.raw == key.raw || s.display == key.raw)
        {
            Some(tracked) => Ok(tracked.display.clone()),
            None => bail!("{} is not tracked", key.raw),
        }
    }

    pub fn target(&self, display: &str) -> Option<&ProjectionTarget> {
        self.targets.get(display)
    }

    /// The saved target for the quote's symbol, created from the quote on first sight.
    pub fn target_or_default(&mut self, quote: &AssetQuote, multiplier: f64) -> ProjectionTarget {
        *self
            .targets
            .entry(quote.display_symbol.clone())
            .or_insert_with(|| ProjectionTarget::default_for(quote, multiplier))
    }
}
