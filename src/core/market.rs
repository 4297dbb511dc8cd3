//! Market data abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const DEFAULT_CURRENCY: &str = "USD";

/// Market capitalizations are reported by providers in units, quotes carry billions.
pub const BILLION: f64 = 1_000_000_000.0;

/// The fallback strategy that produced a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuoteTier {
    FastSnapshot,
    History,
    Metadata,
}

impl Display for QuoteTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                QuoteTier::FastSnapshot => "snapshot",
                QuoteTier::History => "history",
                QuoteTier::Metadata => "metadata",
            }
        )
    }
}

/// A resolved snapshot for one tracked symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetQuote {
    pub raw_symbol: String,
    pub display_symbol: String,
    pub price: f64,
    pub market_cap_billions: f64,
    pub currency: String,
    pub short_name: Option<String>,
    pub source: QuoteTier,
}

/// Lightweight quote lookup.
#[derive(Debug, Clone, Default)]
pub struct FastQuote {
    pub last_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub currency: Option<String>,
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// Descriptive metadata for a symbol.
#[derive(Debug, Clone, Default)]
pub struct AssetMetadata {
    pub previous_close: Option<f64>,
    pub regular_market_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub currency: Option<String>,
    pub display_name: Option<String>,
}

/// The three request shapes a market data source answers.
///
/// Any call may fail and any field may be missing, per symbol.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fast_quote(&self, symbol: &str) -> Result<FastQuote>;

    /// Daily closes for the last `lookback_days`, oldest first.
    async fn daily_closes(&self, symbol: &str, lookback_days: u32) -> Result<Vec<DailyClose>>;

    async fn metadata(&self, symbol: &str) -> Result<AssetMetadata>;
}
