//! Best-effort conversion of quotes to USD.

use crate::core::cache::Cache;
use crate::core::market::{AssetQuote, DEFAULT_CURRENCY};
use crate::core::resolver::MarketDataResolver;
use crate::store::memory::MemoryCache;
use std::time::Duration;
use tracing::debug;

/// Major currency and scale for Yahoo's minor-unit codes, e.g. `GBp` pence.
fn major_unit(currency: &str) -> (String, f64) {
    match currency {
        "GBp" | "GBX" => ("GBP".to_string(), 0.01),
        "ZAc" | "ZAC" => ("ZAR".to_string(), 0.01),
        "ILA" => ("ILS".to_string(), 0.01),
        other => (other.to_uppercase(), 1.0),
    }
}

pub struct CurrencyNormalizer<'a> {
    resolver: &'a MarketDataResolver,
    convert_to_usd: bool,
    rates: MemoryCache<String, Option<f64>>,
}

impl<'a> CurrencyNormalizer<'a> {
    pub fn new(resolver: &'a MarketDataResolver, convert_to_usd: bool) -> Self {
        CurrencyNormalizer {
            resolver,
            convert_to_usd,
            rates: MemoryCache::new(),
        }
    }

    fn needs_conversion(&self, currency: &str) -> bool {
        self.convert_to_usd && major_unit(currency) != (DEFAULT_CURRENCY.to_string(), 1.0)
    }

    /// Rate from `currency` to USD, `None` when it could not be resolved.
    async fn lookup_rate(&self, currency: &str) -> Option<f64> {
        let (major, scale) = major_unit(currency);
        if major == DEFAULT_CURRENCY {
            return Some(scale);
        }
        Some(self.spot_rate(&major).await? * scale)
    }

    /// Spot rate for a major currency, memoized per run.
    async fn spot_rate(&self, currency: &str) -> Option<f64> {
        let symbol = format!("{}{}=X", currency, DEFAULT_CURRENCY);
        if let Some(cached) = self.rates.get(&symbol, Duration::MAX).await {
            return cached;
        }

        let rate = match self.resolver.spot_price(&symbol).await {
            Ok(rate) => Some(rate),
            Err(e) => {
                debug!("FX lookup failed for {}: {}, leaving values unconverted", symbol, e);
                None
            }
        };
        self.rates.put(symbol, rate).await;
        rate
    }

    /// Multiplier taking `currency` amounts to USD.
    ///
    /// Exactly 1.0 when conversion is off, the currency already is USD, or the
    /// rate could not be resolved.
    pub async fn rate_for(&self, currency: &str) -> f64 {
        if !self.needs_conversion(currency) {
            return 1.0;
        }
        self.lookup_rate(currency).await.unwrap_or(1.0)
    }

    /// Scales price and market cap by the same rate. Quotes whose rate is
    /// unavailable come back unchanged, keeping their own currency.
    pub async fn normalize(&self, quote: AssetQuote) -> AssetQuote {
        if !self.needs_conversion(&quote.currency) {
            return quote;
        }
        match self.lookup_rate(&quote.currency).await {
            Some(rate) => {
                debug!(
                    "Converted {} from {} to {} at rate {}",
                    quote.raw_symbol, quote.currency, DEFAULT_CURRENCY, rate
                );
                AssetQuote {
                    price: quote.price * rate,
                    market_cap_billions: quote.market_cap_billions * rate,
                    currency: DEFAULT_CURRENCY.to_string(),
                    ..quote
                }
            }
            None => quote,
        }
    }
}
