//! Resolves tracked symbols to quotes through an ordered chain of fallback tiers.
use crate::core::cache::Cache;
use crate::core::market::{
    AssetMetadata, AssetQuote, BILLION, DEFAULT_CURRENCY, MarketDataProvider, QuoteTier,
};
use crate::core::symbol::SymbolKey;
use futures::future::join_all;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Why a single tier did not produce a quote.
#[derive(Debug, Error)]
pub enum TierFailure {
    #[error("provider request failed: {0:#}")]
    Provider(anyhow::Error),
    #[error("no price returned")]
    MissingPrice,
    #[error("non-positive price {0}")]
    NonPositivePrice(f64),
    #[error("no positive market cap returned")]
    MissingMarketCap,
    #[error("no closing prices in the last {0} days")]
    NoCloses(u32),
}

/// Every tier failed for `symbol`.
#[derive(Debug)]
pub struct ResolutionFailure {
    pub symbol: String,
    pub attempts: Vec<(QuoteTier, TierFailure)>,
}

impl Display for ResolutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not resolve {}", self.symbol)?;
        for (tier, failure) in &self.attempts {
            write!(f, "; {tier}: {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolutionFailure {}

fn positive_price(price: Option<f64>) -> Result<f64, TierFailure> {
    match price {
        None => Err(TierFailure::MissingPrice),
        Some(p) if p > 0.0 => Ok(p),
        Some(p) => Err(TierFailure::NonPositivePrice(p)),
    }
}

fn market_cap_billions(market_cap: Option<f64>) -> Result<f64, TierFailure> {
    market_cap
        .filter(|mc| *mc > 0.0)
        .map(|mc| mc / BILLION)
        .ok_or(TierFailure::MissingMarketCap)
}

pub struct MarketDataResolver {
    provider: Arc<dyn MarketDataProvider>,
    cache: Arc<dyn Cache<String, Vec<AssetQuote>>>,
    history_days: u32,
}

impl MarketDataResolver {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        cache: Arc<dyn Cache<String, Vec<AssetQuote>>>,
        history_days: u32,
    ) -> Self {
        MarketDataResolver {
            provider,
            cache,
            history_days,
        }
    }

    fn batch_key(symbols: &[SymbolKey], ttl: Duration) -> String {
        let raw: Vec<&str> = symbols.iter().map(|s| s.raw.as_str()).collect();
        format!("{}@{}s", raw.join(","), ttl.as_secs())
    }

    /// Resolves every symbol, skipping the ones no tier could resolve.
    ///
    /// The whole batch is cached under the symbol set and `ttl`. A fresh entry
    /// is returned as stored without touching the provider. Output order
    /// follows `symbols`. `on_resolved` is called once per symbol looked up.
    pub async fn resolve_all(
        &self,
        symbols: &[SymbolKey],
        ttl: Duration,
        on_resolved: &(dyn Fn() + Sync),
    ) -> Vec<AssetQuote> {
        let key = Self::batch_key(symbols, ttl);
        if let Some(cached) = self.cache.get(&key, ttl).await {
            info!(count = cached.len(), "Using cached quotes");
            return cached;
        }

        let futures = symbols.iter().map(|symbol| async move {
            let result = self.resolve(symbol).await;
            on_resolved();
            result
        });

        let quotes: Vec<AssetQuote> = join_all(futures)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(quote) => Some(quote),
                Err(failure) => {
                    debug!("{}", failure);
                    None
                }
            })
            .collect();

        if !quotes.is_empty() {
            // Batches for other symbol sets are never read again once stale
            self.cache.purge_expired(ttl).await;
            self.cache.put(key, quotes.clone()).await;
        }
        quotes
    }

    /// Drops every cached batch so the next lookup goes to the provider.
    pub async fn invalidate(&self) {
        info!("Invalidating quote cache");
        self.cache.clear().await;
    }

    /// Runs the tier chain for one symbol, first success wins.
    #[instrument(name = "ResolveSymbol", skip(self), fields(symbol = %symbol.raw))]
    pub async fn resolve(&self, symbol: &SymbolKey) -> Result<AssetQuote, ResolutionFailure> {
        let mut attempts = Vec::new();

        for tier in [QuoteTier::FastSnapshot, QuoteTier::History, QuoteTier::Metadata] {
            let outcome = match tier {
                QuoteTier::FastSnapshot => self.fast_snapshot_tier(symbol).await,
                QuoteTier::History => self.history_tier(symbol).await,
                QuoteTier::Metadata => self.metadata_tier(symbol).await,
            };
            match outcome {
                Ok(quote) => {
                    debug!(%tier, price = quote.price, "Resolved quote");
                    return Ok(quote);
                }
                Err(failure) => {
                    debug!(%tier, %failure, "Tier failed");
                    attempts.push((tier, failure));
                }
            }
        }

        Err(ResolutionFailure {
            symbol: symbol.raw.clone(),
            attempts,
        })
    }

    /// Last price from the fast snapshot request alone, no market cap needed.
    pub async fn spot_price(&self, symbol: &str) -> Result<f64, TierFailure> {
        let quote = self
            .provider
            .fast_quote(symbol)
            .await
            .map_err(TierFailure::Provider)?;
        positive_price(quote.last_price)
    }

    async fn fast_snapshot_tier(&self, symbol: &SymbolKey) -> Result<AssetQuote, TierFailure> {
        let quote = self
            .provider
            .fast_quote(&symbol.raw)
            .await
            .map_err(TierFailure::Provider)?;

        Ok(AssetQuote {
            raw_symbol: symbol.raw.clone(),
            display_symbol: symbol.display.clone(),
            price: positive_price(quote.last_price)?,
            market_cap_billions: market_cap_billions(quote.market_cap)?,
            currency: quote.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            short_name: quote.short_name,
            source: QuoteTier::FastSnapshot,
        })
    }

    async fn history_tier(&self, symbol: &SymbolKey) -> Result<AssetQuote, TierFailure> {
        let closes = self
            .provider
            .daily_closes(&symbol.raw, self.history_days)
            .await
            .map_err(TierFailure::Provider)?;
        let latest = closes
            .iter()
            .rev()
            .find(|c| c.close > 0.0)
            .map(|c| c.close);
        let price = match latest {
            Some(price) => price,
            None if closes.is_empty() => return Err(TierFailure::NoCloses(self.history_days)),
            None => positive_price(closes.last().map(|c| c.close))?,
        };

        let metadata = self
            .provider
            .metadata(&symbol.raw)
            .await
            .map_err(TierFailure::Provider)?;
        Self::quote_from_metadata(symbol, price, metadata, QuoteTier::History)
    }

    async fn metadata_tier(&self, symbol: &SymbolKey) -> Result<AssetQuote, TierFailure> {
        let metadata = self
            .provider
            .metadata(&symbol.raw)
            .await
            .map_err(TierFailure::Provider)?;
        let price = positive_price(metadata.previous_close.or(metadata.regular_market_price))?;
        Self::quote_from_metadata(symbol, price, metadata, QuoteTier::Metadata)
    }

    fn quote_from_metadata(
        symbol: &SymbolKey,
        price: f64,
        metadata: AssetMetadata,
        source: QuoteTier,
    ) -> Result<AssetQuote, TierFailure> {
        Ok(AssetQuote {
            raw_symbol: symbol.raw.clone(),
            display_symbol: symbol.display.clone(),
            price,
            market_cap_billions: market_cap_billions(metadata.market_cap)?,
            currency: metadata
                .currency
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            short_name: metadata.display_name,
            source,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::market::{DailyClose, FastQuote};
    use crate::store::memory::MemoryCache;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DAY: Duration = Duration::from_secs(86_400);

    /// Scripted provider: symbols missing from a map make that request fail.
    #[derive(Default)]
    pub(crate) struct MockProvider {
        pub fast: HashMap<String, FastQuote>,
        pub history: HashMap<String, Vec<DailyClose>>,
        pub metadata: HashMap<String, AssetMetadata>,
        pub fast_calls: AtomicUsize,
        pub history_calls: AtomicUsize,
        pub metadata_calls: AtomicUsize,
    }

    impl MockProvider {
        pub fn with_fast(mut self, symbol: &str, price: f64, market_cap: f64, ccy: &str) -> Self {
            self.fast.insert(
                symbol.to_string(),
                FastQuote {
                    last_price: Some(price),
                    market_cap: Some(market_cap),
                    currency: Some(ccy.to_string()),
                    short_name: None,
                },
            );
            self
        }

        pub fn with_history(mut self, symbol: &str, closes: &[f64]) -> Self {
            let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
            let history = closes
                .iter()
                .enumerate()
                .map(|(i, close)| DailyClose {
                    date: start + chrono::Duration::days(i as i64),
                    close: *close,
                })
                .collect();
            self.history.insert(symbol.to_string(), history);
            self
        }

        pub fn with_metadata(mut self, symbol: &str, previous_close: f64, market_cap: f64) -> Self {
            self.metadata.insert(
                symbol.to_string(),
                AssetMetadata {
                    previous_close: Some(previous_close),
                    regular_market_price: None,
                    market_cap: Some(market_cap),
                    currency: Some("USD".to_string()),
                    display_name: Some(format!("{symbol} Inc.")),
                },
            );
            self
        }

        pub fn total_calls(&self) -> usize {
            self.fast_calls.load(Ordering::SeqCst)
                + self.history_calls.load(Ordering::SeqCst)
                + self.metadata_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        async fn fast_quote(&self, symbol: &str) -> Result<FastQuote> {
            self.fast_calls.fetch_add(1, Ordering::SeqCst);
            self.fast
                .get(symbol)
                .cloned()
                .ok_or_else(|| anyhow!("fast quote unavailable for {}", symbol))
        }

        async fn daily_closes(&self, symbol: &str, _lookback_days: u32) -> Result<Vec<DailyClose>> {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            self.history
                .get(symbol)
                .cloned()
                .ok_or_else(|| anyhow!("history unavailable for {}", symbol))
        }

        async fn metadata(&self, symbol: &str) -> Result<AssetMetadata> {
            self.metadata_calls.fetch_add(1, Ordering::SeqCst);
            self.metadata
                .get(symbol)
                .cloned()
                .ok_or_else(|| anyhow!("metadata unavailable for {}", symbol))
        }
    }

    fn resolver(provider: Arc<MockProvider>) -> MarketDataResolver {
        MarketDataResolver::new(
            provider,
            Arc::new(MemoryCache::<String, Vec<AssetQuote>>::new()),
            5,
        )
    }

    fn keys(symbols: &[&str]) -> Vec<SymbolKey> {
        symbols.iter().map(|s| SymbolKey::normalize(s)).collect()
    }

    #[tokio::test]
    async fn test_fast_snapshot_wins() {
        let provider = Arc::new(MockProvider::default().with_fast("AAPL", 150.0, 2.4e12, "USD"));
        let quote = resolver(provider.clone())
            .resolve(&SymbolKey::normalize("aapl"))
            .await
            .unwrap();

        assert_eq!(quote.raw_symbol, "AAPL");
        assert_eq!(quote.display_symbol, "AAPL");
        assert_eq!(quote.price, 150.0);
        assert_eq!(quote.market_cap_billions, 2400.0);
        assert_eq!(quote.source, QuoteTier::FastSnapshot);
        assert_eq!(provider.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_history_tier_used_when_fast_fails() {
        let provider = Arc::new(
            MockProvider::default()
                .with_history("3350.T", &[1200.0, 1210.0, 1225.0])
                .with_metadata("3350.T", 1190.0, 2.0e11),
        );
        let resolver = resolver(provider.clone());
        let quote = resolver
            .resolve(&SymbolKey::normalize("3350.T"))
            .await
            .unwrap();

        let expected = AssetQuote {
            raw_symbol: "3350.T".to_string(),
            display_symbol: "3350".to_string(),
            price: 1225.0,
            market_cap_billions: 200.0,
            currency: "USD".to_string(),
            short_name: Some("3350.T Inc.".to_string()),
            source: QuoteTier::History,
        };
        assert_eq!(quote, expected);
        // The metadata tier itself never ran: one metadata call, made by the history tier
        assert_eq!(provider.fast_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.history_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.metadata_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_positive_fast_price_falls_through() {
        let provider = Arc::new(
            MockProvider::default()
                .with_fast("ETH-USD", 0.0, 4.0e11, "USD")
                .with_metadata("ETH-USD", 3300.0, 4.0e11),
        );
        let quote = resolver(provider)
            .resolve(&SymbolKey::normalize("ETH-USD"))
            .await
            .unwrap();

        assert_eq!(quote.source, QuoteTier::Metadata);
        assert_eq!(quote.price, 3300.0);
        assert_eq!(quote.display_symbol, "ETH");
    }

    #[tokio::test]
    async fn test_history_latest_positive_close() {
        let provider = Arc::new(
            MockProvider::default()
                .with_history("SOL-USD", &[140.0, 150.0, 0.0])
                .with_metadata("SOL-USD", 149.0, 7.0e10),
        );
        let quote = resolver(provider)
            .resolve(&SymbolKey::normalize("SOL-USD"))
            .await
            .unwrap();
        assert_eq!(quote.source, QuoteTier::History);
        assert_eq!(quote.price, 150.0);
    }

    #[tokio::test]
    async fn test_all_tiers_fail() {
        let mut provider = MockProvider::default();
        provider.metadata.insert(
            "DEAD".to_string(),
            AssetMetadata {
                previous_close: Some(0.0),
                market_cap: Some(1.0e9),
                ..Default::default()
            },
        );
        let resolver = resolver(Arc::new(provider));

        let failure = resolver
            .resolve(&SymbolKey::normalize("DEAD"))
            .await
            .unwrap_err();
        assert_eq!(failure.symbol, "DEAD");
        assert_eq!(failure.attempts.len(), 3);
        assert!(matches!(
            failure.attempts[0],
            (QuoteTier::FastSnapshot, TierFailure::Provider(_))
        ));
        assert!(matches!(
            failure.attempts[1],
            (QuoteTier::History, TierFailure::Provider(_))
        ));
        assert!(matches!(
            failure.attempts[2],
            (QuoteTier::Metadata, TierFailure::NonPositivePrice(p)) if p == 0.0
        ));

        let quotes = resolver
            .resolve_all(&keys(&["DEAD"]), DAY, &|| ())
            .await;
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn test_missing_market_cap_is_a_tier_failure() {
        let mut provider = MockProvider::default();
        provider.fast.insert(
            "GLD".to_string(),
            FastQuote {
                last_price: Some(220.0),
                ..Default::default()
            },
        );
        let failure = resolver(Arc::new(provider))
            .resolve(&SymbolKey::normalize("GLD"))
            .await
            .unwrap_err();
        assert!(matches!(
            failure.attempts[0],
            (QuoteTier::FastSnapshot, TierFailure::MissingMarketCap)
        ));
    }

    #[tokio::test]
    async fn test_resolve_all_skips_failures_and_keeps_order() {
        let provider = Arc::new(
            MockProvider::default()
                .with_fast("TSLA", 250.0, 8.0e11, "USD")
                .with_fast("AAPL", 150.0, 2.4e12, "USD")
                .with_metadata("BTC-USD", 60000.0, 1.2e12),
        );
        let resolver = resolver(provider);
        let counter = AtomicUsize::new(0);

        let quotes = resolver
            .resolve_all(&keys(&["TSLA", "NOPE", "BTC-USD", "AAPL"]), DAY, &|| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        let symbols: Vec<_> = quotes.iter().map(|q| q.display_symbol.as_str()).collect();
        assert_eq!(symbols, vec!["TSLA", "BTC", "AAPL"]);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_resolve_all_uses_cache() {
        let provider = Arc::new(MockProvider::default().with_fast("AAPL", 150.0, 2.4e12, "USD"));
        let resolver = resolver(provider.clone());
        let symbols = keys(&["AAPL"]);

        let first = resolver.resolve_all(&symbols, DAY, &|| ()).await;
        assert_eq!(provider.total_calls(), 1);

        let second = resolver.resolve_all(&symbols, DAY, &|| ()).await;
        assert_eq!(second, first);
        assert_eq!(provider.total_calls(), 1);

        // A different freshness budget is a different batch
        resolver
            .resolve_all(&symbols, Duration::from_secs(60), &|| ())
            .await;
        assert_eq!(provider.total_calls(), 2);

        resolver.invalidate().await;
        resolver.resolve_all(&symbols, DAY, &|| ()).await;
        assert_eq!(provider.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_expired_batch_is_recomputed() {
        let provider = Arc::new(MockProvider::default().with_fast("AAPL", 150.0, 2.4e12, "USD"));
        let resolver = resolver(provider.clone());
        let symbols = keys(&["AAPL"]);
        let ttl = Duration::from_millis(10);

        resolver.resolve_all(&symbols, ttl, &|| ()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        resolver.resolve_all(&symbols, ttl, &|| ()).await;
        assert_eq!(provider.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_batches_dropped_on_write() {
        let provider = Arc::new(
            MockProvider::default()
                .with_fast("AAPL", 150.0, 2.4e12, "USD")
                .with_fast("NVDA", 100.0, 1.0e12, "USD"),
        );
        let cache = Arc::new(MemoryCache::<String, Vec<AssetQuote>>::new());
        let resolver = MarketDataResolver::new(provider, cache.clone(), 5);
        let ttl = Duration::from_millis(30);

        resolver.resolve_all(&keys(&["AAPL"]), ttl, &|| ()).await;
        assert!(cache.get(&"AAPL@0s".to_string(), DAY).await.is_some());

        tokio::time::sleep(Duration::from_millis(50)).await;
        resolver.resolve_all(&keys(&["NVDA"]), ttl, &|| ()).await;
        assert!(cache.get(&"AAPL@0s".to_string(), DAY).await.is_none());
        assert!(cache.get(&"NVDA@0s".to_string(), DAY).await.is_some());
    }

    #[tokio::test]
    async fn test_empty_batch_not_cached() {
        let provider = Arc::new(MockProvider::default());
        let resolver = resolver(provider.clone());
        let symbols = keys(&["NOPE"]);

        resolver.resolve_all(&symbols, DAY, &|| ()).await;
        let calls = provider.total_calls();
        resolver.resolve_all(&symbols, DAY, &|| ()).await;
        assert_eq!(provider.total_calls(), calls * 2);
    }

    #[tokio::test]
    async fn test_spot_price() {
        let provider = Arc::new(
            MockProvider::default()
                .with_fast("EURUSD=X", 1.08, 0.0, "USD")
                .with_fast("BADUSD=X", -1.0, 0.0, "USD"),
        );
        let resolver = resolver(provider);
        assert_eq!(resolver.spot_price("EURUSD=X").await.unwrap(), 1.08);
        assert!(matches!(
            resolver.spot_price("BADUSD=X").await,
            Err(TierFailure::NonPositivePrice(_))
        ));
        assert!(matches!(
            resolver.spot_price("XYZUSD=X").await,
            Err(TierFailure::Provider(_))
        ));
    }

    #[test]
    fn test_failure_display_lists_tiers() {
        let failure = ResolutionFailure {
            symbol: "DEAD".to_string(),
            attempts: vec![
                (QuoteTier::FastSnapshot, TierFailure::MissingPrice),
                (QuoteTier::History, TierFailure::NoCloses(5)),
            ],
        };
        assert_eq!(
            failure.to_string(),
            "could not resolve DEAD; snapshot: no price returned; history: no closing prices in the last 5 days"
        );
    }
}
