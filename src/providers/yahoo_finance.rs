use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::core::config::YahooProviderConfig;
use crate::core::market::{AssetMetadata, DailyClose, FastQuote, MarketDataProvider};
use crate::providers::util::{RetryPolicy, with_retry};

const USER_AGENT: &str = "cagr2030/0.1";

pub struct YahooFinanceProvider {
    base_url: String,
    retry: RetryPolicy,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str) -> Self {
        YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::new(0, 0),
        }
    }

    pub fn from_config(config: &YahooProviderConfig) -> Self {
        YahooFinanceProvider {
            retry: RetryPolicy::new(config.retries, config.retry_delay_ms),
            ..Self::new(&config.base_url)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, symbol: &str) -> Result<T> {
        debug!("Requesting {}", url);
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        let response = with_retry(
            || {
                let request = client.get(url.clone());
                async move { request.send().await.and_then(|r| r.error_for_status()) }
            },
            self.retry,
        )
        .await
        .map_err(|e| match e.status() {
            Some(status) => anyhow!("HTTP error: {} for symbol: {}", status, symbol),
            None => anyhow!("Request error: {} for symbol: {}", e, symbol),
        })?;

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))
    }
}

#[derive(Deserialize, Debug)]
struct QuoteEnvelope {
    #[serde(rename = "quoteResponse")]
    quote_response: QuoteResult,
}

#[derive(Deserialize, Debug)]
struct QuoteResult {
    result: Vec<QuoteItem>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QuoteItem {
    regular_market_price: Option<f64>,
    market_cap: Option<f64>,
    currency: Option<String>,
    short_name: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChartEnvelope {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<ChartQuote>,
}

#[derive(Deserialize, Debug)]
struct ChartQuote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct SummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryResult,
}

#[derive(Deserialize, Debug)]
struct SummaryResult {
    result: Option<Vec<SummaryItem>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SummaryItem {
    price: Option<PriceModule>,
    summary_detail: Option<SummaryDetailModule>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    regular_market_price: Option<RawValue>,
    regular_market_previous_close: Option<RawValue>,
    market_cap: Option<RawValue>,
    currency: Option<String>,
    short_name: Option<String>,
    long_name: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SummaryDetailModule {
    previous_close: Option<RawValue>,
    market_cap: Option<RawValue>,
    currency: Option<String>,
}

/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}`, or `{}` when absent.
#[derive(Deserialize, Debug)]
struct RawValue {
    raw: Option<f64>,
}

fn raw(value: &Option<RawValue>) -> Option<f64> {
    value.as_ref().and_then(|v| v.raw)
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    #[instrument(name = "YahooFastQuote", skip(self), fields(symbol = %symbol))]
    async fn fast_quote(&self, symbol: &str) -> Result<FastQuote> {
        let url = Url::parse_with_params(
            &format!("{}/v7/finance/quote", self.base_url),
            &[("symbols", symbol)],
        )?;
        let data: QuoteEnvelope = self.get_json(url, symbol).await?;

        let item = data
            .quote_response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No quote data found for symbol: {}", symbol))?;

        Ok(FastQuote {
            last_price: item.regular_market_price,
            market_cap: item.market_cap,
            currency: item.currency,
            short_name: item.short_name,
        })
    }

    #[instrument(name = "YahooDailyCloses", skip(self), fields(symbol = %symbol))]
    async fn daily_closes(&self, symbol: &str, lookback_days: u32) -> Result<Vec<DailyClose>> {
        let url = Url::parse_with_params(
            &format!("{}/v8/finance/chart/{}", self.base_url, symbol),
            &[
                ("interval", "1d".to_string()),
                ("range", format!("{lookback_days}d")),
            ],
        )?;
        let data: ChartEnvelope = self.get_json(url, symbol).await?;

        let item = data
            .chart
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| anyhow!("No price history found for symbol: {}", symbol))?;

        let (Some(timestamps), Some(closes)) = (
            item.timestamp,
            item.indicators
                .and_then(|inds| inds.quote.into_iter().next())
                .and_then(|q| q.close),
        ) else {
            return Ok(Vec::new());
        };

        let history = timestamps
            .iter()
            .zip(closes)
            .filter_map(|(ts, close)| {
                let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
                close.map(|close| DailyClose { date, close })
            })
            .collect();
        Ok(history)
    }

    #[instrument(name = "YahooMetadata", skip(self), fields(symbol = %symbol))]
    async fn metadata(&self, symbol: &str) -> Result<AssetMetadata> {
        let url = Url::parse_with_params(
            &format!("{}/v10/finance/quoteSummary/{}", self.base_url, symbol),
            &[("modules", "price,summaryDetail")],
        )?;
        let data: SummaryEnvelope = self.get_json(url, symbol).await?;

        let item = data
            .quote_summary
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| anyhow!("No metadata found for symbol: {}", symbol))?;

        let price = item.price;
        let detail = item.summary_detail;

        let previous_close = detail
            .as_ref()
            .and_then(|d| raw(&d.previous_close))
            .or_else(|| price.as_ref().and_then(|p| raw(&p.regular_market_previous_close)));
        let market_cap = price
            .as_ref()
            .and_then(|p| raw(&p.market_cap))
            .or_else(|| detail.as_ref().and_then(|d| raw(&d.market_cap)));
        let currency = price
            .as_ref()
            .and_then(|p| p.currency.clone())
            .or_else(|| detail.as_ref().and_then(|d| d.currency.clone()));

        Ok(AssetMetadata {
            previous_close,
            regular_market_price: price.as_ref().and_then(|p| raw(&p.regular_market_price)),
            market_cap,
            currency,
            display_name: price.and_then(|p| p.short_name.or(p.long_name)),
        })
    }
}
