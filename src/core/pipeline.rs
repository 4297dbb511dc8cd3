//! One refresh cycle: resolve quotes, convert currencies, join targets, project.
use crate::core::currency::CurrencyNormalizer;
use crate::core::market::AssetQuote;
use crate::core::portfolio::PortfolioStore;
use crate::core::projection::{ProjectionReport, project};
use crate::core::resolver::MarketDataResolver;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("No symbols are tracked")]
    NoSymbols,
    #[error("Could not fetch data for any of: {0}")]
    NoData(String),
}

#[derive(Debug)]
pub struct PipelineOutput {
    /// Resolved quotes in tracked order, after currency conversion.
    pub quotes: Vec<AssetQuote>,
    pub report: ProjectionReport,
    /// Lookup keys no tier could resolve.
    pub unresolved: Vec<String>,
}

pub struct Pipeline<'a> {
    pub resolver: &'a MarketDataResolver,
    pub normalizer: &'a CurrencyNormalizer<'a>,
    pub ttl: Duration,
    pub target_multiplier: f64,
}

impl Pipeline<'_> {
    pub async fn run(
        &self,
        store: &mut PortfolioStore,
        on_resolved: &(dyn Fn() + Sync),
    ) -> Result<PipelineOutput, PipelineError> {
        let symbols = store.list_symbols().to_vec();
        if symbols.is_empty() {
            return Err(PipelineError::NoSymbols);
        }

        let resolved = self
            .resolver
            .resolve_all(&symbols, self.ttl, on_resolved)
            .await;
        if resolved.is_empty() {
            let reference = store.share_reference();
            return Err(PipelineError::NoData(reference.replace(',', ", ")));
        }

        let mut quotes = Vec::with_capacity(resolved.len());
        for quote in resolved {
            quotes.push(self.normalizer.normalize(quote).await);
        }

        let unresolved = symbols
            .iter()
            .filter(|s| !quotes.iter().any(|q| q.raw_symbol == s.raw))
            .map(|s| s.raw.clone())
            .collect();

        let pairs = quotes
            .iter()
            .map(|quote| {
                let target = store.target_or_default(quote, self.target_multiplier);
                (quote.clone(), target)
            })
            .collect();
        let report = project(pairs);
        info!(
            resolved = quotes.len(),
            portfolio_cagr = report.portfolio_cagr,
            "Projection complete"
        );

        Ok(PipelineOutput {
            quotes,
            report,
            unresolved,
        })
    }
}
