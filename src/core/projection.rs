//! Turns current quotes and 2030 targets into growth rates, target prices and a ranking.
use crate::core::market::AssetQuote;
use crate::core::portfolio::ProjectionTarget;

/// Years between now and the target date.
pub const HORIZON_YEARS: f64 = 5.0;

/// Growth ratios are clamped here before the fractional exponent.
pub const MIN_GROWTH_RATIO: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionResult {
    pub quote: AssetQuote,
    pub target: ProjectionTarget,
    pub target_price: f64,
    pub cagr_percent: f64,
    pub weighted_cagr_contribution: f64,
    /// 1 is the highest CAGR.
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionReport {
    /// Ordered by rank.
    pub results: Vec<ProjectionResult>,
    pub portfolio_cagr: f64,
    /// Sum of weights, not normalized to 100.
    pub total_allocation: f64,
}

/// Annual growth in percent turning `growth_ratio` into reality over the horizon.
pub fn cagr_percent(growth_ratio: f64) -> f64 {
    let ratio = growth_ratio.max(MIN_GROWTH_RATIO);
    (ratio.powf(1.0 / HORIZON_YEARS) - 1.0) * 100.0
}

/// `(target_price, cagr_percent)` for one asset. A non-positive current
/// market cap yields zeros.
pub fn project_values(price: f64, current_market_cap: f64, target_market_cap: f64) -> (f64, f64) {
    if current_market_cap <= 0.0 {
        return (0.0, 0.0);
    }
    let growth_ratio = target_market_cap / current_market_cap;
    (price * growth_ratio, cagr_percent(growth_ratio))
}

/// Projects every pair and ranks the results by CAGR, ties keeping input order.
pub fn project(pairs: Vec<(AssetQuote, ProjectionTarget)>) -> ProjectionReport {
    let mut results: Vec<ProjectionResult> = pairs
        .into_iter()
        .map(|(quote, target)| {
            let (target_price, cagr_percent) = project_values(
                quote.price,
                quote.market_cap_billions,
                target.target_market_cap_billions,
            );
            ProjectionResult {
                weighted_cagr_contribution: cagr_percent * (target.weight_percent / 100.0),
                quote,
                target,
                target_price,
                cagr_percent,
                rank: 0,
            }
        })
        .collect();

    // sort_by is stable
    results.sort_by(|a, b| b.cagr_percent.total_cmp(&a.cagr_percent));
    for (i, result) in results.iter_mut().enumerate() {
        result.rank = i + 1;
    }

    ProjectionReport {
        portfolio_cagr: results.iter().map(|r| r.weighted_cagr_contribution).sum(),
        total_allocation: results.iter().map(|r| r.target.weight_percent).sum(),
        results,
    }
}
