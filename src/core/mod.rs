//! Core business logic: symbols, quotes, caching contract and projections

pub mod cache;
pub mod config;
pub mod currency;
pub mod log;
pub mod market;
pub mod pipeline;
pub mod portfolio;
pub mod projection;
pub mod resolver;
pub mod symbol;

// Re-export main types for cleaner imports
pub use market::{AssetQuote, MarketDataProvider, QuoteTier};
pub use portfolio::{PortfolioStore, ProjectionTarget};
pub use projection::{ProjectionReport, ProjectionResult};
pub use symbol::SymbolKey;
