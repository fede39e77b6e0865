//! Quote provider trait and structured error types.
//!
//! The QuoteProvider trait abstracts over market-data sources (Yahoo chart
//! API, Stooq CSV endpoint) so the pipeline can swap implementations and mock
//! for tests. A [`ProviderSet`] holds the small fixed set of configured
//! providers plus the name of the preferred one used for conflict tie-breaks.

pub mod circuit_breaker;
pub mod stooq;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use stooq::StooqProvider;
pub use yahoo::YahooProvider;

use chrono::NaiveDate;
use log::warn;
use thiserror::Error;

use crate::domain::PriceQuote;

/// One daily closing quote from a provider (before reconciliation).
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderQuote {
    pub date: NaiveDate,
    pub close: f64,
    pub adj_close: f64,
}

/// Structured error types for provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("ticker not found: {ticker}")]
    TickerNotFound { ticker: String },

    #[error("hard stop: provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("provider error: {0}")]
    Other(String),
}

/// Trait for daily quote providers.
///
/// Implementations handle the specifics of one vendor's endpoint. The store
/// and reconciler sit above this trait — providers know nothing about either.
pub trait QuoteProvider: Send + Sync {
    /// Stable provider identifier, recorded on every quote row.
    fn name(&self) -> &str;

    /// Fetch daily close/adjusted-close quotes over an inclusive date range.
    fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ProviderQuote>, ProviderError>;

    /// Whether the provider is currently usable (not rate-limited or blocked).
    fn is_available(&self) -> bool;
}

/// The configured provider roster with its preferred member.
pub struct ProviderSet {
    providers: Vec<Box<dyn QuoteProvider>>,
    preferred: String,
}

impl ProviderSet {
    pub fn new(providers: Vec<Box<dyn QuoteProvider>>, preferred: impl Into<String>) -> Self {
        Self {
            providers,
            preferred: preferred.into(),
        }
    }

    /// Provider whose values win reconciliation conflicts.
    pub fn preferred(&self) -> &str {
        &self.preferred
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Fetch one ticker from every available provider.
    ///
    /// A failing provider is logged and skipped — its quotes are simply absent
    /// from the cells it would have contributed to; reconciliation degrades to
    /// fewer providers rather than the whole ingest failing.
    pub fn fetch_all(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Vec<PriceQuote> {
        let mut quotes = Vec::new();
        for provider in &self.providers {
            if !provider.is_available() {
                warn!("provider {} unavailable, skipping {ticker}", provider.name());
                continue;
            }
            match provider.fetch_daily(ticker, start, end) {
                Ok(daily) => {
                    for q in daily {
                        quotes.push(PriceQuote {
                            ticker: ticker.to_string(),
                            date: q.date,
                            provider: provider.name().to_string(),
                            close: q.close,
                            adj_close: q.adj_close,
                        });
                    }
                }
                Err(e) => {
                    warn!("provider {} failed for {ticker}: {e}", provider.name());
                }
            }
        }
        quotes
    }
}
