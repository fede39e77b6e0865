//! IndexLab Core — canonical prices, trading calendar, weights, divisor math.
//!
//! This crate contains the heart of the benchmark index engine:
//! - Domain types (provider quotes, canonical prices, weight snapshots, levels, returns)
//! - Canonical price reconciler with quality tiers (multi-provider merge)
//! - Trading calendar with coverage-based holiday inference and bad-day audit
//! - Forward-fill imputer for missing canonical prices
//! - Rebalance snapshot expansion into a daily weight schedule
//! - Divisor-based index level calculation with continuity across rebalances
//! - Daily return derivation for the index and each constituent
//! - Quote provider trait with HTTP implementations and a circuit breaker
//! - Parquet-backed table store with idempotent upserts

pub mod benchmark;
pub mod calendar;
pub mod constituents;
pub mod domain;
pub mod impute;
pub mod provider;
pub mod reconcile;
pub mod returns;
pub mod store;
pub mod universe;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types that cross the pipeline boundary are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::PriceQuote>();
        require_sync::<domain::PriceQuote>();
        require_send::<domain::CanonicalPrice>();
        require_sync::<domain::CanonicalPrice>();
        require_send::<domain::ConstituentWeight>();
        require_sync::<domain::ConstituentWeight>();
        require_send::<domain::DailyWeight>();
        require_sync::<domain::DailyWeight>();
        require_send::<domain::IndexLevel>();
        require_sync::<domain::IndexLevel>();
        require_send::<domain::ReturnRow>();
        require_sync::<domain::ReturnRow>();

        require_send::<reconcile::Reconciled>();
        require_sync::<reconcile::Reconciled>();
        require_send::<store::TableStore>();
        require_sync::<store::TableStore>();
        require_send::<provider::ProviderSet>();
        require_sync::<provider::ProviderSet>();
    }
}
