//! Step 1: ingest constituent snapshots and provider quotes, then reconcile.
//!
//! Both external inputs land here: snapshot CSVs append into the weights
//! table and provider quotes insert into the quotes table. Reconciliation
//! then recomputes every canonical cell from the persisted quotes, so a cell
//! is refreshed whenever any provider delivered a new quote for it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use log::{debug, info};

use indexlab_core::constituents::load_snapshots;
use indexlab_core::reconcile::{reconcile, CellQuote, ReconcileError};

use super::{PipelineStep, StepContext, StepError, StepOutcome};

pub struct IngestPrices;

impl PipelineStep for IngestPrices {
    fn name(&self) -> &'static str {
        "ingest_prices"
    }

    fn run(&self, ctx: &mut StepContext) -> Result<StepOutcome, StepError> {
        // Snapshot files are the collaborator handoff; absent is a cold
        // pipeline, not an error.
        let path = &ctx.config.constituents_path;
        if path.exists() {
            let snapshots = load_snapshots(path)?;
            let stats = ctx.store.append_weights(&snapshots)?;
            info!(
                "constituent snapshots: {} rows ({} new)",
                snapshots.len(),
                stats.inserted
            );
        }

        let tickers: BTreeSet<String> = ctx
            .store
            .load_weights()?
            .into_iter()
            .map(|w| w.ticker)
            .collect();
        if tickers.is_empty() {
            return Ok(StepOutcome::Skipped {
                reason: "no constituents found".into(),
            });
        }

        if ctx.providers.is_empty() {
            return Ok(StepOutcome::Skipped {
                reason: "no providers configured".into(),
            });
        }

        let (start, end) = ctx.config.ingest_range();
        let mut fetched = Vec::new();
        for ticker in &tickers {
            fetched.extend(ctx.providers.fetch_all(ticker, start, end));
        }
        let fetch_stats = ctx.store.upsert_quotes(&fetched)?;

        // Recompute canonical cells from the persisted quotes (not the fetch
        // buffer) — a re-run after a partial failure reconciles everything.
        let quotes = ctx.store.load_quotes()?;
        if quotes.is_empty() {
            return Ok(StepOutcome::Skipped {
                reason: "no quotes from any provider yet".into(),
            });
        }

        let mut cells: BTreeMap<(String, NaiveDate), Vec<CellQuote>> = BTreeMap::new();
        for quote in quotes {
            cells
                .entry((quote.ticker.clone(), quote.date))
                .or_default()
                .push(CellQuote {
                    provider: quote.provider,
                    close: quote.close,
                    adj_close: quote.adj_close,
                });
        }

        let reconcile_config = ctx.config.to_reconcile_config();
        let mut canonical = Vec::with_capacity(cells.len());
        for ((ticker, date), cell_quotes) in cells {
            match reconcile(&ticker, date, &cell_quotes, &reconcile_config) {
                Ok(outcome) => canonical.push(outcome.into_canonical(&ticker, date)),
                Err(ReconcileError::NoPriceAvailable { .. }) => {
                    // Every quote was unusable; the cell stays open for imputation.
                    debug!("no usable quote for {ticker} on {date}");
                }
            }
        }
        let canon_stats = ctx.store.upsert_canonical(&canonical)?;

        Ok(StepOutcome::Completed {
            summary: format!(
                "{} quotes ({} new), {} canonical cells ({} new, {} recomputed)",
                fetch_stats.inserted + fetch_stats.unchanged,
                fetch_stats.inserted,
                canonical.len(),
                canon_stats.inserted,
                canon_stats.replaced,
            ),
        })
    }
}
