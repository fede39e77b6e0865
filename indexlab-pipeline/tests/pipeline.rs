//! End-to-end pipeline tests against scripted providers.
//!
//! These drive the real step list over a temp data directory: snapshot CSVs
//! in, Parquet tables out, with provider quotes served from fixtures instead
//! of HTTP.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;

use indexlab_core::domain::INDEX_TICKER;
use indexlab_core::provider::{ProviderError, ProviderQuote, ProviderSet, QuoteProvider};
use indexlab_core::reconcile::FORWARD_FILL_PROVIDER;
use indexlab_core::store::{TableStore, LEVELS_TABLE, RETURNS_TABLE};
use indexlab_pipeline::lock::PipelineLock;
use indexlab_pipeline::steps::run_pipeline;
use indexlab_pipeline::{PipelineConfig, PipelineError, StepOutcome};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Provider that serves a fixed per-ticker quote script.
struct ScriptedProvider {
    name: &'static str,
    quotes: HashMap<&'static str, Vec<(NaiveDate, f64)>>,
}

impl ScriptedProvider {
    fn new(name: &'static str, quotes: &[(&'static str, &str, f64)]) -> Self {
        let mut map: HashMap<&'static str, Vec<(NaiveDate, f64)>> = HashMap::new();
        for (ticker, date, close) in quotes {
            map.entry(ticker).or_default().push((d(date), *close));
        }
        Self { name, quotes: map }
    }
}

impl QuoteProvider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ProviderQuote>, ProviderError> {
        let quotes = self
            .quotes
            .get(ticker)
            .ok_or_else(|| ProviderError::TickerNotFound {
                ticker: ticker.to_string(),
            })?;
        Ok(quotes
            .iter()
            .filter(|(date, _)| *date >= start && *date <= end)
            .map(|(date, close)| ProviderQuote {
                date: *date,
                close: *close,
                adj_close: *close,
            })
            .collect())
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn write_constituents(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("constituents.csv");
    std::fs::write(
        &path,
        "rebalance_date,ticker,weight_pct\n\
         2024-01-02,AAA,0.6\n\
         2024-01-02,BBB,0.4\n\
         2024-01-04,AAA,0.5\n\
         2024-01-04,BBB,0.5\n",
    )
    .unwrap();
    path
}

fn config_for(dir: &Path, constituents: &Path) -> PipelineConfig {
    PipelineConfig::from_toml(&format!(
        r#"
data_dir = "{data}"
constituents_path = "{constituents}"

[providers]
preferred = "alpha"

[index]
base_date = "2024-01-02"

[ingest]
end_date = "2024-01-05"

[lock]
wait_timeout_secs = 5
"#,
        data = dir.join("data").display(),
        constituents = constituents.display(),
    ))
    .unwrap()
}

/// Two agreeing providers; BBB has no quote on 2024-01-03 from either.
fn agreeing_providers() -> ProviderSet {
    let script: Vec<(&'static str, &str, f64)> = vec![
        ("AAA", "2024-01-02", 100.0),
        ("AAA", "2024-01-03", 101.0),
        ("AAA", "2024-01-04", 102.0),
        ("AAA", "2024-01-05", 103.0),
        ("BBB", "2024-01-02", 50.0),
        ("BBB", "2024-01-04", 52.0),
        ("BBB", "2024-01-05", 53.0),
    ];
    ProviderSet::new(
        vec![
            Box::new(ScriptedProvider::new("alpha", &script)),
            Box::new(ScriptedProvider::new("beta", &script)),
        ],
        "alpha",
    )
}

#[test]
fn full_run_produces_continuous_levels_and_returns() {
    let dir = tempfile::tempdir().unwrap();
    let constituents = write_constituents(dir.path());
    let config = config_for(dir.path(), &constituents);

    let report = run_pipeline(&config, agreeing_providers()).unwrap();
    assert_eq!(report.steps.len(), 5);
    for step in &report.steps {
        assert!(
            matches!(step.outcome, StepOutcome::Completed { .. }),
            "step {} was {}",
            step.name,
            step.outcome
        );
    }

    let store = TableStore::new(config.data_dir.clone());

    // BBB's 2024-01-03 gap was forward-filled from 2024-01-02.
    let canonical = store.load_canonical().unwrap();
    let bbb_gap = canonical
        .iter()
        .find(|row| row.ticker == "BBB" && row.date == d("2024-01-03"))
        .expect("imputed row exists");
    assert!(bbb_gap.imputed);
    assert_eq!(bbb_gap.chosen_provider, FORWARD_FILL_PROVIDER);
    assert_eq!(bbb_gap.adj_close, 50.0);

    // Base date publishes the base value.
    let levels = store.load_levels().unwrap();
    assert_eq!(levels.len(), 4);
    assert_eq!(levels[0].date, d("2024-01-02"));
    assert!((levels[0].level - 1000.0).abs() < 1e-9);

    // Rebalance on 2024-01-04: the level equals what the outgoing
    // composition (0.6/0.4) would have published that day — no jump.
    // 0.6*102 + 0.4*52 = 82.0 against a base numerator of 80 → 1025.
    let rebalance_level = levels.iter().find(|l| l.date == d("2024-01-04")).unwrap();
    assert!((rebalance_level.level - 1025.0).abs() < 1e-9);

    // Next day only price moves matter: (0.5*103 + 0.5*53)/(0.5*102 + 0.5*52).
    let after = levels.iter().find(|l| l.date == d("2024-01-05")).unwrap();
    assert!((after.level - 1025.0 * 78.0 / 77.0).abs() < 1e-9);

    // Index return chain exists under the reserved ticker, first date omitted.
    let returns = store.load_returns().unwrap();
    let index_chain: Vec<_> = returns
        .iter()
        .filter(|r| r.ticker == INDEX_TICKER)
        .collect();
    assert_eq!(index_chain.len(), 3);
    assert_eq!(index_chain[0].date, d("2024-01-03"));
    assert!((index_chain[0].daily_return - 0.0075).abs() < 1e-9);

    // Constituent chains are present too.
    assert!(returns.iter().any(|r| r.ticker == "AAA"));
    assert!(returns.iter().any(|r| r.ticker == "BBB"));
}

#[test]
fn rerun_on_unchanged_inputs_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let constituents = write_constituents(dir.path());
    let config = config_for(dir.path(), &constituents);

    run_pipeline(&config, agreeing_providers()).unwrap();
    let store = TableStore::new(config.data_dir.clone());
    let levels_first = store.load_levels().unwrap();
    let returns_first = store.load_returns().unwrap();
    let levels_hash_first = store.get_meta(LEVELS_TABLE).unwrap().data_hash;
    let returns_hash_first = store.get_meta(RETURNS_TABLE).unwrap().data_hash;

    run_pipeline(&config, agreeing_providers()).unwrap();
    assert_eq!(store.load_levels().unwrap(), levels_first);
    assert_eq!(store.load_returns().unwrap(), returns_first);
    assert_eq!(
        store.get_meta(LEVELS_TABLE).unwrap().data_hash,
        levels_hash_first
    );
    assert_eq!(
        store.get_meta(RETURNS_TABLE).unwrap().data_hash,
        returns_hash_first
    );
}

#[test]
fn diverging_providers_record_conflict_with_preferred_values() {
    let dir = tempfile::tempdir().unwrap();
    let constituents = dir.path().join("constituents.csv");
    std::fs::write(
        &constituents,
        "rebalance_date,ticker,weight_pct\n2024-01-02,AAA,1.0\n",
    )
    .unwrap();
    let config = config_for(dir.path(), &constituents);

    let providers = ProviderSet::new(
        vec![
            Box::new(ScriptedProvider::new(
                "alpha",
                &[("AAA", "2024-01-02", 100.0)],
            )),
            Box::new(ScriptedProvider::new(
                "beta",
                &[("AAA", "2024-01-02", 102.0)],
            )),
        ],
        "alpha",
    );

    run_pipeline(&config, providers).unwrap();

    let store = TableStore::new(config.data_dir.clone());
    let canonical = store.load_canonical().unwrap();
    assert_eq!(canonical.len(), 1);
    assert_eq!(canonical[0].quality.as_str(), "CONFLICT");
    assert_eq!(canonical[0].chosen_provider, "alpha");
    assert_eq!(canonical[0].adj_close, 100.0);
    assert!(canonical[0].divergence_pct.unwrap() > 0.5);
}

#[test]
fn cold_pipeline_skips_every_step_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), &dir.path().join("missing.csv"));

    let report = run_pipeline(&config, ProviderSet::new(vec![], "alpha")).unwrap();
    assert_eq!(report.steps.len(), 5);
    for step in &report.steps {
        assert!(
            matches!(step.outcome, StepOutcome::Skipped { .. }),
            "step {} was {}",
            step.name,
            step.outcome
        );
    }
}

#[test]
fn held_lock_blocks_a_second_run() {
    let dir = tempfile::tempdir().unwrap();
    let constituents = write_constituents(dir.path());
    let mut config = config_for(dir.path(), &constituents);
    config.lock.wait_timeout_secs = 0;

    let _held = PipelineLock::acquire(&config.lock_path(), Duration::from_secs(1)).unwrap();

    let err = run_pipeline(&config, agreeing_providers()).unwrap_err();
    assert!(matches!(err, PipelineError::Lock(_)));
}

#[test]
fn lock_is_released_after_a_successful_run() {
    let dir = tempfile::tempdir().unwrap();
    let constituents = write_constituents(dir.path());
    let config = config_for(dir.path(), &constituents);

    run_pipeline(&config, agreeing_providers()).unwrap();
    assert!(!config.lock_path().exists());

    // And the next run can take it again.
    run_pipeline(&config, agreeing_providers()).unwrap();
}
