//! IndexLab CLI — run the pipeline and inspect its tables.
//!
//! Commands:
//! - `run` — execute every pipeline step in order under the cross-process lock
//! - `ingest` — run only the ingest/reconcile step (manual backfill)
//! - `audit` — print the coverage/completeness report without writing anything
//! - `status` — report table row counts and last write times
//! - `export` — dump the level or return series to CSV

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use indexlab_core::calendar::{
    build_coverage, evaluate_completeness, generate_weekdays, infer_holidays,
};
use indexlab_core::provider::{
    CircuitBreaker, ProviderSet, QuoteProvider, StooqProvider, YahooProvider,
};
use indexlab_core::store::TableStore;
use indexlab_pipeline::export::{export_levels_csv, export_returns_csv};
use indexlab_pipeline::steps::{IngestPrices, PipelineStep, StepContext};
use indexlab_pipeline::{run_pipeline, PipelineConfig, PipelineLock, PipelineReport};

#[derive(Parser)]
#[command(
    name = "indexlab",
    about = "IndexLab — benchmark index pipeline over multi-provider daily prices"
)]
struct Cli {
    /// Path to the pipeline TOML config.
    #[arg(long, global = true, default_value = "indexlab.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute every pipeline step in order.
    Run,
    /// Run only the ingest/reconcile step (manual backfill).
    Ingest,
    /// Print the coverage/completeness report without writing anything.
    Audit,
    /// Report table row counts and last write times.
    Status,
    /// Dump an output series to CSV.
    Export {
        /// Which series to export.
        #[arg(value_enum)]
        series: Series,

        /// Output file path.
        #[arg(long, default_value = "export.csv")]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Series {
    Levels,
    Returns,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_file(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    match cli.command {
        Commands::Run => run_cmd(&config),
        Commands::Ingest => ingest_cmd(&config),
        Commands::Audit => audit_cmd(&config),
        Commands::Status => status_cmd(&config),
        Commands::Export { series, out } => export_cmd(&config, series, &out),
    }
}

fn build_provider_set(config: &PipelineConfig) -> Result<ProviderSet> {
    let mut providers: Vec<Box<dyn QuoteProvider>> = Vec::new();
    for name in &config.providers.enabled {
        match name.as_str() {
            "yahoo" => providers.push(Box::new(YahooProvider::new(Arc::new(
                CircuitBreaker::default_provider(),
            )))),
            "stooq" => providers.push(Box::new(StooqProvider::new())),
            other => bail!("unknown provider '{other}' (known: yahoo, stooq)"),
        }
    }
    Ok(ProviderSet::new(
        providers,
        config.providers.preferred.clone(),
    ))
}

fn run_cmd(config: &PipelineConfig) -> Result<()> {
    let providers = build_provider_set(config)?;
    let report = run_pipeline(config, providers)?;
    print_report(&report);
    Ok(())
}

fn ingest_cmd(config: &PipelineConfig) -> Result<()> {
    let providers = build_provider_set(config)?;

    // A manual backfill contends with scheduled runs for the same tables.
    let _lock = PipelineLock::acquire(
        &config.lock_path(),
        Duration::from_secs(config.lock.wait_timeout_secs),
    )?;

    let step = IngestPrices;
    let mut ctx = StepContext::new(config.clone(), providers);
    let outcome = step
        .run(&mut ctx)
        .with_context(|| format!("step {}", step.name()))?;
    println!("{}: {outcome}", step.name());
    Ok(())
}

fn audit_cmd(config: &PipelineConfig) -> Result<()> {
    let store = TableStore::new(&config.data_dir);

    let canonical = store.load_canonical()?;
    if canonical.is_empty() {
        println!("No canonical prices yet — nothing to audit.");
        return Ok(());
    }
    let tickers: BTreeSet<String> = store
        .load_weights()?
        .into_iter()
        .map(|w| w.ticker)
        .collect();
    if tickers.is_empty() {
        println!("No constituents yet — nothing to audit.");
        return Ok(());
    }

    let last_date = canonical.iter().map(|row| row.date).max().expect("non-empty");
    let weekdays = generate_weekdays(config.index.base_date, last_date);

    let mut observed_counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for row in canonical.iter().filter(|row| !row.imputed) {
        *observed_counts.entry(row.date).or_insert(0) += 1;
    }

    let coverage = build_coverage(&weekdays, &observed_counts, tickers.len());
    let holidays = infer_holidays(&coverage, config.audit.holiday_coverage_threshold);
    let report = evaluate_completeness(
        &coverage,
        &holidays,
        config.audit.min_daily_coverage,
        config.audit.max_bad_days,
    );

    println!(
        "Audit window:   {} to {last_date}",
        config.index.base_date
    );
    println!("Universe:       {} tickers", tickers.len());
    println!("Weekdays:       {}", weekdays.len());
    println!("Holidays:       {} inferred", holidays.len());
    println!("Status:         {:?}", report.status);
    if report.bad_days.is_empty() {
        println!("Bad days:       none");
    } else {
        println!("Bad days:       {}", report.bad_days.len());
        for date in &report.bad_days {
            println!("  {date}  coverage {:.0}%", coverage[date] * 100.0);
        }
    }

    Ok(())
}

fn status_cmd(config: &PipelineConfig) -> Result<()> {
    let store = TableStore::new(&config.data_dir);

    println!("Data dir: {}", config.data_dir.display());
    println!();
    println!("{:<22} {:>10}  {}", "Table", "Rows", "Last written");
    println!("{}", "-".repeat(56));
    for status in store.status() {
        if status.exists {
            println!(
                "{:<22} {:>10}  {}",
                status.table,
                status
                    .rows
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "?".into()),
                status
                    .written_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "(no meta)".into()),
            );
        } else {
            println!("{:<22} {:>10}  -", status.table, "-");
        }
    }

    Ok(())
}

fn export_cmd(config: &PipelineConfig, series: Series, out: &std::path::Path) -> Result<()> {
    let store = TableStore::new(&config.data_dir);
    let count = match series {
        Series::Levels => export_levels_csv(&store, out)?,
        Series::Returns => export_returns_csv(&store, out)?,
    };
    println!("Wrote {count} rows to {}", out.display());
    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!();
    println!("=== Pipeline Run ===");
    for step in &report.steps {
        println!("{:<26} {}", step.name, step.outcome);
    }
    println!();
}
