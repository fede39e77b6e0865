//! Row ↔ DataFrame codecs for the persisted tables.
//!
//! Dates are stored as Arrow Date32 (days since epoch); the quality tier is
//! stored as its string form. Each codec errors on a missing column or an
//! unexpected null rather than patching values in.

use chrono::NaiveDate;
use polars::prelude::*;

use super::StoreError;
use crate::domain::{
    CanonicalPrice, ConstituentWeight, DailyWeight, IndexLevel, PriceQuote, Quality, ReturnRow,
};

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

fn date_to_days(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

fn days_to_date(days: i32) -> NaiveDate {
    epoch() + chrono::Duration::days(days as i64)
}

fn date_column(name: &str, dates: Vec<i32>) -> Result<Column, StoreError> {
    Column::new(name.into(), dates)
        .cast(&DataType::Date)
        .map_err(|e| StoreError::Parquet(format!("{name} cast: {e}")))
}

fn frame(columns: Vec<Column>) -> Result<DataFrame, StoreError> {
    DataFrame::new(columns).map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

fn col<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, StoreError> {
    df.column(name)
        .map_err(|_| StoreError::Validation(format!("missing column '{name}'")))
}

fn required<T>(value: Option<T>, column: &str, row: usize) -> Result<T, StoreError> {
    value.ok_or_else(|| StoreError::Validation(format!("null {column} at row {row}")))
}

macro_rules! chunked {
    ($df:expr, $name:expr, $accessor:ident) => {
        col($df, $name)?
            .$accessor()
            .map_err(|e| StoreError::Parquet(format!("{} column type: {e}", $name)))
    };
}

// ── price_quotes ────────────────────────────────────────────────────

pub fn quotes_to_dataframe(rows: &[PriceQuote]) -> Result<DataFrame, StoreError> {
    frame(vec![
        Column::new(
            "ticker".into(),
            rows.iter().map(|r| r.ticker.clone()).collect::<Vec<_>>(),
        ),
        date_column(
            "date",
            rows.iter().map(|r| date_to_days(r.date)).collect(),
        )?,
        Column::new(
            "provider".into(),
            rows.iter().map(|r| r.provider.clone()).collect::<Vec<_>>(),
        ),
        Column::new("close".into(), rows.iter().map(|r| r.close).collect::<Vec<_>>()),
        Column::new(
            "adj_close".into(),
            rows.iter().map(|r| r.adj_close).collect::<Vec<_>>(),
        ),
    ])
}

pub fn dataframe_to_quotes(df: &DataFrame) -> Result<Vec<PriceQuote>, StoreError> {
    let tickers = chunked!(df, "ticker", str)?;
    let dates = chunked!(df, "date", date)?;
    let providers = chunked!(df, "provider", str)?;
    let closes = chunked!(df, "close", f64)?;
    let adj_closes = chunked!(df, "adj_close", f64)?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        rows.push(PriceQuote {
            ticker: required(tickers.get(i), "ticker", i)?.to_string(),
            date: days_to_date(required(dates.get(i), "date", i)?),
            provider: required(providers.get(i), "provider", i)?.to_string(),
            close: required(closes.get(i), "close", i)?,
            adj_close: required(adj_closes.get(i), "adj_close", i)?,
        });
    }
    Ok(rows)
}

// ── canonical_prices ────────────────────────────────────────────────

pub fn canonical_to_dataframe(rows: &[CanonicalPrice]) -> Result<DataFrame, StoreError> {
    frame(vec![
        Column::new(
            "ticker".into(),
            rows.iter().map(|r| r.ticker.clone()).collect::<Vec<_>>(),
        ),
        date_column(
            "date",
            rows.iter().map(|r| date_to_days(r.date)).collect(),
        )?,
        Column::new("close".into(), rows.iter().map(|r| r.close).collect::<Vec<_>>()),
        Column::new(
            "adj_close".into(),
            rows.iter().map(|r| r.adj_close).collect::<Vec<_>>(),
        ),
        Column::new(
            "quality".into(),
            rows.iter()
                .map(|r| r.quality.as_str().to_string())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "chosen_provider".into(),
            rows.iter()
                .map(|r| r.chosen_provider.clone())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "divergence_pct".into(),
            rows.iter().map(|r| r.divergence_pct).collect::<Vec<_>>(),
        ),
        Column::new(
            "imputed".into(),
            rows.iter().map(|r| r.imputed).collect::<Vec<_>>(),
        ),
    ])
}

pub fn dataframe_to_canonical(df: &DataFrame) -> Result<Vec<CanonicalPrice>, StoreError> {
    let tickers = chunked!(df, "ticker", str)?;
    let dates = chunked!(df, "date", date)?;
    let closes = chunked!(df, "close", f64)?;
    let adj_closes = chunked!(df, "adj_close", f64)?;
    let qualities = chunked!(df, "quality", str)?;
    let providers = chunked!(df, "chosen_provider", str)?;
    let divergences = chunked!(df, "divergence_pct", f64)?;
    let imputed_flags = chunked!(df, "imputed", bool)?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let quality_str = required(qualities.get(i), "quality", i)?;
        let quality = Quality::parse(quality_str).ok_or_else(|| {
            StoreError::Validation(format!("unknown quality '{quality_str}' at row {i}"))
        })?;
        rows.push(CanonicalPrice {
            ticker: required(tickers.get(i), "ticker", i)?.to_string(),
            date: days_to_date(required(dates.get(i), "date", i)?),
            close: required(closes.get(i), "close", i)?,
            adj_close: required(adj_closes.get(i), "adj_close", i)?,
            quality,
            chosen_provider: required(providers.get(i), "chosen_provider", i)?.to_string(),
            divergence_pct: divergences.get(i),
            imputed: required(imputed_flags.get(i), "imputed", i)?,
        });
    }
    Ok(rows)
}

// ── constituent_weights ─────────────────────────────────────────────

pub fn weights_to_dataframe(rows: &[ConstituentWeight]) -> Result<DataFrame, StoreError> {
    frame(vec![
        date_column(
            "rebalance_date",
            rows.iter().map(|r| date_to_days(r.rebalance_date)).collect(),
        )?,
        Column::new(
            "ticker".into(),
            rows.iter().map(|r| r.ticker.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "weight_pct".into(),
            rows.iter().map(|r| r.weight_pct).collect::<Vec<_>>(),
        ),
        Column::new("rank".into(), rows.iter().map(|r| r.rank).collect::<Vec<_>>()),
    ])
}

pub fn dataframe_to_weights(df: &DataFrame) -> Result<Vec<ConstituentWeight>, StoreError> {
    let dates = chunked!(df, "rebalance_date", date)?;
    let tickers = chunked!(df, "ticker", str)?;
    let weights = chunked!(df, "weight_pct", f64)?;
    let ranks = chunked!(df, "rank", u32)?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        rows.push(ConstituentWeight {
            rebalance_date: days_to_date(required(dates.get(i), "rebalance_date", i)?),
            ticker: required(tickers.get(i), "ticker", i)?.to_string(),
            weight_pct: required(weights.get(i), "weight_pct", i)?,
            rank: required(ranks.get(i), "rank", i)?,
        });
    }
    Ok(rows)
}

// ── daily_weights ───────────────────────────────────────────────────

pub fn daily_weights_to_dataframe(rows: &[DailyWeight]) -> Result<DataFrame, StoreError> {
    frame(vec![
        date_column(
            "date",
            rows.iter().map(|r| date_to_days(r.date)).collect(),
        )?,
        Column::new(
            "ticker".into(),
            rows.iter().map(|r| r.ticker.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "weight".into(),
            rows.iter().map(|r| r.weight).collect::<Vec<_>>(),
        ),
    ])
}

pub fn dataframe_to_daily_weights(df: &DataFrame) -> Result<Vec<DailyWeight>, StoreError> {
    let dates = chunked!(df, "date", date)?;
    let tickers = chunked!(df, "ticker", str)?;
    let weights = chunked!(df, "weight", f64)?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        rows.push(DailyWeight {
            date: days_to_date(required(dates.get(i), "date", i)?),
            ticker: required(tickers.get(i), "ticker", i)?.to_string(),
            weight: required(weights.get(i), "weight", i)?,
        });
    }
    Ok(rows)
}

// ── index_levels ────────────────────────────────────────────────────

pub fn levels_to_dataframe(rows: &[IndexLevel]) -> Result<DataFrame, StoreError> {
    frame(vec![
        date_column(
            "date",
            rows.iter().map(|r| date_to_days(r.date)).collect(),
        )?,
        Column::new(
            "numerator".into(),
            rows.iter().map(|r| r.numerator).collect::<Vec<_>>(),
        ),
        Column::new("level".into(), rows.iter().map(|r| r.level).collect::<Vec<_>>()),
    ])
}

pub fn dataframe_to_levels(df: &DataFrame) -> Result<Vec<IndexLevel>, StoreError> {
    let dates = chunked!(df, "date", date)?;
    let numerators = chunked!(df, "numerator", f64)?;
    let levels = chunked!(df, "level", f64)?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        rows.push(IndexLevel {
            date: days_to_date(required(dates.get(i), "date", i)?),
            numerator: required(numerators.get(i), "numerator", i)?,
            level: required(levels.get(i), "level", i)?,
        });
    }
    Ok(rows)
}

// ── returns ─────────────────────────────────────────────────────────

pub fn returns_to_dataframe(rows: &[ReturnRow]) -> Result<DataFrame, StoreError> {
    frame(vec![
        date_column(
            "date",
            rows.iter().map(|r| date_to_days(r.date)).collect(),
        )?,
        Column::new(
            "ticker".into(),
            rows.iter().map(|r| r.ticker.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "daily_return".into(),
            rows.iter().map(|r| r.daily_return).collect::<Vec<_>>(),
        ),
    ])
}

pub fn dataframe_to_returns(df: &DataFrame) -> Result<Vec<ReturnRow>, StoreError> {
    let dates = chunked!(df, "date", date)?;
    let tickers = chunked!(df, "ticker", str)?;
    let returns = chunked!(df, "daily_return", f64)?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        rows.push(ReturnRow {
            date: days_to_date(required(dates.get(i), "date", i)?),
            ticker: required(tickers.get(i), "ticker", i)?.to_string(),
            daily_return: required(returns.get(i), "daily_return", i)?,
        });
    }
    Ok(rows)
}
