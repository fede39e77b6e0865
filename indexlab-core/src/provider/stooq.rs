//! Stooq quote provider.
//!
//! Stooq serves split-adjusted daily history as plain CSV
//! (`Date,Open,High,Low,Close,Volume`), no API key required. There is no
//! separate adjusted-close column, so `adj_close` mirrors `close`.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use super::{ProviderError, ProviderQuote, QuoteProvider};

#[derive(Debug, Deserialize)]
struct StooqRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Close")]
    close: f64,
}

/// Stooq daily quote provider.
pub struct StooqProvider {
    client: reqwest::blocking::Client,
    /// Market suffix appended to tickers, e.g. "us" → `aapl.us`.
    market_suffix: String,
    max_retries: u32,
}

impl StooqProvider {
    pub fn new() -> Self {
        Self::with_market("us")
    }

    pub fn with_market(market_suffix: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            market_suffix: market_suffix.into(),
            max_retries: 2,
        }
    }

    fn download_url(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let symbol = format!("{}.{}", ticker.to_ascii_lowercase(), self.market_suffix);
        format!(
            "https://stooq.com/q/d/l/?s={symbol}&d1={}&d2={}&i=d",
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
        )
    }

    fn parse_csv(ticker: &str, body: &str) -> Result<Vec<ProviderQuote>, ProviderError> {
        // Unknown tickers come back as a one-line "No data" body, not an error status.
        if !body.starts_with("Date,") {
            return Err(ProviderError::TickerNotFound {
                ticker: ticker.to_string(),
            });
        }

        let mut reader = csv::Reader::from_reader(body.as_bytes());
        let mut quotes = Vec::new();
        for record in reader.deserialize::<StooqRow>() {
            let row = record.map_err(|e| {
                ProviderError::ResponseFormatChanged(format!("bad CSV row for {ticker}: {e}"))
            })?;
            quotes.push(ProviderQuote {
                date: row.date,
                close: row.close,
                adj_close: row.close,
            });
        }

        if quotes.is_empty() {
            return Err(ProviderError::TickerNotFound {
                ticker: ticker.to_string(),
            });
        }

        Ok(quotes)
    }
}

impl Default for StooqProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteProvider for StooqProvider {
    fn name(&self) -> &str {
        "stooq"
    }

    fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ProviderQuote>, ProviderError> {
        let url = self.download_url(ticker, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(Duration::from_millis(500) * attempt);
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if !status.is_success() {
                        last_error =
                            Some(ProviderError::Other(format!("HTTP {status} for {ticker}")));
                        continue;
                    }
                    let body = resp.text().map_err(|e| {
                        ProviderError::ResponseFormatChanged(format!(
                            "failed to read body for {ticker}: {e}"
                        ))
                    })?;
                    return Self::parse_csv(ticker, &body);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(ProviderError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(ProviderError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Other("max retries exceeded".into())))
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_daily_history_csv() {
        let body = "Date,Open,High,Low,Close,Volume\n\
                    2024-01-02,100.0,102.0,99.0,101.0,1000\n\
                    2024-01-03,101.0,103.0,100.0,102.5,1100\n";

        let quotes = StooqProvider::parse_csv("AAPL", body).unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(
            quotes[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
        assert_eq!(quotes[0].close, 101.0);
        assert_eq!(quotes[0].adj_close, 101.0);
    }

    #[test]
    fn no_data_body_maps_to_ticker_not_found() {
        let err = StooqProvider::parse_csv("ZZZZ", "No data\n").unwrap_err();
        assert!(matches!(err, ProviderError::TickerNotFound { .. }));
    }

    #[test]
    fn url_carries_market_suffix_and_range() {
        let provider = StooqProvider::with_market("us");
        let url = provider.download_url(
            "AAPL",
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        );
        assert!(url.contains("s=aapl.us"));
        assert!(url.contains("d1=20240102"));
        assert!(url.contains("d2=20240201"));
    }
}
