//! Quote data fetching from Yahoo Finance.

use crate::error::{DataError, Result};
use crate::lookback::Lookback;
use crate::table::QuoteSeries;
use chrono::{DateTime, NaiveDate};
use polars::prelude::*;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use yahoo_finance_api as yahoo;

/// Daily bars
const DAILY_INTERVAL: &str = "1d";

/// Yahoo Finance quote provider with rate limiting.
pub struct YahooQuoteProvider {
    provider: yahoo::YahooConnector,
    rate_limit_delay: Duration,
    concurrency: usize,
}

impl std::fmt::Debug for YahooQuoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooQuoteProvider")
            .field("rate_limit_delay", &self.rate_limit_delay)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl YahooQuoteProvider {
    /// Create a new Yahoo Finance quote provider with default rate limiting
    /// (250ms per request, 4 requests in flight).
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(250))
    }

    /// Create a new Yahoo Finance quote provider with custom rate limiting.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            provider: yahoo::YahooConnector::new()?,
            rate_limit_delay,
            concurrency: 4,
        })
    }

    /// Set the number of symbols fetched concurrently (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Maximum number of symbols fetched concurrently
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetch daily OHLCV data for a single symbol over a lookback window.
    ///
    /// # Returns
    /// A Polars DataFrame with columns: symbol, date, timestamp, open, high,
    /// low, close, volume, adjusted_close
    pub async fn fetch_range(&self, symbol: &str, lookback: Lookback) -> Result<DataFrame> {
        validate_symbol(symbol)?;

        let response = self
            .provider
            .get_quote_range(symbol, DAILY_INTERVAL, lookback.as_str())
            .await?;
        let quotes = response
            .quotes()
            .map_err(|e| DataError::YahooApi(e.to_string()))?;

        let df = quotes_to_frame(symbol, &quotes)?;
        debug!(symbol, rows = df.height(), %lookback, "fetched quotes");
        sleep(self.rate_limit_delay).await;
        Ok(df)
    }

    /// Fetch the close and adjusted-close series of a symbol.
    pub async fn fetch_series(&self, symbol: &str, lookback: Lookback) -> Result<QuoteSeries> {
        let df = self.fetch_range(symbol, lookback).await?;
        quote_series(symbol, &df)
    }
}

fn validate_symbol(symbol: &str) -> Result<()> {
    if symbol.trim().is_empty() {
        return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
    }
    Ok(())
}

/// One daily bar, decoupled from the client's quote type.
#[derive(Debug, Clone, Copy)]
struct Bar {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
    adjusted_close: f64,
}

impl From<&yahoo::Quote> for Bar {
    fn from(q: &yahoo::Quote) -> Self {
        Self {
            timestamp: q.timestamp,
            open: q.open,
            high: q.high,
            low: q.low,
            close: q.close,
            volume: q.volume,
            adjusted_close: q.adjclose,
        }
    }
}

/// Convert raw Yahoo quotes into the provider's DataFrame layout.
fn quotes_to_frame(symbol: &str, quotes: &[yahoo::Quote]) -> Result<DataFrame> {
    let bars: Vec<Bar> = quotes.iter().map(Bar::from).collect();
    bars_to_frame(symbol, &bars)
}

fn bars_to_frame(symbol: &str, bars: &[Bar]) -> Result<DataFrame> {
    if bars.is_empty() {
        return Err(DataError::MissingData {
            symbol: symbol.to_string(),
            reason: "No data returned from Yahoo Finance".to_string(),
        });
    }

    let timestamps: Vec<i64> = bars.iter().map(|b| b.timestamp).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();
    let adj_closes: Vec<f64> = bars.iter().map(|b| b.adjusted_close).collect();

    let mut df = DataFrame::new(vec![
        Series::new("timestamp".into(), timestamps).into(),
        Series::new("open".into(), opens).into(),
        Series::new("high".into(), highs).into(),
        Series::new("low".into(), lows).into(),
        Series::new("close".into(), closes).into(),
        Series::new("volume".into(), volumes).into(),
        Series::new("adjusted_close".into(), adj_closes).into(),
    ])?;

    let symbol_col: Column = Series::new("symbol".into(), vec![symbol; df.height()]).into();
    df.with_column(symbol_col)?;

    let df = df
        .lazy()
        .with_column(
            (col("timestamp") * lit(1_000_000_000))
                .cast(DataType::Datetime(TimeUnit::Nanoseconds, None))
                .cast(DataType::Date)
                .alias("date"),
        )
        .select(&[
            col("symbol"),
            col("date"),
            col("timestamp"),
            col("open"),
            col("high"),
            col("low"),
            col("close"),
            col("volume"),
            col("adjusted_close"),
        ])
        .collect()?;

    Ok(df)
}

/// Extract the dated close and adjusted-close series from a quote frame.
///
/// Null prices become `NaN`; the cleaning pass fills them later.
pub fn quote_series(symbol: &str, df: &DataFrame) -> Result<QuoteSeries> {
    let timestamps = df.column("timestamp")?.as_materialized_series().i64()?;
    let dates = timestamps
        .into_iter()
        .map(|ts| {
            ts.and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    DataError::TimeConversion(format!("invalid timestamp {ts:?} for {symbol}"))
                })
        })
        .collect::<Result<Vec<NaiveDate>>>()?;

    let prices = |name: &str| -> Result<Vec<f64>> {
        Ok(df
            .column(name)?
            .as_materialized_series()
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect())
    };

    Ok(QuoteSeries {
        symbol: symbol.to_string(),
        dates,
        close: prices("close")?,
        adjusted_close: prices("adjusted_close")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bars() -> Vec<Bar> {
        // 2024-01-02 and 2024-01-03, 14:30 UTC
        [(1_704_205_800_i64, 185.6, 185.2), (1_704_292_200, 184.3, 183.9)]
            .into_iter()
            .map(|(timestamp, close, adjusted_close)| Bar {
                timestamp,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000,
                adjusted_close,
            })
            .collect()
    }

    #[test]
    fn test_frame_layout() {
        let df = bars_to_frame("AAPL", &sample_bars()).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(
            df.get_column_names(),
            vec![
                "symbol",
                "date",
                "timestamp",
                "open",
                "high",
                "low",
                "close",
                "volume",
                "adjusted_close"
            ]
        );
    }

    #[test]
    fn test_quote_series_from_frame() {
        let df = bars_to_frame("AAPL", &sample_bars()).unwrap();
        let series = quote_series("AAPL", &df).unwrap();
        assert_eq!(series.symbol, "AAPL");
        assert_eq!(
            series.dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
            ]
        );
        assert_eq!(series.close, vec![185.6, 184.3]);
        assert_eq!(series.adjusted_close, vec![185.2, 183.9]);
    }

    #[test]
    fn test_quote_series_rejects_null_timestamp() {
        let df = df!(
            "timestamp" => [Some(1_704_205_800_i64), None],
            "close" => [185.6, 184.3],
            "adjusted_close" => [185.2, 183.9],
        )
        .unwrap();
        assert!(matches!(
            quote_series("AAPL", &df),
            Err(DataError::TimeConversion(_))
        ));
    }

    #[test]
    fn test_empty_quotes() {
        assert!(matches!(
            bars_to_frame("AAPL", &[]),
            Err(DataError::MissingData { .. })
        ));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_series() {
        let provider = YahooQuoteProvider::new().unwrap();
        let series = provider
            .fetch_series("MSFT", Lookback::OneMonth)
            .await
            .unwrap();
        assert!(!series.dates.is_empty());
        assert_eq!(series.dates.len(), series.adjusted_close.len());
    }

    #[tokio::test]
    async fn test_invalid_symbol() {
        let provider = YahooQuoteProvider::new().unwrap();
        let result = provider.fetch_range("", Lookback::default()).await;
        assert!(matches!(result, Err(DataError::InvalidSymbol(_))));
    }
}
