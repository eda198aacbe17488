//! Price sources.
//!
//! A [`PriceSource`] turns a list of tickers and a [`Lookback`] into a
//! [`PriceHistory`] whose columns follow the requested ticker order.

use crate::error::{DataError, Result};
use crate::lookback::Lookback;
use crate::table::{PriceHistory, QuoteSeries};
use crate::yahoo::YahooQuoteProvider;
use futures::stream::{self, StreamExt};
use std::future::Future;
use tracing::{debug, warn};

/// Anything that can supply daily close and adjusted-close prices.
pub trait PriceSource {
    /// Fetch prices for `tickers` over `lookback`.
    ///
    /// Fails if any ticker cannot be fetched.
    fn fetch_history(
        &self,
        tickers: &[String],
        lookback: Lookback,
    ) -> impl Future<Output = Result<PriceHistory>>;
}

/// Fetch one series per ticker and align them into a [`PriceHistory`].
///
/// At most `concurrency` fetches are in flight. `on_fetched` sees every
/// result in completion order; the error returned is the first failure in
/// ticker order.
pub async fn fetch_all<'a, F, Fut, C>(
    tickers: &'a [String],
    concurrency: usize,
    fetch: F,
    mut on_fetched: C,
) -> Result<PriceHistory>
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = Result<QuoteSeries>>,
    C: FnMut(&str, &Result<QuoteSeries>),
{
    let mut fetched: Vec<(usize, Result<QuoteSeries>)> = stream::iter(tickers.iter().enumerate())
        .map(|(idx, ticker)| {
            let request = fetch(ticker.as_str());
            async move { (idx, request.await) }
        })
        .buffer_unordered(concurrency.max(1))
        .inspect(|(idx, result)| on_fetched(&tickers[*idx], result))
        .collect()
        .await;
    fetched.sort_by_key(|(idx, _)| *idx);

    let mut series = Vec::with_capacity(fetched.len());
    for (idx, result) in fetched {
        match result {
            Ok(quotes) => {
                debug!(ticker = %tickers[idx], rows = quotes.dates.len(), "fetched quotes");
                series.push(quotes);
            }
            Err(e) => {
                debug!(ticker = %tickers[idx], error = %e, "price history incomplete");
                return Err(e);
            }
        }
    }
    PriceHistory::from_quotes(&series)
}

impl YahooQuoteProvider {
    /// Fetch prices for `tickers`, reporting each download to `on_fetched`
    /// as it finishes.
    pub async fn fetch_history_with<C>(
        &self,
        tickers: &[String],
        lookback: Lookback,
        on_fetched: C,
    ) -> Result<PriceHistory>
    where
        C: FnMut(&str, &Result<QuoteSeries>),
    {
        fetch_all(
            tickers,
            self.concurrency(),
            |ticker| self.fetch_series(ticker, lookback),
            on_fetched,
        )
        .await
    }
}

impl PriceSource for YahooQuoteProvider {
    async fn fetch_history(&self, tickers: &[String], lookback: Lookback) -> Result<PriceHistory> {
        self.fetch_history_with(tickers, lookback, |ticker, result| {
            if let Err(e) = result {
                warn!(ticker, error = %e, "failed to fetch price history");
            }
        })
        .await
    }
}

/// Serves a fixed, already-loaded history.
///
/// The lookback is ignored; every request returns the stored dates.
#[derive(Debug, Clone)]
pub struct StaticPriceSource {
    history: PriceHistory,
}

impl StaticPriceSource {
    /// Wrap a loaded history
    pub const fn new(history: PriceHistory) -> Self {
        Self { history }
    }
}

impl PriceSource for StaticPriceSource {
    async fn fetch_history(&self, tickers: &[String], _lookback: Lookback) -> Result<PriceHistory> {
        if tickers.is_empty() {
            return Err(DataError::InvalidSymbol("no tickers requested".to_string()));
        }
        self.history.select(tickers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn history() -> PriceHistory {
        let dates: Vec<NaiveDate> = (2..=4)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .collect();
        let series = ["AAA", "BBB"]
            .iter()
            .enumerate()
            .map(|(i, symbol)| QuoteSeries {
                symbol: symbol.to_string(),
                dates: dates.clone(),
                close: vec![10.0 + i as f64, 11.0, 12.0],
                adjusted_close: vec![10.0 + i as f64, 11.0, 12.0],
            })
            .collect::<Vec<_>>();
        PriceHistory::from_quotes(&series).unwrap()
    }

    #[tokio::test]
    async fn test_static_source_selects_requested_order() {
        let source = StaticPriceSource::new(history());
        let tickers = vec!["BBB".to_string(), "AAA".to_string()];
        let fetched = source
            .fetch_history(&tickers, Lookback::default())
            .await
            .unwrap();
        assert_eq!(fetched.tickers(), &tickers[..]);
        assert_eq!(fetched.close().values()[[0, 0]], 11.0);
    }

    fn series(symbol: &str) -> QuoteSeries {
        let dates: Vec<NaiveDate> = (2..=4)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .collect();
        QuoteSeries {
            symbol: symbol.to_string(),
            dates,
            close: vec![10.0, 11.0, 12.0],
            adjusted_close: vec![10.0, 11.0, 12.0],
        }
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(8)]
    #[tokio::test]
    async fn test_fetch_all_keeps_ticker_order(#[case] concurrency: usize) {
        let tickers: Vec<String> = ["CCC", "AAA", "BBB"].iter().map(|t| t.to_string()).collect();
        let mut seen = Vec::new();
        let history = fetch_all(
            &tickers,
            concurrency,
            |ticker| async move { Ok(series(ticker)) },
            |ticker, result| {
                assert!(result.is_ok());
                seen.push(ticker.to_string());
            },
        )
        .await
        .unwrap();

        assert_eq!(history.tickers(), &tickers[..]);
        seen.sort();
        assert_eq!(seen, ["AAA", "BBB", "CCC"]);
    }

    #[tokio::test]
    async fn test_fetch_all_reports_failures_and_returns_first() {
        let tickers: Vec<String> = ["AAA", "BAD1", "BBB", "BAD2"]
            .iter()
            .map(|t| t.to_string())
            .collect();
        let mut calls = 0;
        let mut failures = Vec::new();
        let result = fetch_all(
            &tickers,
            2,
            |ticker| async move {
                if ticker.starts_with("BAD") {
                    Err(DataError::YahooApi(format!("{ticker} not found")))
                } else {
                    Ok(series(ticker))
                }
            },
            |ticker, result| {
                calls += 1;
                if result.is_err() {
                    failures.push(ticker.to_string());
                }
            },
        )
        .await;

        assert_eq!(calls, 4);
        failures.sort();
        assert_eq!(failures, ["BAD1", "BAD2"]);
        match result {
            Err(DataError::YahooApi(msg)) => assert_eq!(msg, "BAD1 not found"),
            other => panic!("expected YahooApi error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_static_source_unknown_ticker() {
        let source = StaticPriceSource::new(history());
        let result = source
            .fetch_history(&["ZZZ".to_string()], Lookback::default())
            .await;
        assert!(matches!(result, Err(DataError::MissingData { .. })));
    }
}
