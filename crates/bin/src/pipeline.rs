//! Data pipeline for fetching prices and preparing a portfolio.
//!
//! Quotes are fetched from Yahoo Finance concurrently, one request per
//! ticker, then aligned, cleaned and turned into returns.

use folio::{Portfolio, PortfolioError};
use folio_data::{CleaningConfig, DataError, Lookback, PriceHistory, YahooQuoteProvider};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::warn;

/// Error type for data pipeline operations.
#[derive(Debug, thiserror::Error)]
pub(crate) enum PipelineError {
    /// Provider could not be created or a ticker failed to download.
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Portfolio rejected the inputs or data.
    #[error(transparent)]
    Portfolio(#[from] PortfolioError),
}

/// Default number of concurrent fetches.
pub(crate) const DEFAULT_CONCURRENCY: usize = 4;

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Fetch daily quotes for every ticker, advancing `pb` per download.
///
/// Fails on the first ticker that cannot be fetched.
async fn fetch_history(
    provider: &YahooQuoteProvider,
    tickers: &[String],
    lookback: Lookback,
    pb: &ProgressBar,
) -> Result<PriceHistory, PipelineError> {
    pb.set_message(format!(
        "Fetching {} symbols ({} concurrent)...",
        tickers.len(),
        provider.concurrency()
    ));

    let history = provider
        .fetch_history_with(tickers, lookback, |ticker, result| {
            if let Err(e) = result {
                pb.suspend(|| warn!(ticker, error = %e, "fetch failed"));
            }
            pb.inc(1);
        })
        .await?;
    Ok(history)
}

/// Build a portfolio, load its price history and compute returns.
pub(crate) async fn load_portfolio(
    tickers: Vec<String>,
    weights: Option<Vec<f64>>,
    lookback: Lookback,
) -> Result<Portfolio, PipelineError> {
    let tickers: Vec<String> = tickers
        .into_iter()
        .map(|t| t.trim().to_uppercase())
        .collect();
    let mut portfolio = Portfolio::new(tickers, weights)?;

    let provider = YahooQuoteProvider::new()?.with_concurrency(DEFAULT_CONCURRENCY);
    let pb = progress_bar(portfolio.num_assets());
    let history = match fetch_history(&provider, portfolio.tickers(), lookback, &pb).await {
        Ok(history) => {
            pb.finish_with_message(format!(
                "Fetched {} symbols ({} days)",
                history.tickers().len(),
                history.adjusted_close().num_rows()
            ));
            history
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            return Err(e);
        }
    };

    portfolio.load_history(history)?;
    portfolio.clean_data(&CleaningConfig::default())?;
    portfolio.compute_returns()?;
    Ok(portfolio)
}
