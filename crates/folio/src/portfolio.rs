//! Portfolio state: tickers, weights and the data derived from them.
//!
//! Weights are positionally aligned with tickers and with the columns of
//! every loaded table. Adding or removing a ticker redistributes weight so
//! the total is unchanged:
//!
//! - `add_ticker`: existing weights scale by `n / (n + 1)`, the new ticker
//!   gets `1 / (n + 1)`
//! - `remove_ticker`: the removed weight is split equally over the remaining
//!   tickers
//!
//! Derived tables are never refreshed implicitly. Call
//! [`Portfolio::compute_returns`] after changing weights or data.

use crate::error::{PortfolioError, Result};
use crate::returns::ReturnSeries;
use chrono::NaiveDate;
use folio_data::{CleaningConfig, PriceHistory, PriceTable, clean_history};
use folio_risk::{
    OptimizationResult, OptimizerConfig, PerformanceMetrics, correlation_matrix, maximize_sharpe,
    rolling_correlation,
};
use ndarray::{Array1, Array2};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// Correlation matrix of the trailing window ending on `date`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatedCorrelation {
    /// Last return date in the window
    pub date: NaiveDate,
    /// Assets x assets correlation matrix
    pub matrix: Array2<f64>,
}

/// A weighted basket of tickers with optional price data.
#[derive(Debug, Clone)]
pub struct Portfolio {
    tickers: Vec<String>,
    weights: Array1<f64>,
    history: Option<PriceHistory>,
    prices: Option<PriceTable>,
    returns: Option<ReturnSeries>,
    optimized: bool,
}

impl Portfolio {
    /// Create a portfolio.
    ///
    /// Weights default to `1 / n` each.
    ///
    /// # Errors
    /// [`PortfolioError::Validation`] if `tickers` is empty, contains an
    /// empty or repeated ticker, or `weights` has the wrong length.
    pub fn new(tickers: Vec<String>, weights: Option<Vec<f64>>) -> Result<Self> {
        if tickers.is_empty() {
            return Err(PortfolioError::Validation(
                "portfolio needs at least one ticker".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(tickers.len());
        for ticker in &tickers {
            validate_ticker(ticker)?;
            if !seen.insert(ticker.as_str()) {
                return Err(PortfolioError::Validation(format!(
                    "duplicate ticker {ticker}"
                )));
            }
        }

        let n = tickers.len();
        let weights = match weights {
            Some(w) if w.len() != n => {
                return Err(PortfolioError::Validation(format!(
                    "{} weights for {n} tickers",
                    w.len()
                )));
            }
            Some(w) => Array1::from(w),
            None => Array1::from_elem(n, 1.0 / n as f64),
        };

        Ok(Self {
            tickers,
            weights,
            history: None,
            prices: None,
            returns: None,
            optimized: false,
        })
    }

    /// Tickers in column order
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Current weights, aligned with [`tickers`](Self::tickers)
    pub const fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    /// Number of tickers
    pub fn num_assets(&self) -> usize {
        self.tickers.len()
    }

    /// True after a successful [`optimize`](Self::optimize) until the next
    /// [`update_weights`](Self::update_weights).
    pub const fn is_optimized(&self) -> bool {
        self.optimized
    }

    /// Weight of `ticker`, if held.
    pub fn weight_of(&self, ticker: &str) -> Option<f64> {
        self.position(ticker).map(|idx| self.weights[idx])
    }

    /// Raw close and adjusted-close history
    pub const fn history(&self) -> Option<&PriceHistory> {
        self.history.as_ref()
    }

    /// Cleaned adjusted-close prices
    pub const fn prices(&self) -> Option<&PriceTable> {
        self.prices.as_ref()
    }

    /// Derived return series
    pub const fn returns(&self) -> Option<&ReturnSeries> {
        self.returns.as_ref()
    }

    fn position(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// Add a ticker, giving it `1 / (n + 1)` of the portfolio.
    ///
    /// Loaded prices have no column for the new ticker and are discarded.
    /// The optimized flag is left as is.
    pub fn add_ticker(&mut self, ticker: impl Into<String>) -> Result<()> {
        let ticker = ticker.into();
        validate_ticker(&ticker)?;
        if self.position(&ticker).is_some() {
            return Err(PortfolioError::Validation(format!(
                "ticker {ticker} already in portfolio"
            )));
        }

        let n = self.tickers.len() as f64;
        let new_n = n + 1.0;
        let weights: Array1<f64> = self
            .weights
            .iter()
            .map(|w| w * n / new_n)
            .chain(std::iter::once(1.0 / new_n))
            .collect();

        debug!(%ticker, assets = self.tickers.len() + 1, "added ticker");
        self.tickers.push(ticker);
        self.weights = weights;
        self.history = None;
        self.prices = None;
        self.returns = None;
        Ok(())
    }

    /// Remove a ticker and split its weight equally over the rest.
    ///
    /// The ticker's column is dropped from loaded prices; derived returns are
    /// discarded. The optimized flag is left as is.
    pub fn remove_ticker(&mut self, ticker: &str) -> Result<()> {
        let idx = self.position(ticker).ok_or_else(|| {
            PortfolioError::Validation(format!("ticker {ticker} not in portfolio"))
        })?;
        let remaining = self.tickers.len() - 1;
        if remaining == 0 {
            return Err(PortfolioError::Validation(format!(
                "cannot remove {ticker}: it is the only ticker"
            )));
        }

        let history = self
            .history
            .as_ref()
            .map(|h| h.drop_column(ticker))
            .transpose()?;
        let prices = self
            .prices
            .as_ref()
            .map(|p| p.drop_column(ticker))
            .transpose()?;

        let share = self.weights[idx] / remaining as f64;
        let weights: Array1<f64> = self
            .weights
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, w)| w + share)
            .collect();

        debug!(ticker, assets = remaining, "removed ticker");
        self.tickers.remove(idx);
        self.weights = weights;
        self.history = history;
        self.prices = prices;
        self.returns = None;
        Ok(())
    }

    /// Replace the weights verbatim and clear the optimized flag.
    pub fn update_weights(&mut self, weights: Vec<f64>) -> Result<()> {
        if weights.len() != self.tickers.len() {
            return Err(PortfolioError::Validation(format!(
                "{} weights for {} tickers",
                weights.len(),
                self.tickers.len()
            )));
        }
        self.weights = Array1::from(weights);
        self.optimized = false;
        Ok(())
    }

    /// Attach raw price history.
    ///
    /// Columns are reordered to match the portfolio's tickers. Cleaned prices
    /// and returns from earlier data are discarded.
    pub fn load_history(&mut self, history: PriceHistory) -> Result<()> {
        let history = self.align(history.tickers(), |t| history.select(t))?;
        self.history = Some(history);
        self.prices = None;
        self.returns = None;
        Ok(())
    }

    /// Attach an already-clean price table directly, bypassing the raw
    /// history.
    pub fn load_prices(&mut self, prices: PriceTable) -> Result<()> {
        let prices = self.align(prices.tickers(), |t| prices.select(t))?;
        self.history = None;
        self.prices = Some(prices);
        self.returns = None;
        Ok(())
    }

    fn align<T>(
        &self,
        columns: &[String],
        select: impl FnOnce(&[String]) -> folio_data::Result<T>,
    ) -> Result<T> {
        if columns.len() != self.tickers.len() {
            return Err(PortfolioError::Validation(format!(
                "price data has {} columns for {} tickers",
                columns.len(),
                self.tickers.len()
            )));
        }
        Ok(select(&self.tickers)?)
    }

    /// Fill gaps in the raw history and adopt the adjusted close as the
    /// canonical price table.
    pub fn clean_data(&mut self, config: &CleaningConfig) -> Result<()> {
        let history = self
            .history
            .as_ref()
            .ok_or_else(|| PortfolioError::DataNotLoaded("no price history loaded".to_string()))?;
        let cleaned = clean_history(history, config)?;
        self.prices = Some(cleaned.adjusted_close().clone());
        self.history = Some(cleaned);
        self.returns = None;
        Ok(())
    }

    /// Derive daily asset and portfolio returns from the cleaned prices and
    /// current weights.
    pub fn compute_returns(&mut self) -> Result<&ReturnSeries> {
        let prices = self
            .prices
            .as_ref()
            .ok_or_else(|| PortfolioError::DataNotLoaded("no cleaned prices".to_string()))?;
        let returns = ReturnSeries::compute(prices, &self.weights)?;
        Ok(self.returns.insert(returns))
    }

    fn require_returns(&self) -> Result<&ReturnSeries> {
        self.returns
            .as_ref()
            .ok_or_else(|| PortfolioError::DataNotLoaded("returns not computed".to_string()))
    }

    /// Performance metrics of the portfolio return series.
    pub fn performance(&self, risk_free_rate: f64) -> Result<PerformanceMetrics> {
        let returns = self.require_returns()?;
        Ok(PerformanceMetrics::compute(
            returns.portfolio_returns(),
            risk_free_rate,
        )?)
    }

    /// Correlation matrix of asset returns over the full sample.
    pub fn correlation(&self) -> Result<Array2<f64>> {
        let returns = self.require_returns()?;
        Ok(correlation_matrix(returns.asset_returns())?)
    }

    /// Correlation matrices over each trailing `window` of return rows.
    ///
    /// Empty when `window` is 1 or longer than the return table.
    ///
    /// # Errors
    /// [`PortfolioError::Validation`] if `window` is missing or zero.
    pub fn rolling_correlation(&self, window: Option<usize>) -> Result<Vec<DatedCorrelation>> {
        let window = window.ok_or_else(|| {
            PortfolioError::Validation("rolling correlation requires a window".to_string())
        })?;
        let returns = self.require_returns()?;

        Ok(rolling_correlation(returns.asset_returns(), window)?
            .into_iter()
            .map(|rolling| DatedCorrelation {
                date: returns.dates()[rolling.end],
                matrix: rolling.matrix,
            })
            .collect())
    }

    /// Maximize the Sharpe ratio starting from the current weights.
    ///
    /// On success the portfolio adopts the optimal weights and is marked
    /// optimized. On failure the weights are unchanged.
    pub fn optimize(&mut self, config: &OptimizerConfig) -> Result<OptimizationResult> {
        let returns = self.require_returns()?;
        let result = maximize_sharpe(returns.asset_returns(), &self.weights, config)?;

        info!(
            iterations = result.iterations,
            sharpe = -result.objective_value,
            "optimized portfolio"
        );
        self.weights = result.weights.clone();
        self.optimized = true;
        Ok(result)
    }
}

fn validate_ticker(ticker: &str) -> Result<()> {
    if ticker.trim().is_empty() {
        return Err(PortfolioError::Validation("empty ticker".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rstest::rstest;

    fn names(tickers: &[&str]) -> Vec<String> {
        tickers.iter().map(|s| s.to_string()).collect()
    }

    /// Prices whose simple returns are A = [0.01, -0.02, 0.03] and
    /// B = [0.00, 0.01, -0.01].
    fn two_asset_prices() -> PriceTable {
        let a = [100.0, 101.0, 101.0 * 0.98, 101.0 * 0.98 * 1.03];
        let b = [50.0, 50.0, 50.5, 50.5 * 0.99];
        let dates = (1..=4)
            .map(|d| NaiveDate::from_ymd_opt(2024, 4, d).unwrap())
            .collect();
        PriceTable::new(
            dates,
            names(&["A", "B"]),
            Array2::from_shape_fn((4, 2), |(t, i)| [a[t], b[t]][i]),
        )
        .unwrap()
    }

    fn loaded_portfolio() -> Portfolio {
        let mut portfolio = Portfolio::new(names(&["A", "B"]), Some(vec![0.5, 0.5])).unwrap();
        portfolio.load_prices(two_asset_prices()).unwrap();
        portfolio.compute_returns().unwrap();
        portfolio
    }

    #[test]
    fn test_default_weights_are_equal() {
        let portfolio = Portfolio::new(names(&["A", "B", "C", "D"]), None).unwrap();
        assert_eq!(portfolio.weights(), &array![0.25, 0.25, 0.25, 0.25]);
        assert!(!portfolio.is_optimized());
    }

    #[rstest]
    #[case(names(&[]), None)]
    #[case(names(&["A", "A"]), None)]
    #[case(names(&["A", ""]), None)]
    #[case(names(&["A", "B"]), Some(vec![1.0]))]
    fn test_invalid_construction(#[case] tickers: Vec<String>, #[case] weights: Option<Vec<f64>>) {
        assert!(matches!(
            Portfolio::new(tickers, weights),
            Err(PortfolioError::Validation(_))
        ));
    }

    #[test]
    fn test_add_ticker_rescales() {
        let mut portfolio = Portfolio::new(names(&["A", "B"]), Some(vec![0.6, 0.4])).unwrap();
        portfolio.add_ticker("C").unwrap();
        assert_eq!(portfolio.tickers(), &names(&["A", "B", "C"])[..]);
        assert_abs_diff_eq!(portfolio.weights()[0], 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(portfolio.weights()[1], 0.4 * 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(portfolio.weights()[2], 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(portfolio.weights().sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_add_duplicate_fails_without_change() {
        let mut portfolio = Portfolio::new(names(&["A", "B"]), Some(vec![0.6, 0.4])).unwrap();
        assert!(matches!(
            portfolio.add_ticker("A"),
            Err(PortfolioError::Validation(_))
        ));
        assert_eq!(portfolio.weights(), &array![0.6, 0.4]);
    }

    #[test]
    fn test_remove_ticker_redistributes() {
        let mut portfolio =
            Portfolio::new(names(&["A", "B", "C"]), Some(vec![0.5, 0.3, 0.2])).unwrap();
        portfolio.remove_ticker("B").unwrap();
        assert_eq!(portfolio.tickers(), &names(&["A", "C"])[..]);
        assert_abs_diff_eq!(portfolio.weights()[0], 0.65, epsilon = 1e-12);
        assert_abs_diff_eq!(portfolio.weights()[1], 0.35, epsilon = 1e-12);
    }

    #[test]
    fn test_remove_unknown_or_last_ticker() {
        let mut portfolio = Portfolio::new(names(&["A"]), None).unwrap();
        assert!(matches!(
            portfolio.remove_ticker("Z"),
            Err(PortfolioError::Validation(_))
        ));
        assert!(matches!(
            portfolio.remove_ticker("A"),
            Err(PortfolioError::Validation(_))
        ));
        assert_eq!(portfolio.num_assets(), 1);
    }

    #[test]
    fn test_update_weights_is_verbatim() {
        let mut portfolio = Portfolio::new(names(&["A", "B"]), None).unwrap();
        portfolio.update_weights(vec![0.7, 0.7]).unwrap();
        assert_eq!(portfolio.weights(), &array![0.7, 0.7]);
        assert!(matches!(
            portfolio.update_weights(vec![1.0]),
            Err(PortfolioError::Validation(_))
        ));
    }

    #[test]
    fn test_returns_match_scenario() {
        let portfolio = loaded_portfolio();
        let returns = portfolio.returns().unwrap();
        let expected = [0.005, -0.005, 0.01];
        for (actual, expected) in returns.portfolio_returns().iter().zip(expected) {
            assert_abs_diff_eq!(*actual, expected, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(returns.total_return()[0], 0.5 * 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(returns.total_return()[1], 0.0, epsilon = 1e-12);

        let metrics = portfolio.performance(0.06).unwrap();
        assert_abs_diff_eq!(metrics.cumulative_return, 0.00997, epsilon = 1e-5);
    }

    #[test]
    fn test_analytics_require_returns() {
        let mut portfolio = Portfolio::new(names(&["A", "B"]), None).unwrap();
        assert!(matches!(
            portfolio.compute_returns(),
            Err(PortfolioError::DataNotLoaded(_))
        ));
        assert!(matches!(
            portfolio.correlation(),
            Err(PortfolioError::DataNotLoaded(_))
        ));
        assert!(matches!(
            portfolio.performance(0.06),
            Err(PortfolioError::DataNotLoaded(_))
        ));
        assert!(matches!(
            portfolio.clean_data(&CleaningConfig::default()),
            Err(PortfolioError::DataNotLoaded(_))
        ));
        assert!(matches!(
            portfolio.optimize(&OptimizerConfig::default()),
            Err(PortfolioError::DataNotLoaded(_))
        ));
    }

    #[test]
    fn test_rolling_window_required() {
        let portfolio = loaded_portfolio();
        assert!(matches!(
            portfolio.rolling_correlation(None),
            Err(PortfolioError::Validation(_))
        ));
        assert!(matches!(
            portfolio.rolling_correlation(Some(0)),
            Err(PortfolioError::Validation(_))
        ));

        let rolling = portfolio.rolling_correlation(Some(2)).unwrap();
        assert_eq!(rolling.len(), 2);
        assert_eq!(rolling[0].date, portfolio.returns().unwrap().dates()[1]);
    }

    #[test]
    fn test_window_of_one_is_empty() {
        let portfolio = loaded_portfolio();
        let rolling = portfolio.rolling_correlation(Some(1)).unwrap();
        assert!(rolling.is_empty());
    }

    #[test]
    fn test_remove_drops_price_column() {
        let mut portfolio = loaded_portfolio();
        portfolio.remove_ticker("B").unwrap();
        assert_eq!(portfolio.weights(), &array![1.0]);
        assert_eq!(portfolio.prices().unwrap().tickers(), &names(&["A"])[..]);
        assert!(portfolio.returns().is_none());

        portfolio.compute_returns().unwrap();
        assert_eq!(portfolio.returns().unwrap().asset_returns().ncols(), 1);
    }

    #[test]
    fn test_add_discards_data() {
        let mut portfolio = loaded_portfolio();
        portfolio.add_ticker("C").unwrap();
        assert!(portfolio.prices().is_none());
        assert!(matches!(
            portfolio.correlation(),
            Err(PortfolioError::DataNotLoaded(_))
        ));
    }

    #[test]
    fn test_load_prices_reorders_and_validates() {
        let mut portfolio = Portfolio::new(names(&["B", "A"]), None).unwrap();
        portfolio.load_prices(two_asset_prices()).unwrap();
        assert_eq!(portfolio.prices().unwrap().tickers(), &names(&["B", "A"])[..]);

        let mut other = Portfolio::new(names(&["A", "C"]), None).unwrap();
        assert!(matches!(
            other.load_prices(two_asset_prices()),
            Err(PortfolioError::Validation(_))
        ));
        assert!(other.prices().is_none());
    }

    #[test]
    fn test_optimize_flag_lifecycle() {
        let mut portfolio = loaded_portfolio();
        portfolio.optimize(&OptimizerConfig::default()).unwrap();
        assert!(portfolio.is_optimized());
        assert_abs_diff_eq!(portfolio.weights().sum(), 1.0, epsilon = 1e-6);

        portfolio.add_ticker("C").unwrap();
        assert!(portfolio.is_optimized());
        portfolio.remove_ticker("C").unwrap();
        assert!(portfolio.is_optimized());

        portfolio.update_weights(vec![0.5, 0.5]).unwrap();
        assert!(!portfolio.is_optimized());
    }

    #[test]
    fn test_failed_optimization_keeps_weights() {
        let mut portfolio = loaded_portfolio();
        let config = OptimizerConfig {
            upper_bound: 0.2,
            ..Default::default()
        };
        assert!(matches!(
            portfolio.optimize(&config),
            Err(PortfolioError::Optimization(_))
        ));
        assert_eq!(portfolio.weights(), &array![0.5, 0.5]);
        assert!(!portfolio.is_optimized());
    }
}
