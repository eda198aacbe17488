//! Daily return series derived from a cleaned price table.

use crate::error::{PortfolioError, Result};
use chrono::NaiveDate;
use folio_data::PriceTable;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use serde::Serialize;
use tracing::debug;

/// Simple returns `(p_t - p_{t-1}) / p_{t-1}` between consecutive rows.
///
/// The result has one row fewer than `prices`. Missing prices propagate as
/// `NaN`.
pub fn simple_returns(prices: ArrayView2<'_, f64>) -> Array2<f64> {
    let rows = prices.nrows();
    if rows < 2 {
        return Array2::zeros((0, prices.ncols()));
    }
    let previous = prices.slice(s![..rows - 1, ..]);
    let current = prices.slice(s![1.., ..]);
    (&current - &previous) / &previous
}

/// Per-asset and weighted portfolio returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnSeries {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    asset_returns: Array2<f64>,
    portfolio_returns: Array1<f64>,
    total_return: Array1<f64>,
}

impl ReturnSeries {
    /// Derive returns from `prices` weighted by `weights`.
    ///
    /// Rows with any non-finite return are dropped. `total_return[i]` is the
    /// sum over dates of `weights[i] * r[t, i]`; it is not compounded.
    pub fn compute(prices: &PriceTable, weights: &Array1<f64>) -> Result<Self> {
        if weights.len() != prices.num_columns() {
            return Err(PortfolioError::Validation(format!(
                "{} weights for {} price columns",
                weights.len(),
                prices.num_columns()
            )));
        }

        let raw = simple_returns(prices.values());
        let keep: Vec<usize> = raw
            .outer_iter()
            .enumerate()
            .filter(|(_, row)| row.iter().all(|r| r.is_finite()))
            .map(|(idx, _)| idx)
            .collect();

        let asset_returns = raw.select(Axis(0), &keep);
        // Return row t is dated at price row t + 1
        let dates: Vec<NaiveDate> = keep.iter().map(|&idx| prices.dates()[idx + 1]).collect();

        let portfolio_returns = asset_returns.dot(weights);
        let total_return = (&asset_returns * weights).sum_axis(Axis(0));

        debug!(
            periods = asset_returns.nrows(),
            assets = asset_returns.ncols(),
            dropped = raw.nrows() - keep.len(),
            "computed returns"
        );

        Ok(Self {
            dates,
            tickers: prices.tickers().to_vec(),
            asset_returns,
            portfolio_returns,
            total_return,
        })
    }

    /// Date of each return row
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Tickers, one per column
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Daily returns (periods x assets)
    pub fn asset_returns(&self) -> ArrayView2<'_, f64> {
        self.asset_returns.view()
    }

    /// Daily weighted portfolio returns
    pub fn portfolio_returns(&self) -> ArrayView1<'_, f64> {
        self.portfolio_returns.view()
    }

    /// Summed weighted return per asset
    pub fn total_return(&self) -> ArrayView1<'_, f64> {
        self.total_return.view()
    }

    /// Number of return periods
    pub fn num_periods(&self) -> usize {
        self.dates.len()
    }
}
