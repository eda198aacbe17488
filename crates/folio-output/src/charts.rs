//! Data series behind the standard portfolio charts.
//!
//! Nothing here draws; each function returns the values a plotting tool
//! would consume, keyed by date.
//!
//! The drawdown curve is taken on the compounded wealth curve, which is the
//! conventional chart and differs from the scalar max drawdown reported by
//! [`folio_risk::metrics::max_drawdown`].

use chrono::NaiveDate;
use folio_risk::MetricsError;
use folio_risk::metrics::annualized_volatility;
use ndarray::{ArrayView1, ArrayView2, s};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default rolling window for volatility charts, in trading days.
pub const DEFAULT_VOLATILITY_WINDOW: usize = 60;

/// Errors raised while building chart data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    /// Dates and values disagree in length
    #[error("Length mismatch: {dates} dates for {values} values")]
    LengthMismatch {
        /// Number of dates
        dates: usize,
        /// Number of values
        values: usize,
    },

    /// Rolling volatility needs at least two points per window
    #[error("Invalid rolling window: {0} (must be at least 2)")]
    InvalidWindow(usize),

    /// Labels disagree with the matrix dimensions
    #[error("Heatmap has {labels} labels for a {rows}x{cols} matrix")]
    InvalidHeatmap {
        /// Number of labels
        labels: usize,
        /// Matrix rows
        rows: usize,
        /// Matrix columns
        cols: usize,
    },

    /// Volatility could not be evaluated
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// One named line of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    /// Legend label
    pub name: String,
    /// X axis
    pub dates: Vec<NaiveDate>,
    /// Y axis, one value per date
    pub values: Vec<f64>,
}

impl ChartSeries {
    /// Create a series, checking that dates and values line up.
    pub fn new(
        name: impl Into<String>,
        dates: Vec<NaiveDate>,
        values: Vec<f64>,
    ) -> Result<Self, ChartError> {
        if dates.len() != values.len() {
            return Err(ChartError::LengthMismatch {
                dates: dates.len(),
                values: values.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            dates,
            values,
        })
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series has no points.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Last value, if any.
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

fn check_len(dates: &[NaiveDate], len: usize) -> Result<(), ChartError> {
    if dates.len() != len {
        return Err(ChartError::LengthMismatch {
            dates: dates.len(),
            values: len,
        });
    }
    Ok(())
}

/// Growth of one unit invested: running product of `1 + r`.
pub fn cumulative_growth(
    name: impl Into<String>,
    dates: &[NaiveDate],
    returns: ArrayView1<'_, f64>,
) -> Result<ChartSeries, ChartError> {
    check_len(dates, returns.len())?;
    let values = returns
        .iter()
        .scan(1.0, |wealth, &r| {
            *wealth *= 1.0 + r;
            Some(*wealth)
        })
        .collect();
    ChartSeries::new(name, dates.to_vec(), values)
}

/// Fractional distance of the wealth curve below its running peak.
///
/// Values are `growth / peak - 1`, so zero at a new high and negative
/// otherwise. The peak is the running maximum of the curve itself, so the
/// first observation is always zero even after an initial loss.
pub fn drawdown_curve(
    name: impl Into<String>,
    dates: &[NaiveDate],
    returns: ArrayView1<'_, f64>,
) -> Result<ChartSeries, ChartError> {
    let growth = cumulative_growth(name, dates, returns)?;
    let mut peak = f64::NEG_INFINITY;
    let values = growth
        .values
        .iter()
        .map(|&wealth| {
            peak = peak.max(wealth);
            wealth / peak - 1.0
        })
        .collect();
    Ok(ChartSeries {
        values,
        ..growth
    })
}

/// Annualized volatility over each trailing window of `window` returns.
///
/// The first point is dated at the end of the first full window.
pub fn rolling_volatility(
    name: impl Into<String>,
    dates: &[NaiveDate],
    returns: ArrayView1<'_, f64>,
    window: usize,
) -> Result<ChartSeries, ChartError> {
    check_len(dates, returns.len())?;
    if window < 2 {
        return Err(ChartError::InvalidWindow(window));
    }

    let n = returns.len();
    if window > n {
        return ChartSeries::new(name, Vec::new(), Vec::new());
    }

    let values = ((window - 1)..n)
        .map(|end| annualized_volatility(returns.slice(s![end + 1 - window..=end])))
        .collect::<Result<Vec<_>, _>>()?;
    ChartSeries::new(name, dates[window - 1..].to_vec(), values)
}

/// Rolling annualized volatility of every asset column.
pub fn asset_rolling_volatility(
    tickers: &[String],
    dates: &[NaiveDate],
    returns: ArrayView2<'_, f64>,
    window: usize,
) -> Result<Vec<ChartSeries>, ChartError> {
    check_len(dates, returns.nrows())?;
    if tickers.len() != returns.ncols() {
        return Err(ChartError::LengthMismatch {
            dates: tickers.len(),
            values: returns.ncols(),
        });
    }
    tickers
        .iter()
        .zip(returns.columns())
        .map(|(ticker, column)| rolling_volatility(ticker.as_str(), dates, column, window))
        .collect()
}

/// Each price column divided by its first valid positive price.
///
/// A column without such a price is all NaN.
pub fn normalized_prices(
    tickers: &[String],
    dates: &[NaiveDate],
    prices: ArrayView2<'_, f64>,
) -> Result<Vec<ChartSeries>, ChartError> {
    check_len(dates, prices.nrows())?;
    if tickers.len() != prices.ncols() {
        return Err(ChartError::LengthMismatch {
            dates: tickers.len(),
            values: prices.ncols(),
        });
    }

    tickers
        .iter()
        .zip(prices.columns())
        .map(|(ticker, column)| {
            let base = column
                .iter()
                .copied()
                .find(|p| p.is_finite() && *p > 0.0)
                .unwrap_or(f64::NAN);
            let values = column.iter().map(|p| p / base).collect();
            ChartSeries::new(ticker.as_str(), dates.to_vec(), values)
        })
        .collect()
}

/// One cell of a correlation heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    /// Row label
    pub row: String,
    /// Column label
    pub column: String,
    /// Cell value
    pub value: f64,
}

/// Labelled square matrix, typically asset correlations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapData {
    /// Row and column labels
    pub labels: Vec<String>,
    /// Row-major values
    pub values: Vec<Vec<f64>>,
}

impl HeatmapData {
    /// Label a square matrix.
    pub fn new(labels: &[String], matrix: ArrayView2<'_, f64>) -> Result<Self, ChartError> {
        let (rows, cols) = matrix.dim();
        if rows != cols || rows != labels.len() {
            return Err(ChartError::InvalidHeatmap {
                labels: labels.len(),
                rows,
                cols,
            });
        }
        Ok(Self {
            labels: labels.to_vec(),
            values: matrix.outer_iter().map(|row| row.to_vec()).collect(),
        })
    }

    /// Flatten into one record per cell, row by row.
    pub fn cells(&self) -> Vec<HeatmapCell> {
        self.labels
            .iter()
            .zip(&self.values)
            .flat_map(|(row_label, row)| {
                self.labels
                    .iter()
                    .zip(row)
                    .map(move |(column_label, &value)| HeatmapCell {
                        row: row_label.clone(),
                        column: column_label.clone(),
                        value,
                    })
            })
            .collect()
    }
}
