//! Pearson correlation across asset return columns
//!
//! Provides the full-sample correlation matrix and a rolling variant that
//! evaluates the same matrix over each trailing window of rows.

use crate::covariance::sample_covariance;
use crate::metrics::MetricsError;
use ndarray::{Array2, ArrayView2, s};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during correlation estimation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CorrelationError {
    /// Rolling window must cover at least one row
    #[error("Invalid rolling window: {0} (must be positive)")]
    InvalidWindow(usize),

    /// Underlying moment estimation failed
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Correlation matrix of one trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingCorrelation {
    /// Index of the last row included in the window
    pub end: usize,
    /// Assets x assets correlation matrix
    pub matrix: Array2<f64>,
}

/// Pearson correlation matrix of the columns of `returns`.
///
/// Diagonal entries are exactly 1.0. Any entry involving a column with zero
/// variance is NaN, diagonal included.
pub fn correlation_matrix(returns: ArrayView2<'_, f64>) -> Result<Array2<f64>, CorrelationError> {
    let cov = sample_covariance(returns)?;
    let n = cov.nrows();
    let std: Vec<f64> = (0..n).map(|i| cov[[i, i]].max(0.0).sqrt()).collect();

    let mut corr = Array2::<f64>::from_elem((n, n), f64::NAN);
    for i in 0..n {
        if std[i] > 0.0 {
            corr[[i, i]] = 1.0;
        }
        for j in (i + 1)..n {
            let denom = std[i] * std[j];
            if denom > 0.0 {
                let rho = (cov[[i, j]] / denom).clamp(-1.0, 1.0);
                corr[[i, j]] = rho;
                corr[[j, i]] = rho;
            }
        }
    }

    Ok(corr)
}

/// Correlation matrices over every trailing window of `window` rows.
///
/// The first matrix ends at row `window - 1`; shorter leading windows are
/// skipped. A single-row window has no sample correlation and, like a window
/// longer than the table, yields no matrices.
pub fn rolling_correlation(
    returns: ArrayView2<'_, f64>,
    window: usize,
) -> Result<Vec<RollingCorrelation>, CorrelationError> {
    if window == 0 {
        return Err(CorrelationError::InvalidWindow(window));
    }

    let n_periods = returns.nrows();
    if window < 2 || window > n_periods {
        return Ok(Vec::new());
    }

    ((window - 1)..n_periods)
        .map(|end| {
            let slice = returns.slice(s![end + 1 - window..=end, ..]);
            Ok(RollingCorrelation {
                end,
                matrix: correlation_matrix(slice)?,
            })
        })
        .collect()
}
