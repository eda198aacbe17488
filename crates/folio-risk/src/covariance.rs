//! Sample moments of multi-asset return tables
//!
//! Return tables are laid out with one row per period and one column per
//! asset, the same orientation used throughout the crate.

use crate::metrics::MetricsError;
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Mean of each column.
pub fn column_means(returns: ArrayView2<'_, f64>) -> Result<Array1<f64>, MetricsError> {
    returns
        .mean_axis(Axis(0))
        .ok_or(MetricsError::InsufficientData {
            required: 1,
            actual: 0,
        })
}

/// Sample covariance matrix (n - 1 denominator), assets x assets.
///
/// # Errors
/// Needs at least two periods.
pub fn sample_covariance(returns: ArrayView2<'_, f64>) -> Result<Array2<f64>, MetricsError> {
    let n_periods = returns.nrows();
    if n_periods < 2 {
        return Err(MetricsError::InsufficientData {
            required: 2,
            actual: n_periods,
        });
    }

    let means = column_means(returns)?;
    let centered = &returns - &means.insert_axis(Axis(0));

    Ok(centered.t().dot(&centered) / (n_periods - 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_sample_covariance_simple() {
        let returns = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let cov = sample_covariance(returns.view()).unwrap();

        // var(x) = 1, var(y) = 4, cov(x, y) = 2
        assert_abs_diff_eq!(cov[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[1, 1]], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[0, 1]], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[1, 0]], cov[[0, 1]]);
    }

    #[test]
    fn test_single_row_rejected() {
        let returns = array![[0.01, 0.02]];
        assert!(sample_covariance(returns.view()).is_err());
    }

    #[test]
    fn test_column_means() {
        let returns = array![[0.01, 0.0], [-0.02, 0.01], [0.03, -0.01]];
        let means = column_means(returns.view()).unwrap();
        assert_abs_diff_eq!(means[0], 0.02 / 3.0, epsilon = 1e-15);
        assert_abs_diff_eq!(means[1], 0.0, epsilon = 1e-15);
    }
}
