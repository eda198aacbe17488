//! Performance metrics for daily return series
//!
//! Pure functions turning a series of simple daily returns (a single asset or
//! a whole portfolio) into scalar risk and performance numbers. Annualization
//! assumes 252 trading days per year and standard deviations use the sample
//! (n - 1) denominator.
//!
//! Two conventions differ from the textbook definitions and are intentional:
//! - [`max_drawdown`] is measured on the return series itself, not on the
//!   compounded wealth curve.
//! - [`sharpe_ratio`] takes an annual risk-free rate (default 6%) and compares
//!   it with the arithmetic annualized mean.

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

/// Default annual risk-free rate used by [`sharpe_ratio`].
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.06;

/// Daily standard deviation at or below this multiple of `|mean|` counts as
/// zero volatility.
const ZERO_VOLATILITY_TOLERANCE: f64 = 1e-12;

/// Errors raised when a metric cannot be evaluated to a finite number.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    /// Too few observations for the statistic
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// Volatility is zero, so a ratio over it is undefined
    #[error("Volatility is zero; {metric} is undefined")]
    ZeroVolatility {
        /// Metric that divides by volatility
        metric: &'static str,
    },

    /// The metric evaluated to NaN or infinity
    #[error("{metric} evaluated to a non-finite value ({value})")]
    NonFinite {
        /// Metric name
        metric: &'static str,
        /// Offending value
        value: f64,
    },
}

const fn require(actual: usize, required: usize) -> Result<(), MetricsError> {
    if actual < required {
        return Err(MetricsError::InsufficientData { required, actual });
    }
    Ok(())
}

fn finite(metric: &'static str, value: f64) -> Result<f64, MetricsError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MetricsError::NonFinite { metric, value })
    }
}

/// Arithmetic mean of a series.
pub fn mean(returns: ArrayView1<'_, f64>) -> Result<f64, MetricsError> {
    require(returns.len(), 1)?;
    finite("mean", returns.sum() / returns.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std(returns: ArrayView1<'_, f64>) -> Result<f64, MetricsError> {
    require(returns.len(), 2)?;
    let mu = mean(returns)?;
    let ss: f64 = returns.iter().map(|&r| (r - mu).powi(2)).sum();
    finite("standard deviation", (ss / (returns.len() - 1) as f64).sqrt())
}

/// Compounded growth at every period: `(1 + r).cumprod() - 1`.
pub fn cumulative_return_series(returns: ArrayView1<'_, f64>) -> Array1<f64> {
    let mut growth = 1.0;
    returns.mapv(|r| {
        growth *= 1.0 + r;
        growth - 1.0
    })
}

/// Compounded return over the whole series, evaluated at the last period.
pub fn cumulative_return(returns: ArrayView1<'_, f64>) -> Result<f64, MetricsError> {
    require(returns.len(), 1)?;
    let growth: f64 = returns.iter().map(|&r| 1.0 + r).product();
    finite("cumulative return", growth - 1.0)
}

/// Annualized arithmetic return: `mean(r) * 252`.
pub fn annualized_return(returns: ArrayView1<'_, f64>) -> Result<f64, MetricsError> {
    Ok(mean(returns)? * TRADING_DAYS)
}

/// Daily (non-annualized) volatility: `std(r)`.
pub fn volatility(returns: ArrayView1<'_, f64>) -> Result<f64, MetricsError> {
    sample_std(returns)
}

/// Annualized volatility: `std(r) * sqrt(252)`.
pub fn annualized_volatility(returns: ArrayView1<'_, f64>) -> Result<f64, MetricsError> {
    Ok(sample_std(returns)? * TRADING_DAYS.sqrt())
}

/// Sharpe ratio: `(annualized_return - risk_free_rate) / annualized_volatility`.
///
/// # Errors
/// [`MetricsError::ZeroVolatility`] when the series has no dispersion, and
/// [`MetricsError::NonFinite`] if the ratio is otherwise not finite.
pub fn sharpe_ratio(returns: ArrayView1<'_, f64>, risk_free_rate: f64) -> Result<f64, MetricsError> {
    let mu = mean(returns)?;
    let std = sample_std(returns)?;
    // Rounding leaves a tiny nonzero std on constant series
    if std <= ZERO_VOLATILITY_TOLERANCE * mu.abs().max(ZERO_VOLATILITY_TOLERANCE) {
        return Err(MetricsError::ZeroVolatility {
            metric: "Sharpe ratio",
        });
    }
    finite(
        "Sharpe ratio",
        (annualized_return(returns)? - risk_free_rate) / annualized_volatility(returns)?,
    )
}

/// Largest gap between the running maximum of the series and the series.
///
/// Computed as `max(cummax(r) - r)` directly on the returns.
pub fn max_drawdown(returns: ArrayView1<'_, f64>) -> Result<f64, MetricsError> {
    require(returns.len(), 1)?;
    let mut peak = f64::NEG_INFINITY;
    let mut worst = f64::NEG_INFINITY;
    for &r in returns {
        peak = peak.max(r);
        worst = worst.max(peak - r);
    }
    finite("max drawdown", worst)
}

/// Summary of the performance of one return series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Compounded return over the window
    pub cumulative_return: f64,
    /// Mean daily return times 252
    pub annualized_return: f64,
    /// Daily standard deviation times sqrt(252)
    pub annualized_volatility: f64,
    /// Daily standard deviation
    pub volatility: f64,
    /// Excess annualized return per unit of annualized volatility
    pub sharpe_ratio: f64,
    /// Maximum drawdown on the return series
    pub max_drawdown: f64,
}

impl PerformanceMetrics {
    /// Evaluate every metric on `returns`.
    pub fn compute(returns: ArrayView1<'_, f64>, risk_free_rate: f64) -> Result<Self, MetricsError> {
        Ok(Self {
            cumulative_return: cumulative_return(returns)?,
            annualized_return: annualized_return(returns)?,
            annualized_volatility: annualized_volatility(returns)?,
            volatility: volatility(returns)?,
            sharpe_ratio: sharpe_ratio(returns, risk_free_rate)?,
            max_drawdown: max_drawdown(returns)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::array;
    use rstest::rstest;

    #[test]
    fn test_cumulative_return_compounds() {
        let r = array![0.005, -0.005, 0.01];
        let expected = 1.005 * 0.995 * 1.01 - 1.0;
        assert_abs_diff_eq!(cumulative_return(r.view()).unwrap(), expected, epsilon = 1e-15);
        assert_abs_diff_eq!(cumulative_return(r.view()).unwrap(), 0.00997, epsilon = 1e-5);
    }

    #[test]
    fn test_cumulative_return_series_last_matches_scalar() {
        let r = array![0.02, -0.01, 0.03, 0.0];
        let series = cumulative_return_series(r.view());
        assert_eq!(series.len(), 4);
        assert_abs_diff_eq!(series[0], 0.02, epsilon = 1e-15);
        assert_abs_diff_eq!(
            series[3],
            cumulative_return(r.view()).unwrap(),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_annualized_return_and_volatility() {
        let r = array![0.01, -0.02, 0.03];
        assert_relative_eq!(
            annualized_return(r.view()).unwrap(),
            0.02 / 3.0 * 252.0,
            epsilon = 1e-12
        );

        let mu: f64 = 0.02 / 3.0;
        let var = ((0.01 - mu).powi(2) + (-0.02 - mu).powi(2) + (0.03 - mu).powi(2)) / 2.0;
        assert_relative_eq!(volatility(r.view()).unwrap(), var.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(
            annualized_volatility(r.view()).unwrap(),
            var.sqrt() * 252.0_f64.sqrt(),
            epsilon = 1e-14
        );
    }

    #[rstest]
    #[case(0.06)]
    #[case(0.0)]
    #[case(0.02)]
    fn test_sharpe_matches_closed_form(#[case] rf: f64) {
        // mean 0.001, sample std 0.01 by construction
        let r = array![0.011, -0.009, 0.011, -0.009, 0.001];
        let mu = mean(r.view()).unwrap();
        let sd = sample_std(r.view()).unwrap();
        let expected = (mu * 252.0 - rf) / (sd * 252.0_f64.sqrt());
        assert_relative_eq!(sharpe_ratio(r.view(), rf).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_sharpe_zero_volatility_is_an_error() {
        let r = array![0.01, 0.01, 0.01];
        assert!(matches!(
            sharpe_ratio(r.view(), DEFAULT_RISK_FREE_RATE),
            Err(MetricsError::ZeroVolatility { .. })
        ));
    }

    #[rstest]
    #[case(0.1)]
    #[case(0.3)]
    #[case(-0.07)]
    fn test_sharpe_constant_series_with_rounding_noise(#[case] value: f64) {
        // 0.1 is not exactly representable, so the sample std is ~1e-16
        let r = array![value, value, value];
        assert!(matches!(
            sharpe_ratio(r.view(), DEFAULT_RISK_FREE_RATE),
            Err(MetricsError::ZeroVolatility { .. })
        ));
        assert!(matches!(
            PerformanceMetrics::compute(r.view(), DEFAULT_RISK_FREE_RATE),
            Err(MetricsError::ZeroVolatility { .. })
        ));
    }

    #[test]
    fn test_max_drawdown_on_returns() {
        // running max: [0.01, 0.01, 0.03, 0.03] -> gaps [0, 0.03, 0, 0.04]
        let r = array![0.01, -0.02, 0.03, -0.01];
        assert_abs_diff_eq!(max_drawdown(r.view()).unwrap(), 0.04, epsilon = 1e-15);
    }

    #[test]
    fn test_max_drawdown_monotone_series_is_zero() {
        let r = array![-0.02, 0.0, 0.01, 0.05];
        assert_abs_diff_eq!(max_drawdown(r.view()).unwrap(), 0.0);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    fn test_short_series_rejected_by_std(#[case] len: usize) {
        let r = Array1::<f64>::zeros(len);
        assert!(matches!(
            volatility(r.view()),
            Err(MetricsError::InsufficientData { required: 2, .. })
        ));
    }

    #[test]
    fn test_empty_series_rejected() {
        let r = Array1::<f64>::zeros(0);
        assert!(cumulative_return(r.view()).is_err());
        assert!(annualized_return(r.view()).is_err());
        assert!(max_drawdown(r.view()).is_err());
    }

    #[test]
    fn test_performance_metrics_bundle() {
        let r = array![0.005, -0.005, 0.01];
        let m = PerformanceMetrics::compute(r.view(), DEFAULT_RISK_FREE_RATE).unwrap();
        assert_relative_eq!(m.annualized_volatility, m.volatility * 252.0_f64.sqrt());
        assert_relative_eq!(
            m.sharpe_ratio,
            (m.annualized_return - 0.06) / m.annualized_volatility
        );
        assert_abs_diff_eq!(m.max_drawdown, 0.01, epsilon = 1e-15);
    }
}
