//! Objective functions for the allocation optimizer

use super::OptimizerError;
use crate::covariance::{column_means, sample_covariance};
use crate::metrics::{MetricsError, TRADING_DAYS, sharpe_ratio};
use ndarray::{Array1, Array2, ArrayView2};

/// Step used by the default central-difference gradient.
const FINITE_DIFFERENCE_STEP: f64 = 1e-7;

/// A smooth function of the weight vector to be minimized.
pub trait Objective {
    /// Number of decision variables
    fn dimension(&self) -> usize;

    /// Evaluate the objective at `weights`
    fn value(&self, weights: &Array1<f64>) -> Result<f64, OptimizerError>;

    /// Gradient of the objective at `weights`
    ///
    /// Default implementation uses central differences.
    fn gradient(&self, weights: &Array1<f64>) -> Result<Array1<f64>, OptimizerError> {
        let mut grad = Array1::<f64>::zeros(weights.len());
        let mut probe = weights.clone();
        for i in 0..weights.len() {
            probe[i] = weights[i] + FINITE_DIFFERENCE_STEP;
            let up = self.value(&probe)?;
            probe[i] = weights[i] - FINITE_DIFFERENCE_STEP;
            let down = self.value(&probe)?;
            probe[i] = weights[i];
            grad[i] = (up - down) / (2.0 * FINITE_DIFFERENCE_STEP);
        }
        Ok(grad)
    }
}

/// Negated Sharpe ratio of the weighted portfolio return series.
///
/// The value goes through [`sharpe_ratio`] on `R w`, so the optimizer
/// maximizes exactly the reported metric. The gradient is analytic:
///
/// ```text
/// S(w)  = (252 μᵀw - rf) / (√252 · sqrt(wᵀΣw))
/// ∇S(w) = 252 μ / (√252 σ) - (252 μᵀw - rf) Σw / (√252 σ³)
/// ```
#[derive(Debug)]
pub struct SharpeObjective<'a> {
    returns: ArrayView2<'a, f64>,
    risk_free_rate: f64,
    means: Array1<f64>,
    covariance: Array2<f64>,
}

impl<'a> SharpeObjective<'a> {
    /// Build the objective over a periods x assets return table.
    pub fn new(returns: ArrayView2<'a, f64>, risk_free_rate: f64) -> Result<Self, OptimizerError> {
        Ok(Self {
            means: column_means(returns)?,
            covariance: sample_covariance(returns)?,
            returns,
            risk_free_rate,
        })
    }

    /// Sharpe ratio (not negated) of the portfolio with `weights`.
    pub fn sharpe(&self, weights: &Array1<f64>) -> Result<f64, MetricsError> {
        sharpe_ratio(self.returns.dot(weights).view(), self.risk_free_rate)
    }
}

impl Objective for SharpeObjective<'_> {
    fn dimension(&self) -> usize {
        self.returns.ncols()
    }

    fn value(&self, weights: &Array1<f64>) -> Result<f64, OptimizerError> {
        Ok(-self.sharpe(weights)?)
    }

    fn gradient(&self, weights: &Array1<f64>) -> Result<Array1<f64>, OptimizerError> {
        let sigma_w = self.covariance.dot(weights);
        let variance = weights.dot(&sigma_w);
        if variance.is_nan() || variance <= 0.0 {
            return Err(MetricsError::ZeroVolatility {
                metric: "Sharpe ratio gradient",
            }
            .into());
        }

        let sd = variance.sqrt();
        let scale = TRADING_DAYS.sqrt();
        let excess = self.means.dot(weights) * TRADING_DAYS - self.risk_free_rate;

        let grad = &self.means * (TRADING_DAYS / (scale * sd))
            - &sigma_w * (excess / (scale * sd * variance));

        if grad.iter().any(|g| !g.is_finite()) {
            return Err(MetricsError::NonFinite {
                metric: "Sharpe ratio gradient",
                value: f64::NAN,
            }
            .into());
        }

        // Minimizing the negated ratio
        Ok(-grad)
    }
}
