//! Constrained allocation optimization
//!
//! Finds long-only weights that maximize the Sharpe ratio of the weighted
//! portfolio return series:
//!
//! ```text
//! maximize   sharpe(R w)
//! subject to sum(w) = 1
//!            lower <= w_i <= upper
//! ```
//!
//! The problem is solved by sequential quadratic programming ([`SqpSolver`])
//! on the negated objective, starting from the caller's current weights. The
//! problem is not convex in general, so the result is a local optimum that
//! depends on the starting point.

pub mod objective;
pub mod qp;
pub mod sqp;

pub use objective::{Objective, SharpeObjective};
pub use qp::{QpSolution, solve_box_qp};
pub use sqp::SqpSolver;

use crate::linalg::LinalgError;
use crate::metrics::{DEFAULT_RISK_FREE_RATE, MetricsError};
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during optimization
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    /// Solver hit its iteration cap
    #[error("Optimizer did not converge within {iterations} iterations")]
    NotConverged {
        /// Iterations performed
        iterations: usize,
    },

    /// No allocation satisfies the constraints
    #[error("Optimization problem is infeasible: {0}")]
    Infeasible(String),

    /// Objective or gradient could not be evaluated
    #[error("Objective evaluation failed: {0}")]
    Objective(#[from] MetricsError),

    /// Linear algebra breakdown inside a subproblem
    #[error("Numerical breakdown: {0}")]
    Numerical(#[from] LinalgError),

    /// Line search could not find an acceptable step
    #[error("Line search failed after {iterations} iterations")]
    LineSearch {
        /// Outer iteration at which the search failed
        iterations: usize,
    },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Invalid configuration value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Maximum number of SQP iterations (default: 100)
    pub max_iterations: usize,

    /// Convergence tolerance on the objective change and the constraint
    /// residual (default: 1e-6)
    pub tolerance: f64,

    /// Lower bound on every weight (default: 0.0)
    pub lower_bound: f64,

    /// Upper bound on every weight (default: 1.0)
    pub upper_bound: f64,

    /// Annual risk-free rate in the Sharpe objective (default: 0.06)
    pub risk_free_rate: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-6,
            lower_bound: 0.0,
            upper_bound: 1.0,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
        }
    }
}

impl OptimizerConfig {
    /// Check that the configuration describes a solvable problem shape.
    pub fn validate(&self) -> Result<(), OptimizerError> {
        if self.max_iterations == 0 {
            return Err(OptimizerError::InvalidParameter(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(OptimizerError::InvalidParameter(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.lower_bound.is_nan()
            || self.upper_bound.is_nan()
            || self.lower_bound > self.upper_bound
        {
            return Err(OptimizerError::InvalidParameter(format!(
                "lower bound {} exceeds upper bound {}",
                self.lower_bound, self.upper_bound
            )));
        }
        Ok(())
    }
}

/// Outcome of a successful optimization run.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Optimal weights found
    pub weights: Array1<f64>,
    /// Final objective value (the negated Sharpe ratio for [`SharpeObjective`])
    pub objective_value: f64,
    /// Number of SQP iterations used
    pub iterations: usize,
}

/// Maximize the Sharpe ratio of `returns · w` starting from `initial`.
///
/// # Arguments
/// * `returns` - Daily returns, periods x assets
/// * `initial` - Starting weights, one per asset
/// * `config` - Solver settings and risk-free rate
pub fn maximize_sharpe(
    returns: ArrayView2<'_, f64>,
    initial: &Array1<f64>,
    config: &OptimizerConfig,
) -> Result<OptimizationResult, OptimizerError> {
    if initial.len() != returns.ncols() {
        return Err(OptimizerError::DimensionMismatch {
            expected: returns.ncols(),
            actual: initial.len(),
        });
    }
    let objective = SharpeObjective::new(returns, config.risk_free_rate)?;
    SqpSolver::new(config.clone())?.minimize(&objective, initial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::sharpe_ratio;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    pub(crate) fn three_assets() -> Array2<f64> {
        let a = [0.012, -0.004, 0.008, 0.015, -0.006, 0.010, 0.003, -0.002, 0.011, 0.007];
        let b = [0.002, 0.009, -0.003, 0.004, 0.008, -0.001, 0.006, 0.005, -0.004, 0.003];
        let c = [-0.005, 0.001, 0.002, -0.008, 0.004, -0.003, 0.000, 0.001, -0.006, 0.002];
        Array2::from_shape_fn((10, 3), |(t, i)| [a[t], b[t], c[t]][i])
    }

    #[test]
    fn test_config_default() {
        let config = OptimizerConfig::default();
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.tolerance, 1e-6);
        assert_eq!(config.lower_bound, 0.0);
        assert_eq!(config.upper_bound, 1.0);
        assert_eq!(config.risk_free_rate, 0.06);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let config = OptimizerConfig {
            lower_bound: 0.6,
            upper_bound: 0.4,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(OptimizerError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_maximize_sharpe_three_assets() {
        let returns = three_assets();
        let initial = Array1::from_elem(3, 1.0 / 3.0);
        let result = maximize_sharpe(returns.view(), &initial, &OptimizerConfig::default()).unwrap();

        assert_abs_diff_eq!(result.weights.sum(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.weights[0], 0.344883, epsilon = 1e-3);
        assert_abs_diff_eq!(result.weights[1], 0.380536, epsilon = 1e-3);
        assert_abs_diff_eq!(result.weights[2], 0.274581, epsilon = 1e-3);

        let before = sharpe_ratio(returns.dot(&initial).view(), 0.06).unwrap();
        let after = sharpe_ratio(returns.dot(&result.weights).view(), 0.06).unwrap();
        assert!(after >= before);
        assert_abs_diff_eq!(-result.objective_value, after, epsilon = 1e-9);
    }

    #[test]
    fn test_dominant_asset_takes_everything() {
        let returns = array![
            [0.010, -0.010],
            [0.012, 0.020],
            [0.009, -0.015],
            [0.011, 0.010],
            [0.010, -0.020],
            [0.013, 0.005],
        ];
        let initial = array![0.5, 0.5];
        let result = maximize_sharpe(returns.view(), &initial, &OptimizerConfig::default()).unwrap();
        assert_abs_diff_eq!(result.weights[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.weights[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_dimension_mismatch() {
        let returns = three_assets();
        let initial = array![0.5, 0.5];
        assert!(matches!(
            maximize_sharpe(returns.view(), &initial, &OptimizerConfig::default()),
            Err(OptimizerError::DimensionMismatch { .. })
        ));
    }
}
