//! Sequential quadratic programming for allocation problems
//!
//! Minimizes a smooth [`Objective`] subject to `sum(w) = 1` and box bounds on
//! every weight. Each iteration:
//!
//! 1. solves the quadratic model `min ½ dᵀBd + ∇fᵀd` with the linearized sum
//!    constraint and the bounds shifted to the current iterate
//!    ([`solve_box_qp`]);
//! 2. backtracks along `d` on the L1 merit function `f + μ |sum(w) - 1|`;
//! 3. updates the quasi-Newton matrix `B` with Powell-damped BFGS so it stays
//!    positive definite.
//!
//! Iteration stops when the objective changes by less than the tolerance at a
//! feasible point, or when the subproblem returns a vanishing step.

use super::{Objective, OptimizationResult, OptimizerConfig, OptimizerError, solve_box_qp};
use ndarray::{Array1, Array2};
use tracing::{debug, trace};

/// Sufficient-decrease constant for the Armijo condition
const ARMIJO: f64 = 1e-4;
/// Smallest step fraction tried by the line search
const MIN_STEP: f64 = 1e-10;
/// Factor applied to the sum multiplier when raising the merit penalty
const PENALTY_SCALE: f64 = 1.5;
/// Floor added to the merit penalty
const PENALTY_FLOOR: f64 = 1e-8;
/// Powell damping threshold
const DAMPING: f64 = 0.2;
/// Subproblem steps shorter than this count as stationary
const STEP_TOLERANCE: f64 = 1e-10;
/// Curvature below which the quasi-Newton update is skipped
const CURVATURE_TOLERANCE: f64 = 1e-16;

/// SQP solver for sum-to-one, box-bounded problems.
#[derive(Debug, Clone)]
pub struct SqpSolver {
    config: OptimizerConfig,
}

impl SqpSolver {
    /// Create a solver with the given configuration
    pub fn new(config: OptimizerConfig) -> Result<Self, OptimizerError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create with default configuration.
    ///
    /// # Errors
    /// Returns an error if the default configuration is invalid (should not happen).
    pub fn try_default() -> Result<Self, OptimizerError> {
        Self::new(OptimizerConfig::default())
    }

    /// Get the configuration
    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Minimize `objective` starting from `initial`.
    ///
    /// The starting point is clipped into the bounds; it does not need to sum
    /// to one.
    pub fn minimize<O>(
        &self,
        objective: &O,
        initial: &Array1<f64>,
    ) -> Result<OptimizationResult, OptimizerError>
    where
        O: Objective + ?Sized,
    {
        let n = objective.dimension();
        if initial.len() != n {
            return Err(OptimizerError::DimensionMismatch {
                expected: n,
                actual: initial.len(),
            });
        }

        let lo = self.config.lower_bound;
        let hi = self.config.upper_bound;
        let tol = self.config.tolerance;

        let mut x = initial.mapv(|v| v.clamp(lo, hi));
        let mut f = objective.value(&x)?;
        let mut g = objective.gradient(&x)?;
        let mut hessian = Array2::<f64>::eye(n);
        let mut penalty = 0.0_f64;

        for iteration in 1..=self.config.max_iterations {
            let residual = x.sum() - 1.0;
            let lower = x.mapv(|v| lo - v);
            let upper = x.mapv(|v| hi - v);

            let qp = solve_box_qp(&hessian, &g, &lower, &upper, -residual)?;
            let d = qp.step;
            let step_norm = d.dot(&d).sqrt();

            trace!(iteration, f, residual, step_norm, "sqp iterate");

            if step_norm < STEP_TOLERANCE && residual.abs() < tol {
                debug!(iteration, objective = f, "sqp converged on step norm");
                return Ok(OptimizationResult {
                    weights: x,
                    objective_value: f,
                    iterations: iteration,
                });
            }

            penalty = penalty.max(PENALTY_SCALE * qp.multiplier.abs() + PENALTY_FLOOR);
            let merit = f + penalty * residual.abs();
            let slope = g.dot(&d) - penalty * residual.abs();

            let (x_next, f_next) = self
                .line_search(objective, &x, &d, merit, slope, penalty)
                .ok_or(OptimizerError::LineSearch {
                    iterations: iteration,
                })?;
            let g_next = objective.gradient(&x_next)?;

            damped_bfgs_update(&mut hessian, &(&x_next - &x), &(&g_next - &g));

            let change = (f_next - f).abs();
            x = x_next;
            f = f_next;
            g = g_next;

            if change < tol && (x.sum() - 1.0).abs() < tol {
                debug!(iteration, objective = f, "sqp converged on objective change");
                return Ok(OptimizationResult {
                    weights: x,
                    objective_value: f,
                    iterations: iteration,
                });
            }
        }

        Err(OptimizerError::NotConverged {
            iterations: self.config.max_iterations,
        })
    }

    /// Backtracking Armijo search on the L1 merit function.
    ///
    /// Trial points where the objective cannot be evaluated count as rejected.
    fn line_search<O>(
        &self,
        objective: &O,
        x: &Array1<f64>,
        d: &Array1<f64>,
        merit: f64,
        slope: f64,
        penalty: f64,
    ) -> Option<(Array1<f64>, f64)>
    where
        O: Objective + ?Sized,
    {
        let (lo, hi) = (self.config.lower_bound, self.config.upper_bound);
        let mut alpha = 1.0;
        while alpha >= MIN_STEP {
            let trial = (x + &(d * alpha)).mapv(|v| v.clamp(lo, hi));
            if let Ok(value) = objective.value(&trial) {
                let trial_merit = value + penalty * (trial.sum() - 1.0).abs();
                if value.is_finite() && trial_merit <= merit + ARMIJO * alpha * slope {
                    return Some((trial, value));
                }
            }
            alpha *= 0.5;
        }
        None
    }
}

/// Powell-damped BFGS update of `b` with step `s` and gradient change `y`.
///
/// Keeps `b` positive definite by blending `y` towards `Bs` whenever the
/// curvature `sᵀy` is too small relative to `sᵀBs`.
fn damped_bfgs_update(b: &mut Array2<f64>, s: &Array1<f64>, y: &Array1<f64>) {
    let bs = b.dot(s);
    let s_bs = s.dot(&bs);
    if s_bs.is_nan() || s_bs <= CURVATURE_TOLERANCE {
        return;
    }

    let mut s_y = s.dot(y);
    let y = if s_y < DAMPING * s_bs {
        let theta = (1.0 - DAMPING) * s_bs / (s_bs - s_y);
        let blended = y * theta + &bs * (1.0 - theta);
        s_y = s.dot(&blended);
        blended
    } else {
        y.clone()
    };

    if !s_y.is_finite() || s_y <= 0.0 {
        return;
    }

    let n = b.nrows();
    for i in 0..n {
        for j in 0..n {
            b[[i, j]] += y[i] * y[j] / s_y - bs[i] * bs[j] / s_bs;
        }
    }
}
