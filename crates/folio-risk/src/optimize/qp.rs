//! Primal active-set solver for the SQP subproblem
//!
//! Solves
//!
//! ```text
//! minimize   ½ dᵀBd + gᵀd
//! subject to sum(d) = total
//!            lower <= d <= upper
//! ```
//!
//! for a symmetric positive definite `B`. The working set holds the bound
//! constraints currently treated as equalities. Each iteration solves the
//! equality-constrained problem on the free variables through its KKT system,
//! then either moves to the first blocking bound or releases the bound with
//! the most negative multiplier.

use super::OptimizerError;
use crate::linalg::{project_onto_capped_simplex, solve_linear_system};
use ndarray::{Array1, Array2};

const ACTIVE_TOLERANCE: f64 = 1e-12;
const STEP_TOLERANCE: f64 = 1e-12;
const MULTIPLIER_TOLERANCE: f64 = 1e-12;

/// Which side of the box a working-set variable is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Free,
    Lower,
    Upper,
}

/// Solution of the quadratic subproblem.
#[derive(Debug, Clone, PartialEq)]
pub struct QpSolution {
    /// Optimal step
    pub step: Array1<f64>,
    /// Lagrange multiplier of the sum constraint
    pub multiplier: f64,
    /// Active-set iterations used
    pub iterations: usize,
}

/// Solve the box- and sum-constrained quadratic program.
///
/// # Arguments
/// * `hessian` - Positive definite matrix `B`
/// * `gradient` - Linear term `g`
/// * `lower`, `upper` - Bounds on each component of the step
/// * `total` - Required sum of the step
pub fn solve_box_qp(
    hessian: &Array2<f64>,
    gradient: &Array1<f64>,
    lower: &Array1<f64>,
    upper: &Array1<f64>,
    total: f64,
) -> Result<QpSolution, OptimizerError> {
    let n = gradient.len();
    if hessian.dim() != (n, n) {
        return Err(OptimizerError::DimensionMismatch {
            expected: n,
            actual: hessian.nrows(),
        });
    }

    // Feasible starting point: the projection of the origin
    let mut d = project_onto_capped_simplex(&Array1::zeros(n), lower, upper, total)
        .map_err(|e| OptimizerError::Infeasible(e.to_string()))?;

    let mut state: Vec<Bound> = (0..n)
        .map(|i| {
            if (d[i] - lower[i]).abs() <= ACTIVE_TOLERANCE {
                Bound::Lower
            } else if (d[i] - upper[i]).abs() <= ACTIVE_TOLERANCE {
                Bound::Upper
            } else {
                Bound::Free
            }
        })
        .collect();

    let max_iterations = 10 * n + 20;
    for iteration in 1..=max_iterations {
        let q = hessian.dot(&d) + gradient;
        let free: Vec<usize> = (0..n).filter(|&i| state[i] == Bound::Free).collect();

        let (step, multiplier) = if free.is_empty() {
            (Vec::new(), None)
        } else {
            let (p, nu) = equality_step(hessian, &q, &free)?;
            (p, Some(nu))
        };

        let step_norm = step.iter().map(|v| v * v).sum::<f64>().sqrt();
        if step_norm <= STEP_TOLERANCE {
            let nu = multiplier.unwrap_or_else(|| vertex_multiplier(&q, &state));

            // Most negative bound multiplier leaves the working set
            let mut release = None;
            let mut most_negative = -MULTIPLIER_TOLERANCE;
            for (i, bound) in state.iter().enumerate() {
                let lambda = match bound {
                    Bound::Lower => q[i] - nu,
                    Bound::Upper => nu - q[i],
                    Bound::Free => continue,
                };
                if lambda < most_negative {
                    most_negative = lambda;
                    release = Some(i);
                }
            }

            match release {
                Some(i) => state[i] = Bound::Free,
                None => {
                    return Ok(QpSolution {
                        step: d,
                        multiplier: nu,
                        iterations: iteration,
                    });
                }
            }
        } else {
            // Longest feasible move along the step
            let mut alpha = 1.0;
            let mut blocking = None;
            for (k, &i) in free.iter().enumerate() {
                let pk = step[k];
                let (limit, side) = if pk < -STEP_TOLERANCE {
                    ((lower[i] - d[i]) / pk, Bound::Lower)
                } else if pk > STEP_TOLERANCE {
                    ((upper[i] - d[i]) / pk, Bound::Upper)
                } else {
                    continue;
                };
                if limit < alpha {
                    alpha = limit.max(0.0);
                    blocking = Some((i, side));
                }
            }

            for (k, &i) in free.iter().enumerate() {
                d[i] += alpha * step[k];
            }
            if let Some((i, side)) = blocking {
                d[i] = if side == Bound::Lower { lower[i] } else { upper[i] };
                state[i] = side;
            }
        }
    }

    Err(OptimizerError::NotConverged {
        iterations: max_iterations,
    })
}

/// Solve the KKT system restricted to the free variables.
///
/// ```text
/// [ B_FF  1 ] [ p ]   [ -q_F ]
/// [ 1ᵀ    0 ] [ ν'] = [  0   ]
/// ```
///
/// Returns the step on the free variables and the sum multiplier `ν = -ν'`.
fn equality_step(
    hessian: &Array2<f64>,
    q: &Array1<f64>,
    free: &[usize],
) -> Result<(Vec<f64>, f64), OptimizerError> {
    let m = free.len();
    let mut kkt = Array2::<f64>::zeros((m + 1, m + 1));
    let mut rhs = Array1::<f64>::zeros(m + 1);

    for (a, &i) in free.iter().enumerate() {
        for (b, &j) in free.iter().enumerate() {
            kkt[[a, b]] = hessian[[i, j]];
        }
        kkt[[a, m]] = 1.0;
        kkt[[m, a]] = 1.0;
        rhs[a] = -q[i];
    }

    let solution = solve_linear_system(&kkt, &rhs)?;
    Ok((solution.iter().take(m).copied().collect(), -solution[m]))
}

/// Sum multiplier when every variable sits on a bound.
///
/// Any value between the largest upper-bound gradient and the smallest
/// lower-bound gradient is consistent; pick the one that keeps lower-bound
/// multipliers non-negative and let the release step handle the rest.
fn vertex_multiplier(q: &Array1<f64>, state: &[Bound]) -> f64 {
    let lowest_lower = state
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == Bound::Lower)
        .map(|(i, _)| q[i])
        .fold(f64::INFINITY, f64::min);

    if lowest_lower.is_finite() {
        lowest_lower
    } else {
        state
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == Bound::Upper)
            .map(|(i, _)| q[i])
            .fold(f64::NEG_INFINITY, f64::max)
    }
}
