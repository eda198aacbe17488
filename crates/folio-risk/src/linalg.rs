//! Small dense linear algebra helpers
//!
//! The optimizer works on problems with one variable per asset, so these
//! routines favour simplicity over asymptotic speed.

use ndarray::{Array1, Array2};
use thiserror::Error;

/// Errors from the dense linear algebra helpers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinalgError {
    /// Matrix is singular to working precision
    #[error("Matrix is singular (pivot {pivot:e} in column {column})")]
    Singular {
        /// Column where elimination broke down
        column: usize,
        /// Magnitude of the best available pivot
        pivot: f64,
    },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// No point satisfies the bounds and the sum constraint
    #[error("Bounds [{lower}, {upper}] cannot sum to {total}")]
    Infeasible {
        /// Sum of lower bounds
        lower: f64,
        /// Sum of upper bounds
        upper: f64,
        /// Required total
        total: f64,
    },
}

const PIVOT_TOLERANCE: f64 = 1e-14;

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
pub fn solve_linear_system(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, LinalgError> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(LinalgError::DimensionMismatch {
            expected: n,
            actual: a.ncols(),
        });
    }
    if b.len() != n {
        return Err(LinalgError::DimensionMismatch {
            expected: n,
            actual: b.len(),
        });
    }

    let mut m = a.clone();
    let mut rhs = b.clone();

    for col in 0..n {
        // Partial pivoting
        let (pivot_row, pivot) = (col..n)
            .map(|row| (row, m[[row, col]].abs()))
            .fold((col, -1.0), |best, cand| if cand.1 > best.1 { cand } else { best });

        if pivot < PIVOT_TOLERANCE || !pivot.is_finite() {
            return Err(LinalgError::Singular { column: col, pivot });
        }

        if pivot_row != col {
            for k in 0..n {
                m.swap([col, k], [pivot_row, k]);
            }
            rhs.swap(col, pivot_row);
        }

        for row in (col + 1)..n {
            let factor = m[[row, col]] / m[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[[row, k]] -= factor * m[[col, k]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    // Back substitution
    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| m[[row, k]] * x[k]).sum();
        x[row] = (rhs[row] - tail) / m[[row, row]];
    }

    Ok(x)
}

/// Euclidean projection of `y` onto `{x : lower <= x <= upper, sum(x) = total}`.
///
/// The projection has the form `x_i = clamp(y_i - λ, lower_i, upper_i)`; the
/// shift `λ` is found by bisection on the monotone sum.
pub fn project_onto_capped_simplex(
    y: &Array1<f64>,
    lower: &Array1<f64>,
    upper: &Array1<f64>,
    total: f64,
) -> Result<Array1<f64>, LinalgError> {
    let n = y.len();
    for bound in [lower, upper] {
        if bound.len() != n {
            return Err(LinalgError::DimensionMismatch {
                expected: n,
                actual: bound.len(),
            });
        }
    }

    let lower_sum = lower.sum();
    let upper_sum = upper.sum();
    let slack = 1e-12 * (1.0 + total.abs());
    if lower_sum > total + slack || upper_sum < total - slack || n == 0 {
        return Err(LinalgError::Infeasible {
            lower: lower_sum,
            upper: upper_sum,
            total,
        });
    }

    let shifted = |lambda: f64| -> Array1<f64> {
        ndarray::Zip::from(y)
            .and(lower)
            .and(upper)
            .map_collect(|&v, &lo, &hi| (v - lambda).clamp(lo, hi))
    };

    // sum(shifted(lambda)) is non-increasing in lambda
    let mut lo_lambda = ndarray::Zip::from(y)
        .and(upper)
        .fold(f64::INFINITY, |acc, &v, &hi| acc.min(v - hi));
    let mut hi_lambda = ndarray::Zip::from(y)
        .and(lower)
        .fold(f64::NEG_INFINITY, |acc, &v, &lo| acc.max(v - lo));

    for _ in 0..200 {
        let mid = 0.5 * (lo_lambda + hi_lambda);
        if shifted(mid).sum() > total {
            lo_lambda = mid;
        } else {
            hi_lambda = mid;
        }
        if hi_lambda - lo_lambda <= f64::EPSILON * (1.0 + mid.abs()) {
            break;
        }
    }

    Ok(shifted(0.5 * (lo_lambda + hi_lambda)))
}
