//! Gap filling for raw price tables.
//!
//! Each column is cleaned independently in two passes:
//!
//! 1. linear interpolation across runs of missing values, filling at most
//!    `interpolation_limit` consecutive points after the last valid one; a
//!    run with no valid value after it is filled with the last valid value;
//! 2. forward fill of whatever is still missing.
//!
//! Values before the first valid observation stay missing.

use crate::table::{PriceHistory, PriceTable};
use serde::{Deserialize, Serialize};

/// Cleaning configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Maximum number of consecutive missing values to interpolate (default: 5)
    pub interpolation_limit: usize,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            interpolation_limit: 5,
        }
    }
}

/// Interpolate missing values in `values`, at most `limit` per gap.
pub fn interpolate(values: &mut [f64], limit: usize) {
    let n = values.len();
    let Some(first) = values.iter().position(|v| v.is_finite()) else {
        return;
    };

    let mut anchor = first;
    let mut i = first + 1;
    while i < n {
        if values[i].is_finite() {
            anchor = i;
            i += 1;
            continue;
        }

        let gap_end = (i..n).find(|&k| values[k].is_finite()).unwrap_or(n);
        let start_value = values[anchor];
        let fill_end = gap_end.min(i + limit);

        for k in i..fill_end {
            values[k] = if gap_end < n {
                let span = (gap_end - anchor) as f64;
                let t = (k - anchor) as f64 / span;
                start_value + (values[gap_end] - start_value) * t
            } else {
                start_value
            };
        }
        i = gap_end;
    }
}

/// Replace missing values with the last valid value before them.
pub fn forward_fill(values: &mut [f64]) {
    let mut last = None;
    for v in values.iter_mut() {
        if v.is_finite() {
            last = Some(*v);
        } else if let Some(prev) = last {
            *v = prev;
        }
    }
}

/// Clean every column of a table.
pub fn clean_table(table: &PriceTable, config: &CleaningConfig) -> PriceTable {
    table.map_columns(|column| {
        interpolate(column, config.interpolation_limit);
        forward_fill(column);
    })
}

/// Clean both tables of a history.
pub fn clean_history(history: &PriceHistory, config: &CleaningConfig) -> crate::Result<PriceHistory> {
    PriceHistory::new(
        clean_table(history.close(), config),
        clean_table(history.adjusted_close(), config),
    )
}
