//! Date-indexed price tables.
//!
//! A [`PriceTable`] holds one column per ticker and one row per trading date.
//! Missing observations are stored as `NaN`. A [`PriceHistory`] pairs the
//! close and adjusted-close tables for the same tickers and dates.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Prices for a set of tickers over a common date index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    values: Array2<f64>,
}

impl PriceTable {
    /// Create a table after checking its shape and labels.
    ///
    /// # Errors
    /// - [`DataError::ShapeMismatch`] if `values` is not dates x tickers
    /// - [`DataError::InvalidTable`] if dates are not strictly increasing or
    ///   tickers repeat
    pub fn new(dates: Vec<NaiveDate>, tickers: Vec<String>, values: Array2<f64>) -> Result<Self> {
        let expected = (dates.len(), tickers.len());
        if values.dim() != expected {
            return Err(DataError::ShapeMismatch {
                expected,
                actual: values.dim(),
            });
        }

        if let Some(pair) = dates.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(DataError::InvalidTable(format!(
                "dates must be strictly increasing ({} then {})",
                pair[0], pair[1]
            )));
        }

        let mut seen = HashSet::with_capacity(tickers.len());
        if let Some(dup) = tickers.iter().find(|t| !seen.insert(t.as_str())) {
            return Err(DataError::InvalidTable(format!("duplicate ticker {dup}")));
        }

        Ok(Self {
            dates,
            tickers,
            values,
        })
    }

    /// Trading dates, one per row
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Tickers, one per column
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Price matrix (dates x tickers)
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Number of dates
    pub fn num_rows(&self) -> usize {
        self.dates.len()
    }

    /// Number of tickers
    pub fn num_columns(&self) -> usize {
        self.tickers.len()
    }

    /// True if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Position of `ticker` among the columns.
    pub fn column_index(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// Prices of one ticker.
    pub fn column(&self, ticker: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(ticker).map(|idx| self.values.column(idx))
    }

    /// New table with the columns reordered to `tickers`.
    ///
    /// # Errors
    /// Returns [`DataError::MissingData`] if a requested ticker is absent.
    pub fn select(&self, tickers: &[String]) -> Result<Self> {
        let indices = tickers
            .iter()
            .map(|ticker| {
                self.column_index(ticker).ok_or_else(|| DataError::MissingData {
                    symbol: ticker.clone(),
                    reason: "ticker not present in price table".to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(
            self.dates.clone(),
            tickers.to_vec(),
            self.values.select(Axis(1), &indices),
        )
    }

    /// New table without `ticker`'s column.
    ///
    /// # Errors
    /// Returns [`DataError::MissingData`] if the ticker is absent.
    pub fn drop_column(&self, ticker: &str) -> Result<Self> {
        if self.column_index(ticker).is_none() {
            return Err(DataError::MissingData {
                symbol: ticker.to_string(),
                reason: "ticker not present in price table".to_string(),
            });
        }
        let remaining: Vec<String> = self
            .tickers
            .iter()
            .filter(|t| *t != ticker)
            .cloned()
            .collect();
        self.select(&remaining)
    }

    /// New table with `f` applied to every column in place.
    pub fn map_columns<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&mut [f64]),
    {
        let mut values = self.values.clone();
        for mut column in values.columns_mut() {
            let mut buffer = column.to_vec();
            f(&mut buffer);
            column.assign(&ArrayView1::from(buffer.as_slice()));
        }
        Self {
            dates: self.dates.clone(),
            tickers: self.tickers.clone(),
            values,
        }
    }

    /// True if any cell is `NaN` or infinite.
    pub fn has_missing(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }
}

/// Daily prices for one symbol as returned by a data provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteSeries {
    /// Ticker symbol
    pub symbol: String,
    /// Trading dates
    pub dates: Vec<NaiveDate>,
    /// Close prices
    pub close: Vec<f64>,
    /// Split- and dividend-adjusted close prices
    pub adjusted_close: Vec<f64>,
}

/// Close and adjusted-close tables over the same dates and tickers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceHistory {
    close: PriceTable,
    adjusted_close: PriceTable,
}

impl PriceHistory {
    /// Pair two tables; their dates and tickers must agree.
    pub fn new(close: PriceTable, adjusted_close: PriceTable) -> Result<Self> {
        if close.dates != adjusted_close.dates || close.tickers != adjusted_close.tickers {
            return Err(DataError::InvalidTable(
                "close and adjusted close tables are not aligned".to_string(),
            ));
        }
        Ok(Self {
            close,
            adjusted_close,
        })
    }

    /// Align per-symbol quotes on the union of their dates.
    ///
    /// Columns follow the order of `quotes`. Dates a symbol did not trade on
    /// are `NaN`. A symbol reporting the same date twice keeps the later quote.
    pub fn from_quotes(quotes: &[QuoteSeries]) -> Result<Self> {
        for series in quotes {
            let len = series.dates.len();
            if series.close.len() != len || series.adjusted_close.len() != len {
                return Err(DataError::Parse(format!(
                    "quote series for {} has mismatched lengths",
                    series.symbol
                )));
            }
        }

        let rows: BTreeMap<NaiveDate, usize> = quotes
            .iter()
            .flat_map(|series| series.dates.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .enumerate()
            .map(|(row, date)| (date, row))
            .collect();

        let shape = (rows.len(), quotes.len());
        let mut close = Array2::from_elem(shape, f64::NAN);
        let mut adjusted = Array2::from_elem(shape, f64::NAN);

        for (col, series) in quotes.iter().enumerate() {
            for (i, date) in series.dates.iter().enumerate() {
                let row = rows[date];
                close[[row, col]] = series.close[i];
                adjusted[[row, col]] = series.adjusted_close[i];
            }
        }

        let dates: Vec<NaiveDate> = rows.into_keys().collect();
        let tickers: Vec<String> = quotes.iter().map(|q| q.symbol.clone()).collect();

        Self::new(
            PriceTable::new(dates.clone(), tickers.clone(), close)?,
            PriceTable::new(dates, tickers, adjusted)?,
        )
    }

    /// Close prices
    pub const fn close(&self) -> &PriceTable {
        &self.close
    }

    /// Adjusted close prices
    pub const fn adjusted_close(&self) -> &PriceTable {
        &self.adjusted_close
    }

    /// Tickers, one per column
    pub fn tickers(&self) -> &[String] {
        self.close.tickers()
    }

    /// Both tables with columns reordered to `tickers`.
    pub fn select(&self, tickers: &[String]) -> Result<Self> {
        Self::new(
            self.close.select(tickers)?,
            self.adjusted_close.select(tickers)?,
        )
    }

    /// Both tables without `ticker`'s column.
    pub fn drop_column(&self, ticker: &str) -> Result<Self> {
        Self::new(
            self.close.drop_column(ticker)?,
            self.adjusted_close.drop_column(ticker)?,
        )
    }

    /// Split back into `(close, adjusted_close)`.
    pub fn into_parts(self) -> (PriceTable, PriceTable) {
        (self.close, self.adjusted_close)
    }
}
