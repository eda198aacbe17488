//! Error types for portfolio operations.

use folio_data::DataError;
use folio_risk::{CorrelationError, MetricsError, OptimizerError};
use thiserror::Error;

/// Result type for portfolio operations.
pub type Result<T> = std::result::Result<T, PortfolioError>;

/// Errors returned by [`Portfolio`](crate::Portfolio) operations.
///
/// A failed call leaves the portfolio unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortfolioError {
    /// Malformed or inconsistent input
    #[error("Validation error: {0}")]
    Validation(String),

    /// An analytic was requested before its inputs were loaded or derived
    #[error("Data not loaded: {0}")]
    DataNotLoaded(String),

    /// A statistic is undefined for the given data
    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] MetricsError),

    /// The optimizer failed
    #[error("Optimization error: {0}")]
    Optimization(#[from] OptimizerError),
}

impl From<CorrelationError> for PortfolioError {
    fn from(err: CorrelationError) -> Self {
        match err {
            CorrelationError::InvalidWindow(_) => Self::Validation(err.to_string()),
            CorrelationError::Metrics(inner) => Self::Arithmetic(inner),
        }
    }
}

/// Problems with the supplied tables are [`PortfolioError::Validation`];
/// failures to obtain or decode prices are [`PortfolioError::DataNotLoaded`].
impl From<DataError> for PortfolioError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::MissingData { .. }
            | DataError::ShapeMismatch { .. }
            | DataError::InvalidTable(_)
            | DataError::InvalidSymbol(_)
            | DataError::InvalidLookback(_) => Self::Validation(err.to_string()),
            DataError::YahooApi(_)
            | DataError::Parse(_)
            | DataError::Polars(_)
            | DataError::TimeConversion(_) => Self::DataNotLoaded(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_window_is_validation() {
        let err: PortfolioError = CorrelationError::InvalidWindow(0).into();
        assert!(matches!(err, PortfolioError::Validation(_)));
    }

    #[test]
    fn test_table_errors_are_validation() {
        let errors = [
            DataError::ShapeMismatch {
                expected: (3, 2),
                actual: (3, 1),
            },
            DataError::InvalidTable("duplicate ticker A".to_string()),
            DataError::MissingData {
                symbol: "C".to_string(),
                reason: "not in table".to_string(),
            },
            DataError::InvalidLookback("5m".to_string()),
        ];
        for err in errors {
            assert!(matches!(
                PortfolioError::from(err),
                PortfolioError::Validation(_)
            ));
        }
    }

    #[test]
    fn test_fetch_failures_are_data_not_loaded() {
        let errors = [
            DataError::YahooApi("HTTP 404".to_string()),
            DataError::Parse("bad date".to_string()),
            DataError::TimeConversion("invalid timestamp".to_string()),
        ];
        for err in errors {
            let mapped = PortfolioError::from(err);
            assert!(matches!(mapped, PortfolioError::DataNotLoaded(_)));
        }

        let err: PortfolioError = DataError::YahooApi("HTTP 404".to_string()).into();
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn test_insufficient_data_is_arithmetic() {
        let err: PortfolioError = CorrelationError::Metrics(MetricsError::InsufficientData {
            required: 2,
            actual: 1,
        })
        .into();
        assert!(matches!(
            err,
            PortfolioError::Arithmetic(MetricsError::InsufficientData { .. })
        ));
    }
}
