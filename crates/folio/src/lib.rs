#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/folio/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod portfolio;
pub mod returns;

// Re-export main types from sub-crates
pub use folio_data as data;
pub use folio_output as output;
pub use folio_risk as risk;

pub use error::{PortfolioError, Result};
pub use portfolio::{DatedCorrelation, Portfolio};
pub use returns::{ReturnSeries, simple_returns};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
