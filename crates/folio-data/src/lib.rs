#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/folio/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod clean;
pub mod error;
pub mod lookback;
pub mod source;
pub mod table;
pub mod yahoo;

pub use clean::{CleaningConfig, clean_history, clean_table};
pub use error::{DataError, Result};
pub use lookback::Lookback;
pub use source::{PriceSource, StaticPriceSource, fetch_all};
pub use table::{PriceHistory, PriceTable, QuoteSeries};
pub use yahoo::YahooQuoteProvider;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
