#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/folio/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod charts;
pub mod export;
pub mod report;

pub use charts::{
    ChartError, ChartSeries, DEFAULT_VOLATILITY_WINDOW, HeatmapCell, HeatmapData,
    asset_rolling_volatility, cumulative_growth, drawdown_curve, normalized_prices,
    rolling_volatility,
};
pub use export::{AllocationExport, ExportError, ExportFormat, Exporter, Holding};
pub use report::{PerformanceReport, ReportBuilder, ReportError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
