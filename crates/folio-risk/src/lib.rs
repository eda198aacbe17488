#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/folio/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod correlation;
pub mod covariance;
pub mod linalg;
pub mod metrics;
pub mod optimize;

// Re-export main types
pub use correlation::{CorrelationError, RollingCorrelation, correlation_matrix, rolling_correlation};
pub use metrics::{DEFAULT_RISK_FREE_RATE, MetricsError, PerformanceMetrics, TRADING_DAYS};
pub use optimize::{OptimizationResult, OptimizerConfig, OptimizerError, maximize_sharpe};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
