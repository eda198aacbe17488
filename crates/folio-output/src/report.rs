//! Performance report for a portfolio return series.

use chrono::{DateTime, Utc};
use folio_risk::PerformanceMetrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The builder was finished without metrics.
    #[error("Report is missing performance metrics")]
    MissingMetrics,
}

/// Scalar performance figures of one portfolio, stamped with when they
/// were produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Name of the portfolio or series.
    pub name: String,

    /// Report generation timestamp.
    pub timestamp: DateTime<Utc>,

    /// Annual risk-free rate the Sharpe ratio was computed with.
    pub risk_free_rate: f64,

    /// The metrics themselves.
    pub metrics: PerformanceMetrics,
}

impl PerformanceReport {
    /// Create a new report timestamped now.
    pub fn new(name: impl Into<String>, metrics: PerformanceMetrics, risk_free_rate: f64) -> Self {
        Self {
            name: name.into(),
            timestamp: Utc::now(),
            risk_free_rate,
            metrics,
        }
    }

    /// Label and formatted value of each table row, in display order.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let m = &self.metrics;
        vec![
            ("Cumulative Return", percent(m.cumulative_return)),
            ("Annualized Return", percent(m.annualized_return)),
            ("Annualized Volatility", percent(m.annualized_volatility)),
            ("Daily Volatility", percent(m.volatility)),
            ("Sharpe Ratio", format!("{:.4}", m.sharpe_ratio)),
            ("Max Drawdown", percent(m.max_drawdown)),
        ]
    }

    /// Render as a two-column GitHub-style markdown table.
    pub fn to_markdown(&self) -> String {
        let rows = self.rows();
        let label_width = rows
            .iter()
            .map(|(label, _)| label.len())
            .chain(std::iter::once(HEADER_LABEL.len()))
            .max()
            .unwrap_or(HEADER_LABEL.len());
        let value_width = rows
            .iter()
            .map(|(_, value)| value.len())
            .chain(std::iter::once(HEADER_VALUE.len()))
            .max()
            .unwrap_or(HEADER_VALUE.len());

        let mut output = String::new();
        output.push_str(&format!(
            "| {HEADER_LABEL:<label_width$} | {HEADER_VALUE:<value_width$} |\n"
        ));
        output.push_str(&format!(
            "|{}|{}|\n",
            "-".repeat(label_width + 2),
            "-".repeat(value_width + 2)
        ));
        for (label, value) in &rows {
            output.push_str(&format!(
                "| {label:<label_width$} | {value:<value_width$} |\n"
            ));
        }
        output
    }

    /// Convert report to a pretty JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_markdown())
    }
}

const HEADER_LABEL: &str = "Performance Metrics";
const HEADER_VALUE: &str = "Value";

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    name: Option<String>,
    risk_free_rate: Option<f64>,
    metrics: Option<PerformanceMetrics>,
}

impl ReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the portfolio name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the risk-free rate (default: 0.06).
    pub const fn risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = Some(rate);
        self
    }

    /// Set the metrics.
    pub const fn metrics(mut self, metrics: PerformanceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the report.
    pub fn build(self) -> Result<PerformanceReport, ReportError> {
        let metrics = self.metrics.ok_or(ReportError::MissingMetrics)?;
        Ok(PerformanceReport::new(
            self.name.unwrap_or_else(|| "Portfolio".to_string()),
            metrics,
            self.risk_free_rate
                .unwrap_or(folio_risk::DEFAULT_RISK_FREE_RATE),
        ))
    }
}
