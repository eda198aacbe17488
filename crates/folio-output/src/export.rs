//! CSV and JSON export of reports, chart data and allocations.
//!
//! CSV output is long-format (one record per point) so that every series
//! shape flattens to the same few columns.

use crate::charts::{ChartSeries, HeatmapData};
use crate::report::PerformanceReport;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer produced invalid UTF-8.
    #[error("Invalid UTF-8 in output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Tickers and weights disagree in length.
    #[error("{tickers} tickers for {weights} weights")]
    LengthMismatch {
        /// Number of tickers
        tickers: usize,
        /// Number of weights
        weights: usize,
    },
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    #[default]
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// One portfolio position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Holding {
    /// Ticker symbol.
    pub ticker: String,

    /// Fraction of capital (0.0 to 1.0).
    pub weight: f64,
}

/// Portfolio weights as of an optional date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationExport {
    /// Portfolio name or identifier.
    pub name: String,

    /// Last date of the data the weights were derived from.
    pub date: Option<NaiveDate>,

    /// Positions in portfolio order.
    pub holdings: Vec<Holding>,
}

impl AllocationExport {
    /// Pair tickers with weights.
    pub fn new(
        name: impl Into<String>,
        date: Option<NaiveDate>,
        tickers: &[String],
        weights: &[f64],
    ) -> Result<Self, ExportError> {
        if tickers.len() != weights.len() {
            return Err(ExportError::LengthMismatch {
                tickers: tickers.len(),
                weights: weights.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            date,
            holdings: tickers
                .iter()
                .zip(weights)
                .map(|(ticker, &weight)| Holding {
                    ticker: ticker.clone(),
                    weight,
                })
                .collect(),
        })
    }

    /// Sum of weights (1.0 for a fully invested portfolio).
    pub fn total_weight(&self) -> f64 {
        self.holdings.iter().map(|h| h.weight).sum()
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn json<T: Serialize + ?Sized>(value: &T, format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(value)?),
        _ => Ok(serde_json::to_string(value)?),
    }
}

fn csv_records<R: Serialize>(records: impl IntoIterator<Item = R>) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

#[derive(Debug, Serialize)]
struct SeriesPoint<'a> {
    series: &'a str,
    date: NaiveDate,
    value: f64,
}

fn series_points(series: &ChartSeries) -> impl Iterator<Item = SeriesPoint<'_>> {
    series
        .dates
        .iter()
        .zip(&series.values)
        .map(move |(&date, &value)| SeriesPoint {
            series: &series.name,
            date,
            value,
        })
}

impl Exporter for ChartSeries {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_records(series_points(self)),
            _ => json(self, format),
        }
    }
}

impl Exporter for [ChartSeries] {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_records(self.iter().flat_map(series_points)),
            _ => json(self, format),
        }
    }
}

impl Exporter for HeatmapData {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_records(self.cells()),
            _ => json(self, format),
        }
    }
}

#[derive(Debug, Serialize)]
struct MetricRecord {
    metric: &'static str,
    value: f64,
}

impl Exporter for PerformanceReport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let m = &self.metrics;
                csv_records([
                    ("cumulative_return", m.cumulative_return),
                    ("annualized_return", m.annualized_return),
                    ("annualized_volatility", m.annualized_volatility),
                    ("volatility", m.volatility),
                    ("sharpe_ratio", m.sharpe_ratio),
                    ("max_drawdown", m.max_drawdown),
                    ("risk_free_rate", self.risk_free_rate),
                ]
                .map(|(metric, value)| MetricRecord { metric, value }))
            }
            _ => json(self, format),
        }
    }
}

impl Exporter for AllocationExport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut output = String::new();

                // Header information as comments
                output.push_str(&format!("# Portfolio: {}\n", self.name));
                if let Some(date) = self.date {
                    output.push_str(&format!("# Date: {date}\n"));
                }
                output.push_str(&format!("# Total Weight: {}\n", self.total_weight()));

                output.push_str(&csv_records(&self.holdings)?);
                Ok(output)
            }
            _ => json(self, format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::cumulative_growth;
    use folio_risk::PerformanceMetrics;
    use ndarray::array;
    use std::io::Read;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn series(name: &str) -> ChartSeries {
        ChartSeries::new(name, vec![day(2), day(3)], vec![1.01, 0.99]).unwrap()
    }

    #[test]
    fn test_chart_series_csv() {
        let csv = series("Portfolio").export_to_string(ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "series,date,value");
        assert_eq!(lines[1], "Portfolio,2024-01-02,1.01");
        assert_eq!(lines[2], "Portfolio,2024-01-03,0.99");
    }

    #[test]
    fn test_chart_series_json() {
        let json = series("Portfolio").export_to_string(ExportFormat::Json).unwrap();
        assert!(json.contains("\"name\":\"Portfolio\""));
        assert!(json.contains("\"2024-01-02\""));

        let pretty = series("Portfolio")
            .export_to_string(ExportFormat::PrettyJson)
            .unwrap();
        assert!(pretty.contains("  ")); // Indentation indicates pretty format
    }

    #[test]
    fn test_multiple_series_csv() {
        let all = vec![series("A"), series("B")];
        let csv = all.export_to_string(ExportFormat::Csv).unwrap();
        // One header and two points per series
        assert_eq!(csv.lines().count(), 5);
        assert!(csv.contains("A,2024-01-03"));
        assert!(csv.contains("B,2024-01-02"));
    }

    #[test]
    fn test_heatmap_csv() {
        let labels = vec!["A".to_string(), "B".to_string()];
        let heatmap = HeatmapData::new(&labels, array![[1.0, -0.5], [-0.5, 1.0]].view()).unwrap();
        let csv = heatmap.export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.starts_with("row,column,value\n"));
        assert!(csv.contains("A,B,-0.5"));
        assert_eq!(csv.lines().count(), 5);
    }

    #[test]
    fn test_report_csv() {
        let metrics = PerformanceMetrics {
            cumulative_return: 0.1,
            annualized_return: 0.2,
            annualized_volatility: 0.15,
            volatility: 0.01,
            sharpe_ratio: 0.93,
            max_drawdown: 0.05,
        };
        let report = PerformanceReport::new("P", metrics, 0.06);
        let csv = report.export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.starts_with("metric,value\n"));
        assert!(csv.contains("sharpe_ratio,0.93"));
        assert!(csv.contains("risk_free_rate,0.06"));
        assert_eq!(csv.lines().count(), 8);
    }

    #[test]
    fn test_allocation_csv() {
        let tickers = vec!["AAPL".to_string(), "MSFT".to_string()];
        let allocation =
            AllocationExport::new("Tech", Some(day(5)), &tickers, &[0.25, 0.75]).unwrap();

        let csv = allocation.export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.contains("# Portfolio: Tech"));
        assert!(csv.contains("# Date: 2024-01-05"));
        assert!(csv.contains("# Total Weight: 1"));
        assert!(csv.contains("ticker,weight"));
        assert!(csv.contains("MSFT,0.75"));
    }

    #[test]
    fn test_allocation_length_mismatch() {
        let tickers = vec!["AAPL".to_string()];
        assert!(matches!(
            AllocationExport::new("Tech", None, &tickers, &[0.5, 0.5]),
            Err(ExportError::LengthMismatch {
                tickers: 1,
                weights: 2
            })
        ));
    }

    #[test]
    fn test_export_to_file() {
        let returns = array![0.01, -0.02, 0.03];
        let growth = cumulative_growth("P", &[day(2), day(3), day(4)], returns.view()).unwrap();

        let path = std::env::temp_dir().join("folio_output_export_test.csv");
        growth.export_to_file(&path, ExportFormat::Csv).unwrap();

        let mut content = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert!(content.starts_with("series,date,value"));
        assert_eq!(content.lines().count(), 4);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!(
            "pretty-json".parse::<ExportFormat>().unwrap(),
            ExportFormat::PrettyJson
        );
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(ExportError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_export_format_extension() {
        assert_eq!(ExportFormat::Csv.extension(), "csv");
        assert_eq!(ExportFormat::Json.extension(), "json");
        assert_eq!(ExportFormat::PrettyJson.extension(), "json");
    }
}
