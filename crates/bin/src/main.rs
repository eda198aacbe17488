//! Folio CLI binary.
//!
//! Fetches daily prices from Yahoo Finance and runs the portfolio analytics
//! from the command line.

mod pipeline;

use clap::{Args, Parser, Subcommand};
use folio::{Portfolio, PortfolioError};
use folio_data::Lookback;
use folio_output::{
    AllocationExport, ChartSeries, DEFAULT_VOLATILITY_WINDOW, ExportError, ExportFormat,
    Exporter, HeatmapData, ReportBuilder, asset_rolling_volatility, cumulative_growth,
    drawdown_curve, normalized_prices, rolling_volatility,
};
use folio_risk::{DEFAULT_RISK_FREE_RATE, OptimizerConfig};
use pipeline::load_portfolio;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "folio")]
#[command(about = "Folio: portfolio performance, correlation and Sharpe optimization", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct PortfolioArgs {
    /// Comma-separated ticker symbols
    #[arg(long, value_delimiter = ',', required = true)]
    tickers: Vec<String>,

    /// Comma-separated weights, one per ticker (default: equal weights)
    #[arg(long, value_delimiter = ',')]
    weights: Option<Vec<f64>>,

    /// History window: 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd or max
    #[arg(long, default_value = "6mo")]
    period: String,

    /// Annual risk-free rate used for the Sharpe ratio
    #[arg(long, default_value_t = DEFAULT_RISK_FREE_RATE)]
    risk_free_rate: f64,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Report performance metrics for a weighted portfolio
    Analyze {
        #[command(flatten)]
        portfolio: PortfolioArgs,

        /// Output format: table, csv, json or pretty-json
        #[arg(long, default_value = "table")]
        format: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Correlation of asset returns, optionally over a rolling window
    Correlation {
        #[command(flatten)]
        portfolio: PortfolioArgs,

        /// Rolling window in trading days (full sample if omitted)
        #[arg(long)]
        window: Option<usize>,

        /// Output format: table, csv, json or pretty-json
        #[arg(long, default_value = "table")]
        format: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Find the long-only weights with the highest Sharpe ratio
    Optimize {
        #[command(flatten)]
        portfolio: PortfolioArgs,

        /// Maximum solver iterations
        #[arg(long, default_value_t = 100)]
        max_iterations: usize,

        /// Output format: table, csv, json or pretty-json
        #[arg(long, default_value = "table")]
        format: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Export chart data: growth, drawdown, rolling volatility and prices
    Export {
        #[command(flatten)]
        portfolio: PortfolioArgs,

        /// Rolling volatility window in trading days
        #[arg(long, default_value_t = DEFAULT_VOLATILITY_WINDOW)]
        window: usize,

        /// Output format: csv, json or pretty-json
        #[arg(long, default_value = "csv")]
        format: String,

        /// Destination file
        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            portfolio,
            format,
            output,
        } => analyze(portfolio, &format, output.as_deref()).await?,
        Commands::Correlation {
            portfolio,
            window,
            format,
            output,
        } => correlation(portfolio, window, &format, output.as_deref()).await?,
        Commands::Optimize {
            portfolio,
            max_iterations,
            format,
            output,
        } => optimize(portfolio, max_iterations, &format, output.as_deref()).await?,
        Commands::Export {
            portfolio,
            window,
            format,
            output,
        } => export(portfolio, window, &format, &output).await?,
    }

    Ok(())
}

/// `None` selects the human-readable table.
fn parse_format(format: &str) -> Result<Option<ExportFormat>, ExportError> {
    if format.trim().eq_ignore_ascii_case("table") {
        return Ok(None);
    }
    format.parse().map(Some)
}

async fn load(args: &PortfolioArgs) -> Result<Portfolio, Box<dyn Error>> {
    let lookback: Lookback = args.period.parse()?;
    Ok(load_portfolio(args.tickers.clone(), args.weights.clone(), lookback).await?)
}

/// Print or write `value` as a table or in an export format.
fn emit<E: Exporter + ?Sized>(
    value: &E,
    format: Option<ExportFormat>,
    output: Option<&Path>,
    table: impl FnOnce() -> String,
) -> Result<(), ExportError> {
    match (format, output) {
        (Some(format), Some(path)) => {
            value.export_to_file(path, format)?;
            println!("Wrote {}", path.display());
        }
        (Some(format), None) => println!("{}", value.export_to_string(format)?),
        (None, Some(path)) => {
            std::fs::write(path, table())?;
            println!("Wrote {}", path.display());
        }
        (None, None) => print!("{}", table()),
    }
    Ok(())
}

fn weights_table(tickers: &[String], columns: &[(&str, &[f64])]) -> String {
    let mut output = String::from("| Ticker |");
    for (name, _) in columns {
        output.push_str(&format!(" {name} |"));
    }
    output.push_str("\n|--------|");
    for (name, _) in columns {
        output.push_str(&format!("{}|", "-".repeat(name.len() + 2)));
    }
    output.push('\n');

    for (row, ticker) in tickers.iter().enumerate() {
        output.push_str(&format!("| {ticker} |"));
        for (_, values) in columns {
            output.push_str(&format!(" {:.2}% |", values[row] * 100.0));
        }
        output.push('\n');
    }
    output
}

fn matrix_table(labels: &[String], values: &[Vec<f64>]) -> String {
    let mut output = String::from("| |");
    for label in labels {
        output.push_str(&format!(" {label} |"));
    }
    output.push_str("\n|---|");
    for _ in labels {
        output.push_str("---|");
    }
    output.push('\n');

    for (label, row) in labels.iter().zip(values) {
        output.push_str(&format!("| {label} |"));
        for value in row {
            output.push_str(&format!(" {value:.4} |"));
        }
        output.push('\n');
    }
    output
}

async fn analyze(
    args: PortfolioArgs,
    format: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let format = parse_format(format)?;
    let portfolio = load(&args).await?;

    let metrics = portfolio.performance(args.risk_free_rate)?;
    let report = ReportBuilder::new()
        .name(portfolio.tickers().join(","))
        .risk_free_rate(args.risk_free_rate)
        .metrics(metrics)
        .build()?;

    emit(&report, format, output, || {
        let weights = portfolio.weights().to_vec();
        format!(
            "{}\n{}",
            weights_table(portfolio.tickers(), &[("Weight", weights.as_slice())]),
            report.to_markdown()
        )
    })?;
    Ok(())
}

async fn correlation(
    args: PortfolioArgs,
    window: Option<usize>,
    format: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let format = parse_format(format)?;
    let portfolio = load(&args).await?;
    let tickers = portfolio.tickers();

    if window.is_none() {
        let matrix = portfolio.correlation()?;
        let heatmap = HeatmapData::new(tickers, matrix.view())?;
        emit(&heatmap, format, output, || {
            matrix_table(&heatmap.labels, &heatmap.values)
        })?;
        return Ok(());
    }

    let rolling = portfolio.rolling_correlation(window)?;
    let dates: Vec<_> = rolling.iter().map(|r| r.date).collect();

    // One line per asset pair
    let mut pairs = Vec::new();
    for i in 0..tickers.len() {
        for j in (i + 1)..tickers.len() {
            let values = rolling.iter().map(|r| r.matrix[[i, j]]).collect();
            pairs.push(ChartSeries::new(
                format!("{}/{}", tickers[i], tickers[j]),
                dates.clone(),
                values,
            )?);
        }
    }

    let latest = rolling
        .last()
        .map(|r| HeatmapData::new(tickers, r.matrix.view()).map(|h| (r.date, h)))
        .transpose()?;
    emit(pairs.as_slice(), format, output, || match latest {
        Some((date, heatmap)) => format!(
            "{} rolling windows; latest ending {date}\n\n{}",
            rolling.len(),
            matrix_table(&heatmap.labels, &heatmap.values)
        ),
        None => "Not enough data for a single full window\n".to_string(),
    })?;
    Ok(())
}

async fn optimize(
    args: PortfolioArgs,
    max_iterations: usize,
    format: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let format = parse_format(format)?;
    let mut portfolio = load(&args).await?;

    let before = portfolio.weights().to_vec();
    let before_sharpe = portfolio.performance(args.risk_free_rate)?.sharpe_ratio;

    let config = OptimizerConfig {
        max_iterations,
        risk_free_rate: args.risk_free_rate,
        ..OptimizerConfig::default()
    };
    let result = portfolio.optimize(&config)?;

    // Returns were derived from the old weights
    let last_date = portfolio
        .compute_returns()?
        .dates()
        .last()
        .copied();
    let after = portfolio.weights().to_vec();
    let after_sharpe = portfolio.performance(args.risk_free_rate)?.sharpe_ratio;

    let allocation = AllocationExport::new("Optimized", last_date, portfolio.tickers(), &after)?;
    emit(&allocation, format, output, || {
        format!(
            "{}\nSharpe ratio: {before_sharpe:.4} -> {after_sharpe:.4} ({} iterations)\n",
            weights_table(
                portfolio.tickers(),
                &[("Before", before.as_slice()), ("Optimized", after.as_slice())]
            ),
            result.iterations
        )
    })?;
    Ok(())
}

async fn export(
    args: PortfolioArgs,
    window: usize,
    format: &str,
    output: &Path,
) -> Result<(), Box<dyn Error>> {
    let format: ExportFormat = format.parse()?;
    let portfolio = load(&args).await?;

    let returns = portfolio
        .returns()
        .ok_or_else(|| PortfolioError::DataNotLoaded("returns not computed".to_string()))?;
    let prices = portfolio
        .prices()
        .ok_or_else(|| PortfolioError::DataNotLoaded("no cleaned prices".to_string()))?;
    let dates = returns.dates();
    let portfolio_returns = returns.portfolio_returns();

    let mut charts = vec![
        cumulative_growth("growth", dates, portfolio_returns)?,
        drawdown_curve("drawdown", dates, portfolio_returns)?,
        rolling_volatility("volatility:portfolio", dates, portfolio_returns, window)?,
    ];
    for mut series in asset_rolling_volatility(returns.tickers(), dates, returns.asset_returns(), window)? {
        series.name = format!("volatility:{}", series.name);
        charts.push(series);
    }
    for mut series in normalized_prices(prices.tickers(), prices.dates(), prices.values())? {
        series.name = format!("price:{}", series.name);
        charts.push(series);
    }

    charts.export_to_file(output, format)?;
    let points: usize = charts.iter().map(ChartSeries::len).sum();
    println!(
        "Wrote {} series ({points} points) to {}",
        charts.len(),
        output.display()
    );
    Ok(())
}
