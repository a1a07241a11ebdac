//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::csv_results_adapter::CsvResultsAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::svg_chart_adapter::SvgChartAdapter;
use crate::domain::config::{OptimizationConfig, build_config};
use crate::domain::error::CashoutError;
use crate::domain::optimizer::{Execution, OptimizationResult, Optimizer, RankedResult};
use crate::domain::parameters::SimulationParameters;
use crate::domain::price_series::PriceSeries;
use crate::domain::simulation::{EventKind, SimulationResult};
use crate::ports::price_port::PricePort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "cashout", about = "Earnings cash-out backtester and grid optimizer")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the parameter grid and rank every point by total cash-out
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        top: Option<usize>,
        #[arg(long)]
        sequential: bool,
    },
    /// Simulate the first grid point and print its cash-out events
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        upper: Option<f64>,
        #[arg(long)]
        lower: Option<f64>,
    },
    /// Validate a configuration file without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Optimize {
            config,
            output,
            top,
            sequential,
        } => run_optimize(&config, output.as_ref(), top, sequential),
        Command::Simulate {
            config,
            upper,
            lower,
        } => run_simulate(&config, upper, lower),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = CashoutError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Loads and validates the config file, resolving a relative data path
/// against the config file's directory.
pub fn load_optimization_config(path: &PathBuf) -> Result<OptimizationConfig, ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;

    let mut config = build_config(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    config.data.path = resolve_relative(path, &config.data.path);
    Ok(config)
}

pub fn resolve_relative(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match config_path.parent() {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    }
}

fn price_adapter(config: &OptimizationConfig) -> CsvPriceAdapter {
    CsvPriceAdapter::new(config.data.path.clone())
        .with_columns(&config.data.date_column, &config.data.value_column)
}

fn load_prices(
    prices: &dyn PricePort,
    config: &OptimizationConfig,
) -> Result<PriceSeries, ExitCode> {
    let series = prices.fetch_prices(config.data.start_date).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    if let (Some(first), Some(last)) = (series.first(), series.last()) {
        eprintln!(
            "  Loaded {} observations, {} to {}",
            series.len(),
            first.date,
            last.date
        );
    }
    Ok(series)
}

fn run_optimize(
    config_path: &PathBuf,
    output_override: Option<&PathBuf>,
    top_override: Option<usize>,
    sequential: bool,
) -> ExitCode {
    // Stage 1: Load and validate config
    let mut config = match load_optimization_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    // Stage 2: Apply command-line overrides
    if let Some(output) = output_override {
        config.output_dir = output.clone();
    }
    if let Some(top) = top_override {
        config.optimizer.top = top.max(1);
    }
    if sequential {
        config.optimizer.execution = Execution::Sequential;
    }

    // Stages 3-6: Data port dependent pipeline
    eprintln!("Loading prices from {}", config.data.path.display());
    let prices = price_adapter(&config);
    run_optimize_pipeline(&prices, &config)
}

pub fn run_optimize_pipeline(prices: &dyn PricePort, config: &OptimizationConfig) -> ExitCode {
    // Stage 3: Load price series
    let series = match load_prices(prices, config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    // Stage 4: Search the grid
    let total = config.space.len();
    eprintln!(
        "Optimizing: {} grid points ({})",
        total,
        match config.optimizer.execution {
            Execution::Parallel => "parallel",
            Execution::Sequential => "sequential",
        }
    );
    let step = (total / 10).max(1);
    let optimizer = Optimizer::new(config.simulator)
        .with_execution(config.optimizer.execution)
        .with_policy(config.optimizer.invalid_points)
        .with_progress(move |done, total| {
            if done % step == 0 || done == total {
                eprintln!("  Evaluated {done}/{total}");
            }
        });

    let result = match optimizer.optimize(&series, &config.space) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if !result.skipped.is_empty() {
        eprintln!("warning: {} grid points skipped", result.skipped.len());
    }
    if result.best().is_none() {
        let err = CashoutError::NoResults;
        eprintln!("error: {err}");
        return (&err).into();
    }

    // Stage 5: Print console summary
    print!("{}", format_results_table(result.top(config.optimizer.top)));

    // Stage 6: Write reports
    match write_reports(&series, &result, &config.output_dir) {
        Ok(()) => {
            eprintln!("\nReports written to: {}", config.output_dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn write_reports(
    series: &PriceSeries,
    result: &OptimizationResult,
    output_dir: &Path,
) -> Result<(), CashoutError> {
    fs::create_dir_all(output_dir)?;
    let reports: [&dyn ReportPort; 2] = [&CsvResultsAdapter, &SvgChartAdapter];
    for report in reports {
        let path = output_dir.join(report.default_file_name());
        report.write(series, result, &path)?;
        tracing::info!(path = %path.display(), "report written");
    }
    Ok(())
}

pub fn format_results_table(ranked: &[RankedResult]) -> String {
    let mut out = format!(
        "{:>4}  {:>6}  {:>10}  {:>10}  {:>7}  {:>6}  {:>6}  {:>14}  {:>7}  {:>5}\n",
        "rank", "index", "daily", "minimum", "holdout", "upper", "lower", "total", "profits", "losses"
    );
    for (i, r) in ranked.iter().enumerate() {
        let p = &r.result.parameters;
        out.push_str(&format!(
            "{:>4}  {:>6}  {:>10.2}  {:>10.2}  {:>7}  {:>6.2}  {:>6.2}  {:>14.2}  {:>7}  {:>5}\n",
            i + 1,
            r.index,
            p.daily_earnings,
            p.minimum_cashout,
            p.max_holdout.to_string(),
            p.upper_cashout_boundary,
            p.lower_cashout_boundary,
            r.result.total_cashout,
            r.result.profit_events.len(),
            r.result.loss_events.len(),
        ));
    }
    out
}

/// The first grid point with the boundary overrides applied.
pub fn simulation_point(
    config: &OptimizationConfig,
    upper: Option<f64>,
    lower: Option<f64>,
) -> Result<SimulationParameters, CashoutError> {
    let mut params = config.space.point(0).ok_or(CashoutError::NoResults)?;
    if let Some(upper) = upper {
        params.upper_cashout_boundary = upper;
    }
    if let Some(lower) = lower {
        params.lower_cashout_boundary = lower;
    }
    params.validate()?;
    Ok(params)
}

pub fn format_simulation(result: &SimulationResult) -> String {
    let mut out = String::new();
    for event in result.events_in_order() {
        let kind = match event.kind {
            EventKind::Profit => "profit",
            EventKind::Loss => "loss",
        };
        out.push_str(&format!(
            "{}  {:<6}  {:<14}  price {:>12.2}  earnings {:>10.2}  amount {:>12.2}\n",
            event.date,
            kind,
            format!("{:?}", event.trigger),
            event.price,
            event.earnings,
            event.amount,
        ));
    }
    let s = &result.settlement;
    out.push_str(&format!(
        "{}  settle  {:<14}  price {:>12.2}  earnings {:>10.2}  amount {:>12.2}\n",
        s.date, "", s.price, s.earnings, s.amount
    ));
    out.push_str(&format!("total cash-out: {:.2}\n", result.total_cashout));
    out
}

fn run_simulate(config_path: &PathBuf, upper: Option<f64>, lower: Option<f64>) -> ExitCode {
    let config = match load_optimization_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let params = match simulation_point(&config, upper, lower) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Loading prices from {}", config.data.path.display());
    let series = match load_prices(&price_adapter(&config), &config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    eprintln!(
        "Simulating: upper {} lower {} holdout {}",
        params.upper_cashout_boundary, params.lower_cashout_boundary, params.max_holdout
    );
    match config.simulator.simulate(&series, &params) {
        Ok(result) => {
            print!("{}", format_simulation(&result));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let config = match load_optimization_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let [daily, minimum, holdout, upper, lower] = config.space.axis_lengths();
    eprintln!("\nData:       {}", config.data.path.display());
    eprintln!(
        "Columns:    {} / {}",
        config.data.date_column, config.data.value_column
    );
    if let Some(start) = config.data.start_date {
        eprintln!("Start date: {start}");
    }
    eprintln!(
        "Grid:       {daily} x {minimum} x {holdout} x {upper} x {lower} = {} points",
        config.space.len()
    );
    eprintln!("Unit scale: {}", config.simulator.unit_scale());
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::holdout::Holdout;
    use crate::domain::optimizer::Optimizer;
    use crate::domain::parameter_space::ParameterSpace;
    use crate::domain::price_series::PriceObservation;
    use crate::domain::simulation::CashoutSimulator;
    use chrono::NaiveDate;

    #[test]
    fn cli_parses_optimize_with_overrides() {
        let cli = Cli::parse_from([
            "cashout",
            "-vv",
            "optimize",
            "-c",
            "run.ini",
            "-o",
            "reports",
            "--top",
            "3",
            "--sequential",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Optimize {
                config,
                output,
                top,
                sequential,
            } => {
                assert_eq!(config, PathBuf::from("run.ini"));
                assert_eq!(output, Some(PathBuf::from("reports")));
                assert_eq!(top, Some(3));
                assert!(sequential);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parses_simulate_boundaries() {
        let cli = Cli::parse_from([
            "cashout", "simulate", "-c", "run.ini", "--upper", "0.2", "--lower", "0.05",
        ]);
        match cli.command {
            Command::Simulate { upper, lower, .. } => {
                assert_eq!(upper, Some(0.2));
                assert_eq!(lower, Some(0.05));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        assert_eq!(
            resolve_relative(Path::new("/etc/cashout/run.ini"), Path::new("data/btc.csv")),
            PathBuf::from("/etc/cashout/data/btc.csv")
        );
        assert_eq!(
            resolve_relative(Path::new("/etc/cashout/run.ini"), Path::new("/data/btc.csv")),
            PathBuf::from("/data/btc.csv")
        );
    }

    #[test]
    fn results_table_has_one_line_per_result() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = PriceSeries::new(
            [100.0, 120.0, 90.0]
                .iter()
                .enumerate()
                .map(|(i, &v)| PriceObservation::new(start + chrono::Days::new(i as u64), v))
                .collect(),
        )
        .unwrap();
        let space = ParameterSpace::new(
            vec![10.0],
            vec![10.0],
            vec![Holdout::Days(1)],
            vec![0.1, 0.2],
            vec![0.1],
        )
        .unwrap();
        let result = Optimizer::new(CashoutSimulator::new(1.0).unwrap())
            .optimize(&series, &space)
            .unwrap();

        let table = format_results_table(result.top(10));

        assert_eq!(table.lines().count(), 3);
        assert!(table.lines().next().unwrap().contains("total"));
        assert!(table.contains("1d"));
    }

    #[test]
    fn simulation_output_ends_with_total() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = PriceSeries::new(vec![
            PriceObservation::new(start, 100.0),
            PriceObservation::new(start + chrono::Days::new(1), 100.0),
        ])
        .unwrap();
        let params = SimulationParameters {
            daily_earnings: 10.0,
            minimum_cashout: 100.0,
            max_holdout: Holdout::Days(30),
            upper_cashout_boundary: 0.5,
            lower_cashout_boundary: 0.5,
        };
        let result = CashoutSimulator::new(1.0)
            .unwrap()
            .simulate(&series, &params)
            .unwrap();

        let text = format_simulation(&result);

        assert!(text.contains("settle"));
        assert!(text.trim_end().ends_with("total cash-out: 2000.00"));
    }
}
