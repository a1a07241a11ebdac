//! Typed run configuration built from a [`ConfigPort`].
//!
//! Every key is read and validated up front, before any data is loaded. Axis
//! values in `[parameters]` accept a single value, a comma-separated list, or
//! an inclusive range written `start..stop step s`.

use chrono::NaiveDate;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::error::CashoutError;
use crate::domain::holdout::Holdout;
use crate::domain::optimizer::{Execution, InvalidPointPolicy};
use crate::domain::parameter_space::{ParameterSpace, axis_range};
use crate::domain::simulation::{AccrualTiming, CashoutSimulator, DEFAULT_UNIT_SCALE};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_DATE_COLUMN: &str = "Date";
pub const DEFAULT_VALUE_COLUMN: &str = "24h Low (USD)";
pub const DEFAULT_TOP: usize = 10;
pub const DEFAULT_OUTPUT_DIR: &str = "out";

#[derive(Debug, Clone, PartialEq)]
pub struct DataSourceConfig {
    pub path: PathBuf,
    pub date_column: String,
    pub value_column: String,
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerSettings {
    pub execution: Execution,
    pub invalid_points: InvalidPointPolicy,
    pub top: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationConfig {
    pub data: DataSourceConfig,
    pub space: ParameterSpace,
    pub simulator: CashoutSimulator,
    pub optimizer: OptimizerSettings,
    pub output_dir: PathBuf,
}

pub fn build_config(config: &dyn ConfigPort) -> Result<OptimizationConfig, CashoutError> {
    for section in ["simulation", "optimizer", "report"] {
        if !config.has_section(section) {
            tracing::debug!(section, "config section absent, using defaults");
        }
    }

    Ok(OptimizationConfig {
        data: build_data_source(config)?,
        space: build_parameter_space(config)?,
        simulator: build_simulator(config)?,
        optimizer: build_optimizer_settings(config)?,
        output_dir: config
            .get_string("report", "output_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
    })
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), CashoutError> {
    build_config(config).map(|_| ())
}

pub fn build_data_source(config: &dyn ConfigPort) -> Result<DataSourceConfig, CashoutError> {
    let path = require(config, "data", "path")?;
    let start_date = config
        .get_string("data", "start_date")
        .map(|s| {
            parse_config_date(&s).ok_or_else(|| {
                invalid(
                    "data",
                    "start_date",
                    "invalid date format, expected YYYY-MM-DD or YYYYMMDD",
                )
            })
        })
        .transpose()?;

    Ok(DataSourceConfig {
        path: PathBuf::from(path),
        date_column: config
            .get_string("data", "date_column")
            .unwrap_or_else(|| DEFAULT_DATE_COLUMN.to_string()),
        value_column: config
            .get_string("data", "value_column")
            .unwrap_or_else(|| DEFAULT_VALUE_COLUMN.to_string()),
        start_date,
    })
}

pub fn build_parameter_space(config: &dyn ConfigPort) -> Result<ParameterSpace, CashoutError> {
    let numeric = |key: &str| -> Result<Vec<f64>, CashoutError> {
        let text = require(config, "parameters", key)?;
        parse_numeric_axis(&text).map_err(|reason| invalid("parameters", key, &reason))
    };

    let holdout_text = require(config, "parameters", "max_holdout")?;
    let max_holdout = parse_list::<Holdout>(&holdout_text)
        .map_err(|reason| invalid("parameters", "max_holdout", &reason))?;

    ParameterSpace::new(
        numeric("daily_earnings")?,
        numeric("minimum_cashout")?,
        max_holdout,
        numeric("upper_cashout_boundary")?,
        numeric("lower_cashout_boundary")?,
    )
}

pub fn build_simulator(config: &dyn ConfigPort) -> Result<CashoutSimulator, CashoutError> {
    let unit_scale = optional_parsed::<f64>(config, "simulation", "unit_scale")?
        .unwrap_or(DEFAULT_UNIT_SCALE);
    let simulator = CashoutSimulator::new(unit_scale)
        .map_err(|e| invalid("simulation", "unit_scale", &e.to_string()))?;

    let accrual = match config.get_string("simulation", "accrual").as_deref() {
        None | Some("after_checks") => AccrualTiming::AfterChecks,
        Some("before_checks") => AccrualTiming::BeforeChecks,
        Some(other) => {
            return Err(invalid(
                "simulation",
                "accrual",
                &format!("unknown accrual timing {other:?} (expected after_checks or before_checks)"),
            ));
        }
    };

    Ok(simulator.with_accrual(accrual))
}

pub fn build_optimizer_settings(
    config: &dyn ConfigPort,
) -> Result<OptimizerSettings, CashoutError> {
    let execution = match config.get_string("optimizer", "execution").as_deref() {
        None | Some("parallel") => Execution::Parallel,
        Some("sequential") => Execution::Sequential,
        Some(other) => {
            return Err(invalid(
                "optimizer",
                "execution",
                &format!("unknown execution mode {other:?} (expected parallel or sequential)"),
            ));
        }
    };

    let invalid_points = match config.get_string("optimizer", "invalid_points").as_deref() {
        None | Some("skip") => InvalidPointPolicy::Skip,
        Some("fail_fast") => InvalidPointPolicy::FailFast,
        Some(other) => {
            return Err(invalid(
                "optimizer",
                "invalid_points",
                &format!("unknown policy {other:?} (expected skip or fail_fast)"),
            ));
        }
    };

    let top = optional_parsed::<usize>(config, "optimizer", "top")?.unwrap_or(DEFAULT_TOP);
    if top == 0 {
        return Err(invalid("optimizer", "top", "top must be at least 1"));
    }

    Ok(OptimizerSettings {
        execution,
        invalid_points,
        top,
    })
}

/// Single value, comma-separated list, or `start..stop step s`.
pub fn parse_numeric_axis(text: &str) -> Result<Vec<f64>, String> {
    let Some((start, rest)) = text.split_once("..") else {
        return parse_list::<f64>(text);
    };

    let (stop, step) = rest
        .split_once("step")
        .ok_or_else(|| format!("range {text:?} needs a step, e.g. 0.0..0.5 step 0.01"))?;
    let number = |s: &str| -> Result<f64, String> {
        s.trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid number {:?} in range {text:?}", s.trim()))
    };

    axis_range(number(start)?, number(stop)?, number(step)?).map_err(|e| e.to_string())
}

pub fn parse_list<T>(text: &str) -> Result<Vec<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    text.split(',')
        .map(|token| {
            let token = token.trim();
            if token.is_empty() {
                return Err(format!("empty value in list {text:?}"));
            }
            token
                .parse::<T>()
                .map_err(|e| format!("invalid value {token:?}: {e}"))
        })
        .collect()
}

/// `YYYY-MM-DD`, or the compact `YYYYMMDD` form.
pub fn parse_config_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y%m%d"))
        .ok()
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, CashoutError> {
    config
        .get_string(section, key)
        .ok_or_else(|| CashoutError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

fn optional_parsed<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, CashoutError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    config
        .get_string(section, key)
        .map(|s| {
            s.parse::<T>()
                .map_err(|e| invalid(section, key, &format!("invalid value {s:?}: {e}")))
        })
        .transpose()
}

fn invalid(section: &str, key: &str, reason: &str) -> CashoutError {
    CashoutError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
