//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for cashout.
#[derive(Debug, thiserror::Error)]
pub enum CashoutError {
    #[error("price series is empty")]
    EmptySeries,

    #[error("price series is not strictly ascending at observation {index}")]
    UnorderedSeries { index: usize },

    #[error("invalid price {value} on {date}: prices must be finite and positive")]
    InvalidPrice { date: NaiveDate, value: f64 },

    #[error("invalid parameter space axis {axis}: {reason}")]
    InvalidParameterSpace { axis: String, reason: String },

    #[error("invalid parameter {field}: {reason}")]
    InvalidParameters { field: String, reason: String },

    #[error("optimization produced no results")]
    NoResults,

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data load error: {reason}")]
    DataLoad { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&CashoutError> for std::process::ExitCode {
    fn from(err: &CashoutError) -> Self {
        let code: u8 = match err {
            CashoutError::Io(_) | CashoutError::Report { .. } => 1,
            CashoutError::ConfigParse { .. }
            | CashoutError::ConfigMissing { .. }
            | CashoutError::ConfigInvalid { .. } => 2,
            CashoutError::EmptySeries
            | CashoutError::UnorderedSeries { .. }
            | CashoutError::InvalidPrice { .. }
            | CashoutError::DataLoad { .. } => 3,
            CashoutError::InvalidParameterSpace { .. } | CashoutError::InvalidParameters { .. } => {
                4
            }
            CashoutError::NoResults => 5,
        };
        std::process::ExitCode::from(code)
    }
}
