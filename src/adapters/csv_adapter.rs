//! CSV price file adapter.
//!
//! Reads one date column and one price column, selected by header name,
//! drops rows before the start date, sorts ascending and keeps the first row
//! of any repeated date.

use crate::domain::config::{DEFAULT_DATE_COLUMN, DEFAULT_VALUE_COLUMN};
use crate::domain::error::CashoutError;
use crate::domain::price_series::{PriceObservation, PriceSeries};
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::path::PathBuf;

pub struct CsvPriceAdapter {
    path: PathBuf,
    date_column: String,
    value_column: String,
}

impl CsvPriceAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            date_column: DEFAULT_DATE_COLUMN.to_string(),
            value_column: DEFAULT_VALUE_COLUMN.to_string(),
        }
    }

    pub fn with_columns(mut self, date_column: &str, value_column: &str) -> Self {
        self.date_column = date_column.to_string();
        self.value_column = value_column.to_string();
        self
    }

    fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, CashoutError> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| CashoutError::DataLoad {
                reason: format!("missing column {name:?}"),
            })
    }
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let date_part = text.split(['T', ' ']).next().unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

impl PricePort for CsvPriceAdapter {
    fn fetch_prices(&self, start_date: Option<NaiveDate>) -> Result<PriceSeries, CashoutError> {
        let mut rdr = csv::Reader::from_path(&self.path).map_err(|e| CashoutError::DataLoad {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let headers = rdr
            .headers()
            .map_err(|e| CashoutError::DataLoad {
                reason: format!("CSV header error: {}", e),
            })?
            .clone();
        let date_idx = Self::column_index(&headers, &self.date_column)?;
        let value_idx = Self::column_index(&headers, &self.value_column)?;

        let mut observations = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| CashoutError::DataLoad {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(date_idx).unwrap_or_default();
            let date = parse_date(date_str).ok_or_else(|| CashoutError::DataLoad {
                reason: format!("invalid date {:?} on row {}", date_str, row + 1),
            })?;

            if start_date.is_some_and(|start| date < start) {
                continue;
            }

            let value_str = record.get(value_idx).unwrap_or_default();
            let value: f64 = value_str.trim().parse().map_err(|e| CashoutError::DataLoad {
                reason: format!("invalid value {:?} on row {}: {}", value_str, row + 1, e),
            })?;

            observations.push(PriceObservation::new(date, value));
        }

        // Stable, so the first row of a repeated date stays in front.
        observations.sort_by_key(|o| o.date);
        let before = observations.len();
        observations.dedup_by(|later, first| {
            let duplicate = later.date == first.date;
            if duplicate {
                tracing::warn!(date = %later.date, "dropping duplicate price row");
            }
            duplicate
        });

        tracing::info!(
            path = %self.path.display(),
            rows = observations.len(),
            duplicates = before - observations.len(),
            "loaded price series"
        );

        PriceSeries::new(observations)
    }
}
