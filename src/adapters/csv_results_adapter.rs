//! Ranked results table written as CSV.

use serde::Serialize;
use std::path::Path;

use crate::domain::error::CashoutError;
use crate::domain::optimizer::{OptimizationResult, RankedResult};
use crate::domain::price_series::PriceSeries;
use crate::domain::simulation::CashoutEvent;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Serialize)]
struct ResultRow {
    rank: usize,
    grid_index: usize,
    daily_earnings: f64,
    minimum_cashout: f64,
    max_holdout: String,
    upper_cashout_boundary: f64,
    lower_cashout_boundary: f64,
    total_cashout: f64,
    profit_events: usize,
    loss_events: usize,
    profit_dates: String,
    loss_dates: String,
}

impl ResultRow {
    fn new(rank: usize, ranked: &RankedResult) -> Self {
        let r = &ranked.result;
        let p = &r.parameters;
        ResultRow {
            rank,
            grid_index: ranked.index,
            daily_earnings: p.daily_earnings,
            minimum_cashout: p.minimum_cashout,
            max_holdout: p.max_holdout.to_string(),
            upper_cashout_boundary: p.upper_cashout_boundary,
            lower_cashout_boundary: p.lower_cashout_boundary,
            total_cashout: r.total_cashout,
            profit_events: r.profit_events.len(),
            loss_events: r.loss_events.len(),
            profit_dates: join_dates(&r.profit_events),
            loss_dates: join_dates(&r.loss_events),
        }
    }
}

fn join_dates(events: &[CashoutEvent]) -> String {
    events
        .iter()
        .map(|e| e.date.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

pub struct CsvResultsAdapter;

impl ReportPort for CsvResultsAdapter {
    fn write(
        &self,
        _series: &PriceSeries,
        result: &OptimizationResult,
        output_path: &Path,
    ) -> Result<(), CashoutError> {
        let report_err = |e: csv::Error| CashoutError::Report {
            reason: format!("failed to write {}: {}", output_path.display(), e),
        };

        let mut writer = csv::Writer::from_path(output_path).map_err(report_err)?;
        for (i, ranked) in result.ranked.iter().enumerate() {
            writer
                .serialize(ResultRow::new(i + 1, ranked))
                .map_err(report_err)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn default_file_name(&self) -> &'static str {
        "results.csv"
    }
}
