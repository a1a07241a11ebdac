//! Report generation port trait.

use std::path::Path;

use crate::domain::error::CashoutError;
use crate::domain::optimizer::OptimizationResult;
use crate::domain::price_series::PriceSeries;

/// Port for writing optimization reports.
pub trait ReportPort {
    fn write(
        &self,
        series: &PriceSeries,
        result: &OptimizationResult,
        output_path: &Path,
    ) -> Result<(), CashoutError>;

    /// File name used when the caller only supplies a directory.
    fn default_file_name(&self) -> &'static str;
}
