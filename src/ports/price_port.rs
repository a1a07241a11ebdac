//! Price data access port trait.

use crate::domain::error::CashoutError;
use crate::domain::price_series::PriceSeries;
use chrono::NaiveDate;

pub trait PricePort {
    /// Load the series, keeping only observations on or after `start_date`.
    fn fetch_prices(&self, start_date: Option<NaiveDate>) -> Result<PriceSeries, CashoutError>;
}
