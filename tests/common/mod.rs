#![allow(dead_code)]

use cashout::domain::error::CashoutError;
use cashout::domain::holdout::Holdout;
use cashout::domain::parameters::SimulationParameters;
pub use cashout::domain::price_series::{PriceObservation, PriceSeries};
use cashout::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::cell::Cell;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One observation per calendar day starting at 2024-01-01.
pub fn daily_series(values: &[f64]) -> PriceSeries {
    let start = date(2024, 1, 1);
    PriceSeries::new(
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| PriceObservation::new(start + chrono::Days::new(i as u64), v))
            .collect(),
    )
    .unwrap()
}

pub fn params(
    daily_earnings: f64,
    minimum_cashout: f64,
    max_holdout: Holdout,
    upper: f64,
    lower: f64,
) -> SimulationParameters {
    SimulationParameters {
        daily_earnings,
        minimum_cashout,
        max_holdout,
        upper_cashout_boundary: upper,
        lower_cashout_boundary: lower,
    }
}

pub struct MockPricePort {
    pub observations: Vec<PriceObservation>,
    pub error: Option<String>,
    pub last_start: Cell<Option<NaiveDate>>,
}

impl MockPricePort {
    pub fn new(observations: Vec<PriceObservation>) -> Self {
        Self {
            observations,
            error: None,
            last_start: Cell::new(None),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            observations: Vec::new(),
            error: Some(reason.to_string()),
            last_start: Cell::new(None),
        }
    }
}

impl PricePort for MockPricePort {
    fn fetch_prices(&self, start_date: Option<NaiveDate>) -> Result<PriceSeries, CashoutError> {
        self.last_start.set(start_date);
        if let Some(reason) = &self.error {
            return Err(CashoutError::DataLoad {
                reason: reason.clone(),
            });
        }
        let observations = self
            .observations
            .iter()
            .filter(|o| start_date.is_none_or(|s| o.date >= s))
            .copied()
            .collect();
        PriceSeries::new(observations)
    }
}
