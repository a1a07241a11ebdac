//! Price observations and the validated, date-ordered series built from them.

use crate::domain::error::CashoutError;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub value: f64,
}

impl PriceObservation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Non-empty sequence of observations with strictly ascending, unique dates
/// and finite positive values.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    observations: Vec<PriceObservation>,
}

impl PriceSeries {
    pub fn new(observations: Vec<PriceObservation>) -> Result<Self, CashoutError> {
        if observations.is_empty() {
            return Err(CashoutError::EmptySeries);
        }

        for obs in &observations {
            if !obs.value.is_finite() || obs.value <= 0.0 {
                return Err(CashoutError::InvalidPrice {
                    date: obs.date,
                    value: obs.value,
                });
            }
        }

        if let Some(pos) = observations.windows(2).position(|w| w[0].date >= w[1].date) {
            return Err(CashoutError::UnorderedSeries { index: pos + 1 });
        }

        Ok(Self { observations })
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first(&self) -> Option<&PriceObservation> {
        self.observations.first()
    }

    pub fn last(&self) -> Option<&PriceObservation> {
        self.observations.last()
    }

    pub fn observations(&self) -> &[PriceObservation] {
        &self.observations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PriceObservation> {
        self.observations.iter()
    }

    /// (min, max) over all values.
    pub fn value_range(&self) -> (f64, f64) {
        self.observations
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), o| {
                (lo.min(o.value), hi.max(o.value))
            })
    }
}

impl<'a> IntoIterator for &'a PriceSeries {
    type Item = &'a PriceObservation;
    type IntoIter = std::slice::Iter<'a, PriceObservation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(date: &str, value: f64) -> PriceObservation {
        PriceObservation::new(NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(), value)
    }

    #[test]
    fn accepts_ascending_series() {
        let series = PriceSeries::new(vec![
            obs("2024-01-01", 100.0),
            obs("2024-01-02", 101.0),
            obs("2024-01-05", 99.0),
        ])
        .unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.first().unwrap().value, 100.0);
        assert_eq!(series.last().unwrap().value, 99.0);
        assert_eq!(series.value_range(), (99.0, 101.0));
    }

    #[test]
    fn rejects_empty_series() {
        assert!(matches!(
            PriceSeries::new(vec![]),
            Err(CashoutError::EmptySeries)
        ));
    }

    #[test]
    fn rejects_duplicate_dates() {
        let result = PriceSeries::new(vec![
            obs("2024-01-01", 100.0),
            obs("2024-01-02", 101.0),
            obs("2024-01-02", 102.0),
        ]);
        assert!(matches!(
            result,
            Err(CashoutError::UnorderedSeries { index: 2 })
        ));
    }

    #[test]
    fn rejects_descending_dates() {
        let result = PriceSeries::new(vec![obs("2024-01-02", 100.0), obs("2024-01-01", 101.0)]);
        assert!(matches!(
            result,
            Err(CashoutError::UnorderedSeries { index: 1 })
        ));
    }

    #[test]
    fn rejects_non_positive_and_non_finite_prices() {
        assert!(matches!(
            PriceSeries::new(vec![obs("2024-01-01", 0.0)]),
            Err(CashoutError::InvalidPrice { .. })
        ));
        assert!(matches!(
            PriceSeries::new(vec![obs("2024-01-01", -5.0)]),
            Err(CashoutError::InvalidPrice { .. })
        ));
        assert!(matches!(
            PriceSeries::new(vec![obs("2024-01-01", f64::NAN)]),
            Err(CashoutError::InvalidPrice { .. })
        ));
    }
}
