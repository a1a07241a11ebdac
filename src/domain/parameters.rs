//! Cash-out strategy parameters.

use crate::domain::error::CashoutError;
use crate::domain::holdout::Holdout;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParameters {
    /// Units accrued per observation.
    pub daily_earnings: f64,
    /// Accrued earnings required before profit-taking is considered.
    pub minimum_cashout: f64,
    pub max_holdout: Holdout,
    /// Fractional gain over the reference value that takes profit.
    pub upper_cashout_boundary: f64,
    /// Fractional drop under the reference value that stops the loss.
    pub lower_cashout_boundary: f64,
}

impl SimulationParameters {
    pub fn validate(&self) -> Result<(), CashoutError> {
        check_non_negative("daily_earnings", self.daily_earnings)?;
        check_non_negative("minimum_cashout", self.minimum_cashout)?;
        check_non_negative("upper_cashout_boundary", self.upper_cashout_boundary)?;
        check_non_negative("lower_cashout_boundary", self.lower_cashout_boundary)?;
        Ok(())
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<(), CashoutError> {
    if !value.is_finite() {
        return Err(CashoutError::InvalidParameters {
            field: field.to_string(),
            reason: format!("{field} must be finite, got {value}"),
        });
    }
    if value < 0.0 {
        return Err(CashoutError::InvalidParameters {
            field: field.to_string(),
            reason: format!("{field} must be non-negative, got {value}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> SimulationParameters {
        SimulationParameters {
            daily_earnings: 50.0,
            minimum_cashout: 300.0,
            max_holdout: Holdout::Months(3),
            upper_cashout_boundary: 0.2,
            lower_cashout_boundary: 0.1,
        }
    }

    #[test]
    fn valid_params_pass() {
        assert!(sample_params().validate().is_ok());
    }

    #[test]
    fn zero_boundaries_are_valid() {
        let p = SimulationParameters {
            upper_cashout_boundary: 0.0,
            lower_cashout_boundary: 0.0,
            minimum_cashout: 0.0,
            ..sample_params()
        };
        assert!(p.validate().is_ok());
    }

    #[test]
    fn negative_field_is_rejected() {
        let p = SimulationParameters {
            lower_cashout_boundary: -0.1,
            ..sample_params()
        };
        match p.validate() {
            Err(CashoutError::InvalidParameters { field, .. }) => {
                assert_eq!(field, "lower_cashout_boundary")
            }
            other => panic!("expected InvalidParameters, got {other:?}"),
        }
    }

    #[test]
    fn non_finite_field_is_rejected() {
        let p = SimulationParameters {
            daily_earnings: f64::INFINITY,
            ..sample_params()
        };
        match p.validate() {
            Err(CashoutError::InvalidParameters { field, reason }) => {
                assert_eq!(field, "daily_earnings");
                assert!(reason.contains("finite"));
            }
            other => panic!("expected InvalidParameters, got {other:?}"),
        }

        let p = SimulationParameters {
            upper_cashout_boundary: f64::NAN,
            ..sample_params()
        };
        assert!(p.validate().is_err());
    }
}
