//! Cartesian parameter grid over the five strategy axes.
//!
//! Points are enumerated lexicographically in declared axis order
//! (`daily_earnings`, `minimum_cashout`, `max_holdout`,
//! `upper_cashout_boundary`, `lower_cashout_boundary`), the last axis varying
//! fastest. Any point can be decoded directly from its index, so the grid is
//! never materialized.

use crate::domain::error::CashoutError;
use crate::domain::holdout::Holdout;
use crate::domain::parameters::SimulationParameters;

pub const AXIS_NAMES: [&str; 5] = [
    "daily_earnings",
    "minimum_cashout",
    "max_holdout",
    "upper_cashout_boundary",
    "lower_cashout_boundary",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpace {
    daily_earnings: Vec<f64>,
    minimum_cashout: Vec<f64>,
    max_holdout: Vec<Holdout>,
    upper_cashout_boundary: Vec<f64>,
    lower_cashout_boundary: Vec<f64>,
    len: usize,
}

impl ParameterSpace {
    pub fn new(
        daily_earnings: Vec<f64>,
        minimum_cashout: Vec<f64>,
        max_holdout: Vec<Holdout>,
        upper_cashout_boundary: Vec<f64>,
        lower_cashout_boundary: Vec<f64>,
    ) -> Result<Self, CashoutError> {
        validate_numeric_axis(AXIS_NAMES[0], &daily_earnings)?;
        validate_numeric_axis(AXIS_NAMES[1], &minimum_cashout)?;
        if max_holdout.is_empty() {
            return Err(empty_axis(AXIS_NAMES[2]));
        }
        validate_numeric_axis(AXIS_NAMES[3], &upper_cashout_boundary)?;
        validate_numeric_axis(AXIS_NAMES[4], &lower_cashout_boundary)?;

        let len = [
            daily_earnings.len(),
            minimum_cashout.len(),
            max_holdout.len(),
            upper_cashout_boundary.len(),
            lower_cashout_boundary.len(),
        ]
        .into_iter()
        .try_fold(1usize, |acc, n| acc.checked_mul(n))
        .ok_or_else(|| CashoutError::InvalidParameterSpace {
            axis: "*".to_string(),
            reason: "number of combinations overflows".to_string(),
        })?;

        Ok(ParameterSpace {
            daily_earnings,
            minimum_cashout,
            max_holdout,
            upper_cashout_boundary,
            lower_cashout_boundary,
            len,
        })
    }

    /// A one-point space.
    pub fn single(params: SimulationParameters) -> Result<Self, CashoutError> {
        Self::new(
            vec![params.daily_earnings],
            vec![params.minimum_cashout],
            vec![params.max_holdout],
            vec![params.upper_cashout_boundary],
            vec![params.lower_cashout_boundary],
        )
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn axis_lengths(&self) -> [usize; 5] {
        [
            self.daily_earnings.len(),
            self.minimum_cashout.len(),
            self.max_holdout.len(),
            self.upper_cashout_boundary.len(),
            self.lower_cashout_boundary.len(),
        ]
    }

    pub fn daily_earnings(&self) -> &[f64] {
        &self.daily_earnings
    }

    pub fn minimum_cashout(&self) -> &[f64] {
        &self.minimum_cashout
    }

    pub fn max_holdout(&self) -> &[Holdout] {
        &self.max_holdout
    }

    pub fn upper_cashout_boundary(&self) -> &[f64] {
        &self.upper_cashout_boundary
    }

    pub fn lower_cashout_boundary(&self) -> &[f64] {
        &self.lower_cashout_boundary
    }

    /// Decode the `index`-th point of the grid.
    pub fn point(&self, index: usize) -> Option<SimulationParameters> {
        if index >= self.len {
            return None;
        }

        let lengths = self.axis_lengths();
        let mut digits = [0usize; 5];
        let mut rem = index;
        for axis in (0..5).rev() {
            digits[axis] = rem % lengths[axis];
            rem /= lengths[axis];
        }

        Some(SimulationParameters {
            daily_earnings: self.daily_earnings[digits[0]],
            minimum_cashout: self.minimum_cashout[digits[1]],
            max_holdout: self.max_holdout[digits[2]],
            upper_cashout_boundary: self.upper_cashout_boundary[digits[3]],
            lower_cashout_boundary: self.lower_cashout_boundary[digits[4]],
        })
    }

    pub fn iter(&self) -> ParameterSpaceIter<'_> {
        ParameterSpaceIter {
            space: self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &'a ParameterSpace {
    type Item = SimulationParameters;
    type IntoIter = ParameterSpaceIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ParameterSpaceIter<'a> {
    space: &'a ParameterSpace,
    next: usize,
}

impl Iterator for ParameterSpaceIter<'_> {
    type Item = SimulationParameters;

    fn next(&mut self) -> Option<Self::Item> {
        let point = self.space.point(self.next)?;
        self.next += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.space.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ParameterSpaceIter<'_> {}

/// Upper bound on the number of values a single range axis may expand to.
pub const MAX_AXIS_LEN: usize = 1_000_000;

/// Inclusive numeric axis `start, start + step, ..., <= stop`.
///
/// Each value is computed from its index, so long axes do not drift.
pub fn axis_range(start: f64, stop: f64, step: f64) -> Result<Vec<f64>, CashoutError> {
    let invalid = |reason: &str| CashoutError::InvalidParameterSpace {
        axis: format!("{start}..{stop} step {step}"),
        reason: reason.to_string(),
    };

    if !start.is_finite() || !stop.is_finite() || !step.is_finite() {
        return Err(invalid("range bounds and step must be finite"));
    }
    if step <= 0.0 {
        return Err(invalid("step must be positive"));
    }
    if stop < start {
        return Err(invalid("stop must not be below start"));
    }

    // Tolerate representation error so 0.0..0.5 step 0.01 keeps its endpoint.
    let steps = ((stop - start) / step + 1e-9).floor();
    if !steps.is_finite() || steps >= MAX_AXIS_LEN as f64 {
        return Err(invalid(&format!(
            "range would produce more than {MAX_AXIS_LEN} values"
        )));
    }
    let steps = steps as usize;
    Ok((0..=steps).map(|i| start + step * i as f64).collect())
}

fn empty_axis(axis: &str) -> CashoutError {
    CashoutError::InvalidParameterSpace {
        axis: axis.to_string(),
        reason: "axis has no values".to_string(),
    }
}

fn validate_numeric_axis(axis: &str, values: &[f64]) -> Result<(), CashoutError> {
    if values.is_empty() {
        return Err(empty_axis(axis));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(CashoutError::InvalidParameterSpace {
            axis: axis.to_string(),
            reason: format!("value {bad} must be finite and non-negative"),
        });
    }
    Ok(())
}
