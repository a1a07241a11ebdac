//! Calendar durations for the maximum holdout window.

use chrono::{Days, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Holdout {
    Days(u32),
    Weeks(u32),
    Months(u32),
    Years(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HoldoutParseError {
    #[error("empty holdout")]
    Empty,

    #[error("invalid holdout amount in {0:?}")]
    InvalidAmount(String),

    #[error("unknown holdout unit in {0:?} (expected d, w, m or y)")]
    UnknownUnit(String),
}

impl Holdout {
    /// Calendar-aware addition. Month and year steps clamp to the last day of
    /// a shorter target month. `None` when the result leaves chrono's range.
    pub fn add_to(&self, date: NaiveDate) -> Option<NaiveDate> {
        match *self {
            Holdout::Days(n) => date.checked_add_days(Days::new(u64::from(n))),
            Holdout::Weeks(n) => date.checked_add_days(Days::new(u64::from(n) * 7)),
            Holdout::Months(n) => date.checked_add_months(Months::new(n)),
            Holdout::Years(n) => n
                .checked_mul(12)
                .and_then(|months| date.checked_add_months(Months::new(months))),
        }
    }
}

impl fmt::Display for Holdout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Holdout::Days(n) => write!(f, "{n}d"),
            Holdout::Weeks(n) => write!(f, "{n}w"),
            Holdout::Months(n) => write!(f, "{n}m"),
            Holdout::Years(n) => write!(f, "{n}y"),
        }
    }
}

impl FromStr for Holdout {
    type Err = HoldoutParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let unit = s.chars().last().ok_or(HoldoutParseError::Empty)?;
        let amount: u32 = s[..s.len() - unit.len_utf8()]
            .trim()
            .parse()
            .map_err(|_| HoldoutParseError::InvalidAmount(s.to_string()))?;

        match unit.to_ascii_lowercase() {
            'd' => Ok(Holdout::Days(amount)),
            'w' => Ok(Holdout::Weeks(amount)),
            'm' => Ok(Holdout::Months(amount)),
            'y' => Ok(Holdout::Years(amount)),
            _ => Err(HoldoutParseError::UnknownUnit(s.to_string())),
        }
    }
}
