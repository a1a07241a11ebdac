//! Cash-out simulation state machine.
//!
//! Walks a [`PriceSeries`] once, accruing earnings every observation and
//! converting them to cash when the profit-taking, holdout or stop-loss rule
//! fires. Each call owns its state; nothing is shared between runs.

use chrono::NaiveDate;

use crate::domain::error::CashoutError;
use crate::domain::parameters::SimulationParameters;
use crate::domain::price_series::PriceSeries;

/// Earnings are accrued in micro-units; cash = earnings * price / 1e6.
pub const DEFAULT_UNIT_SCALE: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Profit,
    Loss,
}

/// Which rule fired a cash-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    UpperBoundary,
    Holdout,
    StopLoss,
}

/// When the daily accrual lands relative to the cash-out checks of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccrualTiming {
    /// Checks see the earnings accrued up to the previous observation.
    #[default]
    AfterChecks,
    /// The current observation's earnings are credited before the checks run.
    BeforeChecks,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashoutEvent {
    pub date: NaiveDate,
    pub kind: EventKind,
    pub trigger: Trigger,
    pub price: f64,
    /// Earnings reset by this event.
    pub earnings: f64,
    pub amount: f64,
}

/// Closing conversion of whatever is left at the last observed price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub date: NaiveDate,
    pub price: f64,
    pub earnings: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub parameters: SimulationParameters,
    pub total_cashout: f64,
    pub profit_events: Vec<CashoutEvent>,
    pub loss_events: Vec<CashoutEvent>,
    pub settlement: Settlement,
}

impl SimulationResult {
    pub fn event_count(&self) -> usize {
        self.profit_events.len() + self.loss_events.len()
    }

    /// Profit and loss events merged in the order they occurred.
    pub fn events_in_order(&self) -> Vec<CashoutEvent> {
        let mut events: Vec<CashoutEvent> = self
            .profit_events
            .iter()
            .chain(self.loss_events.iter())
            .copied()
            .collect();
        // Within a step the profit check runs before the stop-loss check, and
        // both lists are already date ordered, so a stable sort is enough.
        events.sort_by_key(|e| e.date);
        events
    }
}

struct SimulationState {
    total_cashout: f64,
    earnings: f64,
    reference_value: f64,
    reference_date: Option<NaiveDate>,
    reference_is_set: bool,
}

impl SimulationState {
    fn new(reference_date: Option<NaiveDate>) -> Self {
        SimulationState {
            total_cashout: 0.0,
            earnings: 0.0,
            reference_value: 0.0,
            reference_date,
            reference_is_set: false,
        }
    }

    fn holdout_expired(&self, date: NaiveDate) -> bool {
        self.reference_date.is_some_and(|limit| date >= limit)
    }

    fn cash_out(
        &mut self,
        date: NaiveDate,
        price: f64,
        kind: EventKind,
        trigger: Trigger,
        unit_scale: f64,
    ) -> CashoutEvent {
        let earnings = self.earnings;
        let amount = earnings * price / unit_scale;
        self.total_cashout += amount;
        self.earnings = 0.0;
        self.reference_is_set = false;
        CashoutEvent {
            date,
            kind,
            trigger,
            price,
            earnings,
            amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashoutSimulator {
    unit_scale: f64,
    accrual: AccrualTiming,
}

impl Default for CashoutSimulator {
    fn default() -> Self {
        CashoutSimulator {
            unit_scale: DEFAULT_UNIT_SCALE,
            accrual: AccrualTiming::default(),
        }
    }
}

impl CashoutSimulator {
    pub fn new(unit_scale: f64) -> Result<Self, CashoutError> {
        if !unit_scale.is_finite() || unit_scale <= 0.0 {
            return Err(CashoutError::InvalidParameters {
                field: "unit_scale".to_string(),
                reason: format!("unit_scale must be finite and positive, got {unit_scale}"),
            });
        }
        Ok(CashoutSimulator {
            unit_scale,
            accrual: AccrualTiming::default(),
        })
    }

    pub fn with_accrual(mut self, accrual: AccrualTiming) -> Self {
        self.accrual = accrual;
        self
    }

    pub fn unit_scale(&self) -> f64 {
        self.unit_scale
    }

    pub fn accrual(&self) -> AccrualTiming {
        self.accrual
    }

    /// Run one forward pass over `series` under `params`.
    ///
    /// The profit check runs first. The stop-loss check is evaluated after it
    /// in the same step, against whatever reference and earnings the profit
    /// check left behind: if both fire, the stop-loss converts zero earnings,
    /// still rebases the reference and still records a loss event.
    pub fn simulate(
        &self,
        series: &PriceSeries,
        params: &SimulationParameters,
    ) -> Result<SimulationResult, CashoutError> {
        params.validate()?;
        let first = series.first().ok_or(CashoutError::EmptySeries)?;
        let last = *series.last().ok_or(CashoutError::EmptySeries)?;

        let mut state = SimulationState::new(params.max_holdout.add_to(first.date));
        let mut profit_events = Vec::new();
        let mut loss_events = Vec::new();

        for obs in series {
            let (date, value) = (obs.date, obs.value);

            if self.accrual == AccrualTiming::BeforeChecks {
                state.earnings += params.daily_earnings;
            }

            if state.earnings >= params.minimum_cashout {
                if !state.reference_is_set {
                    state.reference_value = value;
                    state.reference_is_set = true;
                }
                let above_upper =
                    value >= state.reference_value * (1.0 + params.upper_cashout_boundary);
                if above_upper || state.holdout_expired(date) {
                    let kind = if value >= state.reference_value {
                        EventKind::Profit
                    } else {
                        EventKind::Loss
                    };
                    let trigger = if above_upper {
                        Trigger::UpperBoundary
                    } else {
                        Trigger::Holdout
                    };
                    let event = state.cash_out(date, value, kind, trigger, self.unit_scale);
                    tracing::trace!(%date, value, ?kind, ?trigger, amount = event.amount, "cash-out");
                    match kind {
                        EventKind::Profit => profit_events.push(event),
                        EventKind::Loss => loss_events.push(event),
                    }
                }
            }

            if value <= state.reference_value * (1.0 - params.lower_cashout_boundary) {
                let event =
                    state.cash_out(date, value, EventKind::Loss, Trigger::StopLoss, self.unit_scale);
                state.reference_value = value;
                tracing::trace!(%date, value, amount = event.amount, "stop-loss cash-out");
                loss_events.push(event);
            }

            if self.accrual == AccrualTiming::AfterChecks {
                state.earnings += params.daily_earnings;
            }
        }

        let settlement_earnings = state.earnings;
        let settlement_amount = settlement_earnings * last.value / self.unit_scale;
        state.total_cashout += settlement_amount;

        Ok(SimulationResult {
            parameters: *params,
            total_cashout: state.total_cashout,
            profit_events,
            loss_events,
            settlement: Settlement {
                date: last.date,
                price: last.value,
                earnings: settlement_earnings,
                amount: settlement_amount,
            },
        })
    }
}

/// Simulate with the default unit scale and accrual timing.
///
/// Amounts are divided by [`DEFAULT_UNIT_SCALE`]; use
/// `CashoutSimulator::new(1.0)` to get amounts in raw price units.
pub fn simulate(
    series: &PriceSeries,
    params: &SimulationParameters,
) -> Result<SimulationResult, CashoutError> {
    CashoutSimulator::default().simulate(series, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::holdout::Holdout;
    use crate::domain::price_series::PriceObservation;
    use approx::assert_relative_eq;

    fn day(n: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .checked_add_days(chrono::Days::new(n))
            .unwrap()
    }

    fn daily_series(values: &[f64]) -> PriceSeries {
        PriceSeries::new(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| PriceObservation::new(day(i as u64), v))
                .collect(),
        )
        .unwrap()
    }

    fn params(
        daily_earnings: f64,
        minimum_cashout: f64,
        holdout_days: u32,
        upper: f64,
        lower: f64,
    ) -> SimulationParameters {
        SimulationParameters {
            daily_earnings,
            minimum_cashout,
            max_holdout: Holdout::Days(holdout_days),
            upper_cashout_boundary: upper,
            lower_cashout_boundary: lower,
        }
    }

    fn unit_simulator() -> CashoutSimulator {
        CashoutSimulator::new(1.0).unwrap()
    }

    fn dates(events: &[CashoutEvent]) -> Vec<NaiveDate> {
        events.iter().map(|e| e.date).collect()
    }

    #[test]
    fn five_day_scenario_with_accrual_before_checks() {
        let series = daily_series(&[100.0, 110.0, 90.0, 95.0, 130.0]);
        let p = params(10.0, 20.0, 3, 0.2, 0.1);
        let sim = unit_simulator().with_accrual(AccrualTiming::BeforeChecks);

        let result = sim.simulate(&series, &p).unwrap();

        // d2: stop-loss on 30 earnings at 90; d4: holdout expiry on 20 at 130.
        assert_relative_eq!(result.total_cashout, 5300.0);
        assert_eq!(dates(&result.loss_events), vec![day(2)]);
        assert_eq!(dates(&result.profit_events), vec![day(4)]);
        assert_eq!(result.loss_events[0].trigger, Trigger::StopLoss);
        assert_eq!(result.profit_events[0].trigger, Trigger::Holdout);
        assert_relative_eq!(result.settlement.earnings, 0.0);
    }

    #[test]
    fn five_day_scenario_with_accrual_after_checks() {
        let series = daily_series(&[100.0, 110.0, 90.0, 95.0, 130.0]);
        let p = params(10.0, 20.0, 3, 0.2, 0.1);

        let result = unit_simulator().simulate(&series, &p).unwrap();

        // Reference pins at 90 on d2; the holdout expires on d3 with 30 earned.
        assert_relative_eq!(result.total_cashout, 30.0 * 95.0 + 20.0 * 130.0);
        assert!(result.loss_events.is_empty());
        assert_eq!(dates(&result.profit_events), vec![day(3)]);
        assert_relative_eq!(result.settlement.earnings, 20.0);
        assert_relative_eq!(result.settlement.amount, 2600.0);
    }

    #[test]
    fn upper_boundary_takes_profit() {
        let series = daily_series(&[100.0, 100.0, 125.0, 100.0]);
        let p = params(10.0, 10.0, 365, 0.2, 0.5);

        let result = unit_simulator().simulate(&series, &p).unwrap();

        // Pinned at 100 on d1, 125 >= 120 on d2.
        assert_eq!(result.profit_events.len(), 1);
        let event = result.profit_events[0];
        assert_eq!(event.date, day(2));
        assert_eq!(event.trigger, Trigger::UpperBoundary);
        assert_relative_eq!(event.earnings, 20.0);
        assert_relative_eq!(event.amount, 2500.0);
        // d3 re-pins at 100 without firing; 20 earnings settle at 100.
        assert_relative_eq!(result.total_cashout, 2500.0 + 20.0 * 100.0);
    }

    #[test]
    fn holdout_below_reference_is_a_loss() {
        let series = daily_series(&[100.0, 100.0, 95.0]);
        let p = params(10.0, 10.0, 2, 1.0, 0.5);

        let result = unit_simulator().simulate(&series, &p).unwrap();

        assert!(result.profit_events.is_empty());
        assert_eq!(result.loss_events.len(), 1);
        assert_eq!(result.loss_events[0].kind, EventKind::Loss);
        assert_eq!(result.loss_events[0].trigger, Trigger::Holdout);
        assert_relative_eq!(result.loss_events[0].amount, 20.0 * 95.0);
    }

    #[test]
    fn profit_then_stop_loss_in_same_step() {
        let series = daily_series(&[100.0, 100.0, 80.0, 80.0]);
        let p = params(10.0, 10.0, 2, 0.5, 0.1);

        let result = unit_simulator().simulate(&series, &p).unwrap();

        // d2: holdout expires below the reference (loss), then the stop-loss
        // fires on the already-reset earnings and rebases the reference to 80.
        assert_eq!(result.loss_events.len(), 2);
        let holdout = result.loss_events[0];
        let stop = result.loss_events[1];
        assert_eq!((holdout.date, holdout.trigger), (day(2), Trigger::Holdout));
        assert_relative_eq!(holdout.amount, 1600.0);
        assert_eq!((stop.date, stop.trigger), (day(2), Trigger::StopLoss));
        assert_relative_eq!(stop.earnings, 0.0);
        assert_relative_eq!(stop.amount, 0.0);

        // d3: re-pinned at 80; the expired holdout cashes out at once.
        assert_eq!(dates(&result.profit_events), vec![day(3)]);
        assert_relative_eq!(result.total_cashout, 1600.0 + 800.0 + 800.0);
    }

    #[test]
    fn stop_loss_cannot_fire_before_reference_is_pinned() {
        let series = daily_series(&[100.0, 50.0, 10.0, 1.0]);
        let p = params(10.0, 1_000.0, 365, 0.1, 0.0);

        let result = unit_simulator().simulate(&series, &p).unwrap();

        assert_eq!(result.event_count(), 0);
        assert_relative_eq!(result.settlement.earnings, 40.0);
        assert_relative_eq!(result.total_cashout, 40.0 * 1.0);
    }

    #[test]
    fn zero_upper_boundary_cashes_out_on_pinning() {
        let series = daily_series(&[100.0, 100.0, 100.0]);
        let p = params(10.0, 10.0, 365, 0.0, 0.9);

        let result = unit_simulator().simulate(&series, &p).unwrap();

        assert_eq!(dates(&result.profit_events), vec![day(1), day(2)]);
        assert!(result
            .profit_events
            .iter()
            .all(|e| e.trigger == Trigger::UpperBoundary));
    }

    #[test]
    fn default_unit_scale_divides_by_a_million() {
        let series = daily_series(&[20_000.0, 20_000.0]);
        let p = params(50.0, 1_000.0, 365, 0.1, 0.1);

        let result = simulate(&series, &p).unwrap();

        assert_relative_eq!(result.total_cashout, 100.0 * 20_000.0 / 1_000_000.0);
    }

    #[test]
    fn free_simulate_matches_unit_simulator_up_to_scale() {
        let series = daily_series(&[100.0, 110.0, 90.0, 95.0, 130.0]);
        let p = params(10.0, 20.0, 3, 0.2, 0.1);

        let scaled = simulate(&series, &p).unwrap();
        let raw = unit_simulator().simulate(&series, &p).unwrap();

        assert_relative_eq!(scaled.total_cashout * DEFAULT_UNIT_SCALE, raw.total_cashout);
        assert_relative_eq!(raw.total_cashout, 5450.0);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let series = daily_series(&[100.0, 110.0, 90.0, 95.0, 130.0, 80.0, 140.0]);
        let p = params(10.0, 20.0, 3, 0.2, 0.1);
        let a = unit_simulator().simulate(&series, &p).unwrap();
        let b = unit_simulator().simulate(&series, &p).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.total_cashout.to_bits(), b.total_cashout.to_bits());
    }

    #[test]
    fn events_in_order_merges_by_date() {
        let series = daily_series(&[100.0, 100.0, 80.0, 80.0]);
        let p = params(10.0, 10.0, 2, 0.5, 0.1);
        let result = unit_simulator().simulate(&series, &p).unwrap();

        let merged = result.events_in_order();
        assert_eq!(merged.len(), 3);
        assert!(merged.windows(2).all(|w| w[0].date <= w[1].date));
        assert_eq!(merged[2].kind, EventKind::Profit);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let series = daily_series(&[100.0]);
        let p = params(-1.0, 10.0, 1, 0.1, 0.1);
        assert!(matches!(
            unit_simulator().simulate(&series, &p),
            Err(CashoutError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn invalid_unit_scale_is_rejected() {
        assert!(CashoutSimulator::new(0.0).is_err());
        assert!(CashoutSimulator::new(f64::NAN).is_err());
        assert!(CashoutSimulator::new(-1.0).is_err());
    }
}
