//! Exhaustive grid search over a [`ParameterSpace`].
//!
//! Every point is simulated independently against the same read-only series,
//! so evaluation fans out over the rayon pool without locks. Results are
//! collected in grid order and ranked with one stable sort: descending by
//! total cash-out, ties resolved in favour of the earlier grid point.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::domain::error::CashoutError;
use crate::domain::parameter_space::ParameterSpace;
use crate::domain::parameters::SimulationParameters;
use crate::domain::price_series::PriceSeries;
use crate::domain::simulation::{CashoutSimulator, SimulationResult};

/// What to do with a grid point whose parameters fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidPointPolicy {
    /// Record the point as skipped and keep evaluating its siblings.
    #[default]
    Skip,
    /// Validate every point up front and abort before simulating anything.
    FailFast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    #[default]
    Parallel,
    Sequential,
}

/// Cooperative cancellation flag, checked before each grid point starts.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    /// Position of the point in the grid's enumeration order.
    pub index: usize,
    pub result: SimulationResult,
}

#[derive(Debug)]
pub struct SkippedPoint {
    pub index: usize,
    pub parameters: SimulationParameters,
    pub error: CashoutError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Complete,
    /// Cancelled before every point was evaluated.
    Partial { evaluated: usize, total: usize },
}

#[derive(Debug)]
pub struct OptimizationResult {
    pub ranked: Vec<RankedResult>,
    pub skipped: Vec<SkippedPoint>,
    pub status: RunStatus,
}

impl OptimizationResult {
    pub fn best(&self) -> Option<&SimulationResult> {
        self.ranked.first().map(|r| &r.result)
    }

    pub fn top(&self, n: usize) -> &[RankedResult] {
        &self.ranked[..n.min(self.ranked.len())]
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.status, RunStatus::Partial { .. })
    }
}

enum Outcome {
    Evaluated(RankedResult),
    Skipped(SkippedPoint),
}

type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

#[derive(Default)]
pub struct Optimizer {
    simulator: CashoutSimulator,
    execution: Execution,
    policy: InvalidPointPolicy,
    cancellation: Option<CancellationToken>,
    progress: Option<Box<ProgressFn>>,
}

impl Optimizer {
    pub fn new(simulator: CashoutSimulator) -> Self {
        Optimizer {
            simulator,
            ..Default::default()
        }
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_policy(mut self, policy: InvalidPointPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Called after each finished point with `(finished, total)`.
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn simulator(&self) -> &CashoutSimulator {
        &self.simulator
    }

    pub fn optimize(
        &self,
        series: &PriceSeries,
        space: &ParameterSpace,
    ) -> Result<OptimizationResult, CashoutError> {
        self.run(series, space.len(), |i| space.point(i))
    }

    /// Grid search over an explicit list of points, ranked in list order on ties.
    pub fn optimize_points(
        &self,
        series: &PriceSeries,
        points: &[SimulationParameters],
    ) -> Result<OptimizationResult, CashoutError> {
        self.run(series, points.len(), |i| points.get(i).copied())
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn run<F>(
        &self,
        series: &PriceSeries,
        total: usize,
        point_at: F,
    ) -> Result<OptimizationResult, CashoutError>
    where
        F: Fn(usize) -> Option<SimulationParameters> + Sync,
    {
        if self.policy == InvalidPointPolicy::FailFast {
            for index in 0..total {
                if let Some(params) = point_at(index) {
                    params.validate().inspect_err(|e| {
                        tracing::error!(index, error = %e, "invalid grid point, aborting");
                    })?;
                }
            }
        }

        tracing::info!(
            points = total,
            observations = series.len(),
            execution = ?self.execution,
            "starting grid search"
        );

        let finished = AtomicUsize::new(0);
        let evaluate = |index: usize| -> Option<Outcome> {
            if self.is_cancelled() {
                return None;
            }
            let parameters = point_at(index)?;
            let outcome = match self.simulator.simulate(series, &parameters) {
                Ok(result) => Outcome::Evaluated(RankedResult { index, result }),
                Err(error) => Outcome::Skipped(SkippedPoint {
                    index,
                    parameters,
                    error,
                }),
            };
            let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(progress) = &self.progress {
                progress(done, total);
            }
            Some(outcome)
        };

        let outcomes: Vec<Option<Outcome>> = match self.execution {
            Execution::Parallel => (0..total).into_par_iter().map(evaluate).collect(),
            Execution::Sequential => (0..total).map(evaluate).collect(),
        };

        let mut ranked = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Outcome::Evaluated(r) => ranked.push(r),
                Outcome::Skipped(s) => {
                    tracing::warn!(index = s.index, error = %s.error, "skipping grid point");
                    skipped.push(s);
                }
            }
        }

        if self.policy == InvalidPointPolicy::FailFast && !skipped.is_empty() {
            return Err(skipped.swap_remove(0).error);
        }

        // Stable: equal totals keep grid order.
        ranked.sort_by(|a, b| b.result.total_cashout.total_cmp(&a.result.total_cashout));

        let evaluated = ranked.len() + skipped.len();
        let status = if evaluated == total {
            RunStatus::Complete
        } else {
            tracing::warn!(evaluated, total, "grid search cancelled");
            RunStatus::Partial { evaluated, total }
        };

        if let Some(best) = ranked.first() {
            tracing::info!(
                index = best.index,
                total_cashout = best.result.total_cashout,
                "grid search finished"
            );
        }

        Ok(OptimizationResult {
            ranked,
            skipped,
            status,
        })
    }
}
