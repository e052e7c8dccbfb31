//! Step-wise price convergence.
//!
//! The dashboard flags single price changes above roughly 2%, so a task is
//! raised toward its target in multiplicative steps of at most
//! [`GROWTH_FACTOR`], never past the target and never downward.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::adapter::PricingAdapter;
use crate::config::ConvergenceConfig;
use crate::errors::{error_chain, AdapterError, TaskError};
use crate::types::{ConvergenceState, PriceTask, StepResult, TaskOutcome, TaskPhase};

/// Largest multiplicative increase applied in one step.
pub const GROWTH_FACTOR: f64 = 1.0199;

/// Half a cent: a re-read value this close to the target counts as reaching it.
pub const PRICE_TOLERANCE: f64 = 0.005;

/// What the engine takes as the current value after an apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyPolicy {
    /// The applied value becomes current without another read.
    #[default]
    TrustApplied,
    /// Read the field back after every apply and continue from what the page shows.
    Reread,
}

/// Next value to apply: one growth step up from `current`, clamped to `target`.
pub fn next_step(current: f64, target: f64, growth_factor: f64) -> f64 {
    let next = current * growth_factor;
    if next > target {
        target
    } else {
        next
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConvergenceEngine {
    growth_factor: f64,
    policy: ApplyPolicy,
}

impl Default for ConvergenceEngine {
    fn default() -> Self {
        Self::new(GROWTH_FACTOR, ApplyPolicy::default())
    }
}

/// Bookkeeping that survives a failed task so the outcome can say how far it got.
struct Progress {
    phase: TaskPhase,
    initial_value: Option<f64>,
    steps: Vec<StepResult>,
}

impl ConvergenceEngine {
    pub fn new(growth_factor: f64, policy: ApplyPolicy) -> Self {
        Self {
            growth_factor,
            policy,
        }
    }

    pub fn from_config(config: &ConvergenceConfig) -> Self {
        Self::new(config.growth_factor, config.apply_policy)
    }

    pub fn policy(&self) -> ApplyPolicy {
        self.policy
    }

    /// Drive one task to its target. Never fails: adapter errors end this
    /// task with [`TaskOutcome::Failed`] and the caller moves on.
    #[instrument(level = "debug", skip_all, fields(sku = %task.sku()))]
    pub async fn run_task<A>(&self, task: &PriceTask, adapter: &mut A) -> TaskOutcome
    where
        A: PricingAdapter + ?Sized,
    {
        let mut progress = Progress {
            phase: TaskPhase::NotStarted,
            initial_value: None,
            steps: Vec::new(),
        };

        match self.converge(task, adapter, &mut progress).await {
            Ok(state) => {
                info!(
                    sku = %task.sku(),
                    steps = progress.steps.len(),
                    "✅ Done with {} @ ₹{:.2}",
                    task.sku(),
                    state.current_value
                );
                TaskOutcome::Done {
                    sku: task.sku().to_string(),
                    initial_value: progress.initial_value.unwrap_or(state.current_value),
                    final_value: state.current_value,
                    steps: progress.steps,
                }
            }
            Err(err) => {
                error!(
                    sku = %task.sku(),
                    phase = %progress.phase,
                    steps = progress.steps.len(),
                    "❌ Failed on {}: {}",
                    task.sku(),
                    error_chain(&err)
                );
                TaskOutcome::Failed {
                    sku: task.sku().to_string(),
                    phase: progress.phase,
                    initial_value: progress.initial_value,
                    steps: progress.steps,
                    error: err,
                }
            }
        }
    }

    async fn converge<A>(
        &self,
        task: &PriceTask,
        adapter: &mut A,
        progress: &mut Progress,
    ) -> Result<ConvergenceState, TaskError>
    where
        A: PricingAdapter + ?Sized,
    {
        info!(sku = %task.sku(), "→ Opening listing for SKU {}", task.sku());
        adapter.open_listing(task.sku()).await?;
        adapter.open_pricing_panel(task.sku()).await?;
        progress.phase = TaskPhase::PanelOpen;
        debug!(sku = %task.sku(), "Pricing panel open");

        progress.phase = TaskPhase::Reading;
        let initial = read_usable_value(adapter).await?;
        progress.initial_value = Some(initial);
        let mut state = ConvergenceState::new(initial, task.target_price());
        info!(
            sku = %task.sku(),
            value = initial,
            target = task.target_price(),
            "    Starting @ ₹{:.2}, target ₹{:.2}",
            initial,
            task.target_price()
        );

        if state.is_met() {
            info!(sku = %task.sku(), "    Already at or above target, nothing to apply");
            progress.phase = TaskPhase::Done;
            return Ok(state);
        }

        progress.phase = TaskPhase::Stepping;
        while !state.is_met() {
            let next = next_step(state.current_value, state.target_value, self.growth_factor);
            info!(
                sku = %task.sku(),
                step = progress.steps.len() + 1,
                value = next,
                "    ↑ Bumping to ₹{:.2}",
                next
            );
            adapter.apply_settlement_value(next).await?;
            let step = StepResult {
                applied_value: next,
            };
            progress.steps.push(step);

            match self.policy {
                ApplyPolicy::TrustApplied => state.current_value = step.applied_value,
                ApplyPolicy::Reread => {
                    let observed = read_usable_value(adapter).await?;
                    debug!(sku = %task.sku(), observed, "Read back after apply");
                    if state.target_value - observed <= PRICE_TOLERANCE {
                        state.current_value = observed.max(state.target_value);
                    } else if observed <= state.current_value {
                        warn!(
                            sku = %task.sku(),
                            applied = next,
                            observed,
                            "Applied value did not take effect"
                        );
                        return Err(TaskError::Stalled {
                            applied: next,
                            observed,
                        });
                    } else {
                        state.current_value = observed;
                    }
                }
            }
        }

        progress.phase = TaskPhase::Done;
        Ok(state)
    }
}

/// Read the settlement value and reject values the engine cannot step from.
async fn read_usable_value<A>(adapter: &mut A) -> Result<f64, TaskError>
where
    A: PricingAdapter + ?Sized,
{
    let value = adapter.read_settlement_value().await?;
    if !value.is_finite() || value <= 0.0 {
        return Err(AdapterError::Read(format!("settlement value {value} is not a positive number")).into());
    }
    Ok(value)
}
