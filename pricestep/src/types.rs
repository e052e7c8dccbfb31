use serde::Serialize;
use std::fmt;

use crate::errors::{error_chain, InputError, TaskError};

/// One SKU and the settlement price it should end up at.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTask {
    sku: String,
    target_price: f64,
}

impl PriceTask {
    /// Validates and normalises a row: the SKU is trimmed and must be
    /// non-empty, the target must be a finite positive number.
    pub fn new(sku: &str, target_price: f64) -> Result<Self, InputError> {
        let sku = sku.trim();
        if sku.is_empty() {
            return Err(InputError::Row {
                row: 0,
                sku: String::new(),
                reason: "SKU is blank".to_string(),
            });
        }
        if !target_price.is_finite() || target_price <= 0.0 {
            return Err(InputError::Row {
                row: 0,
                sku: sku.to_string(),
                reason: format!("target price must be greater than 0, got {target_price}"),
            });
        }
        Ok(Self {
            sku: sku.to_string(),
            target_price,
        })
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn target_price(&self) -> f64 {
        self.target_price
    }
}

/// Where a task is in its lifecycle. A failed task keeps the last phase it
/// reached; failure itself is [`TaskOutcome::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    NotStarted,
    PanelOpen,
    Reading,
    Stepping,
    Done,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskPhase::NotStarted => "not started",
            TaskPhase::PanelOpen => "panel open",
            TaskPhase::Reading => "reading",
            TaskPhase::Stepping => "stepping",
            TaskPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Per-task convergence state. `current_value` only ever holds a value that
/// was read from the page or accepted by an apply call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceState {
    pub current_value: f64,
    pub target_value: f64,
}

impl ConvergenceState {
    pub fn new(current_value: f64, target_value: f64) -> Self {
        Self {
            current_value,
            target_value,
        }
    }

    pub fn is_met(&self) -> bool {
        self.current_value >= self.target_value
    }
}

/// One apply cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepResult {
    pub applied_value: f64,
}

/// How a task ended.
#[derive(Debug)]
pub enum TaskOutcome {
    Done {
        sku: String,
        initial_value: f64,
        final_value: f64,
        steps: Vec<StepResult>,
    },
    Failed {
        sku: String,
        /// Last phase reached before the failure
        phase: TaskPhase,
        /// First value read, if the task got that far
        initial_value: Option<f64>,
        steps: Vec<StepResult>,
        error: TaskError,
    },
}

impl TaskOutcome {
    pub fn sku(&self) -> &str {
        match self {
            TaskOutcome::Done { sku, .. } | TaskOutcome::Failed { sku, .. } => sku,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Done { .. })
    }

    pub fn steps(&self) -> &[StepResult] {
        match self {
            TaskOutcome::Done { steps, .. } | TaskOutcome::Failed { steps, .. } => steps,
        }
    }

    pub fn applied_values(&self) -> Vec<f64> {
        self.steps().iter().map(|s| s.applied_value).collect()
    }

    pub fn error(&self) -> Option<&TaskError> {
        match self {
            TaskOutcome::Done { .. } => None,
            TaskOutcome::Failed { error, .. } => Some(error),
        }
    }

    /// Serializable view for summaries.
    pub fn report(&self) -> TaskReport {
        match self {
            TaskOutcome::Done {
                sku,
                initial_value,
                final_value,
                steps,
            } => TaskReport {
                sku: sku.clone(),
                phase: TaskPhase::Done,
                initial_value: Some(*initial_value),
                final_value: Some(*final_value),
                applied: steps.iter().map(|s| s.applied_value).collect(),
                error: None,
            },
            TaskOutcome::Failed {
                sku,
                phase,
                initial_value,
                steps,
                error,
            } => TaskReport {
                sku: sku.clone(),
                phase: *phase,
                initial_value: *initial_value,
                final_value: steps.last().map(|s| s.applied_value),
                applied: steps.iter().map(|s| s.applied_value).collect(),
                error: Some(error_chain(error)),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub sku: String,
    /// `done`, or the phase a failed task had reached
    pub phase: TaskPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_value: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub applied: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_task_trims_and_validates() {
        let task = PriceTask::new("  SKU-1 \t", 105.0).unwrap();
        assert_eq!(task.sku(), "SKU-1");
        assert_eq!(task.target_price(), 105.0);

        assert!(PriceTask::new("   ", 10.0).is_err());
        assert!(PriceTask::new("SKU-1", 0.0).is_err());
        assert!(PriceTask::new("SKU-1", -3.0).is_err());
        assert!(PriceTask::new("SKU-1", f64::NAN).is_err());
        assert!(PriceTask::new("SKU-1", f64::INFINITY).is_err());
    }

    #[test]
    fn test_state_is_met() {
        assert!(ConvergenceState::new(105.0, 105.0).is_met());
        assert!(ConvergenceState::new(110.0, 105.0).is_met());
        assert!(!ConvergenceState::new(104.99, 105.0).is_met());
    }

    #[test]
    fn test_failed_report_keeps_start_price() {
        let outcome = TaskOutcome::Failed {
            sku: "SKU-1".to_string(),
            phase: TaskPhase::Stepping,
            initial_value: Some(100.0),
            steps: vec![StepResult {
                applied_value: 101.99,
            }],
            error: TaskError::Stalled {
                applied: 104.02,
                observed: 101.99,
            },
        };
        let report = outcome.report();
        assert_eq!(report.phase, TaskPhase::Stepping);
        assert_eq!(report.initial_value, Some(100.0));
        assert_eq!(report.final_value, Some(101.99));
        assert_eq!(report.applied, vec![101.99]);
        assert!(report.error.unwrap().contains("did not advance"));
    }
}
