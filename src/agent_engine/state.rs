use std::time::Duration;

use crate::config::AgentConfig;
use crate::executor::dispatcher::DispatchReport;

#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    pub max_steps: u32,
    /// Zero disables the failure limit.
    pub max_consecutive_failures: u32,
    pub step_delay: Duration,
}

impl From<&AgentConfig> for LoopConfig {
    fn from(cfg: &AgentConfig) -> Self {
        Self {
            max_steps: cfg.max_steps,
            max_consecutive_failures: cfg.max_consecutive_failures,
            step_delay: Duration::from_millis(cfg.step_delay_ms),
        }
    }
}

/// What happened to one step's plan.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Screen capture failed before the model was called.
    CaptureFailed { reason: String },
    /// Error plan, or a mapping without usable steps.
    Degraded { reason: String },
    /// Actions ran; `failure` is set when dispatch stopped early.
    Executed { executed: usize, failure: Option<String>, done: bool },
}

impl StepOutcome {
    pub fn executed(report: DispatchReport, done: bool) -> Self {
        StepOutcome::Executed {
            executed: report.executed,
            failure: report.failure,
            done,
        }
    }

    pub fn is_failure(&self) -> bool {
        match self {
            StepOutcome::CaptureFailed { .. } | StepOutcome::Degraded { .. } => true,
            StepOutcome::Executed { failure, .. } => failure.is_some(),
        }
    }

    /// The model reported completion and every action ran.
    pub fn is_done(&self) -> bool {
        matches!(self, StepOutcome::Executed { done: true, failure: None, .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Done,
    StepLimit,
    FailureLimit,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunSummary {
    pub steps: u32,
    pub stop: StopReason,
    pub failures: u32,
}
