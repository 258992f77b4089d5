use crate::agent_engine::state::{LoopConfig, StepOutcome, StopReason};

pub struct LoopController {
    config: LoopConfig,
    steps_taken: u32,
    consecutive_failures: u32,
    total_failures: u32,
}

impl LoopController {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            steps_taken: 0,
            consecutive_failures: 0,
            total_failures: 0,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn steps_taken(&self) -> u32 {
        self.steps_taken
    }

    pub fn total_failures(&self) -> u32 {
        self.total_failures
    }

    pub fn record(&mut self, outcome: &StepOutcome) {
        self.steps_taken += 1;
        if outcome.is_failure() {
            self.consecutive_failures += 1;
            self.total_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }
    }

    pub fn should_stop(&self) -> Option<StopReason> {
        let max_fail = self.config.max_consecutive_failures;
        if max_fail > 0 && self.consecutive_failures >= max_fail {
            return Some(StopReason::FailureLimit);
        }
        if self.steps_taken >= self.config.max_steps {
            return Some(StopReason::StepLimit);
        }
        None
    }
}
