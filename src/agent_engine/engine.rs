use crate::agent_engine::history::{HistoryEntry, SessionHistory};
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::state::{LoopConfig, RunSummary, StepOutcome, StopReason};
use crate::errors::PilotResult;
use crate::executor::dispatcher::dispatch;
use crate::executor::input::InputDriver;
use crate::llm::backend::ModelBackend;
use crate::llm::plan::ActionPlan;

/// Drives one objective: one model call per step, actions dispatched in between.
pub struct AgentEngine {
    backend: Box<dyn ModelBackend>,
    driver: Box<dyn InputDriver>,
    loop_ctrl: LoopController,
    history: Option<SessionHistory>,
}

impl AgentEngine {
    pub fn new(
        backend: Box<dyn ModelBackend>,
        driver: Box<dyn InputDriver>,
        loop_config: LoopConfig,
    ) -> Self {
        Self {
            backend,
            driver,
            loop_ctrl: LoopController::new(loop_config),
            history: None,
        }
    }

    pub fn with_history(mut self, history: SessionHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn history(&self) -> Option<&SessionHistory> {
        self.history.as_ref()
    }

    pub async fn run(&mut self, objective: &str) -> RunSummary {
        tracing::info!(objective = %objective, model = %self.backend.model_name(), "run started");
        let mut step: u32 = 0;

        let stop = loop {
            if let Some(reason) = self.loop_ctrl.should_stop() {
                break reason;
            }

            let (plan, outcome) = self.run_step(objective, step).await;
            self.loop_ctrl.record(&outcome);
            self.push_history(objective, step, plan.as_ref(), &outcome);

            if outcome.is_done() {
                break StopReason::Done;
            }
            step += 1;

            let delay = self.loop_ctrl.config().step_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        };

        let summary = RunSummary {
            steps: self.loop_ctrl.steps_taken(),
            stop,
            failures: self.loop_ctrl.total_failures(),
        };
        tracing::info!(
            steps = summary.steps,
            stop = ?summary.stop,
            failures = summary.failures,
            "run ended"
        );
        summary
    }

    /// Asks the model for the next plan and executes it.
    pub async fn run_step(&self, objective: &str, step: u32) -> (Option<ActionPlan>, StepOutcome) {
        tracing::info!(step, "requesting instructions");
        let plan = match self.backend.get_instructions(objective, step).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!(step, error = %e, "step aborted before model call");
                return (None, StepOutcome::CaptureFailed { reason: e.to_string() });
            }
        };

        let outcome = match plan.actions() {
            Ok(actions) => {
                let report = dispatch(self.driver.as_ref(), &actions).await;
                StepOutcome::executed(report, plan.is_done())
            }
            Err(e) => {
                tracing::warn!(step, error = %e, "plan not executable");
                StepOutcome::Degraded { reason: e.to_string() }
            }
        };
        (Some(plan), outcome)
    }

    fn push_history(
        &mut self,
        objective: &str,
        step: u32,
        plan: Option<&ActionPlan>,
        outcome: &StepOutcome,
    ) {
        let Some(history) = self.history.as_mut() else {
            return;
        };
        let entry = HistoryEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            step,
            objective: objective.to_string(),
            plan: plan.map(ActionPlan::to_value),
            outcome: outcome.clone(),
        };
        if let Err(e) = history.record(entry) {
            tracing::warn!(error = %e, "failed to write session history");
        }
    }
}

/// Single step without dispatching, for callers that only want the plan.
pub async fn plan_once(
    backend: &dyn ModelBackend,
    objective: &str,
    step: u32,
) -> PilotResult<ActionPlan> {
    backend.get_instructions(objective, step).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PilotError;
    use crate::executor::input::DryRunDriver;
    use crate::llm::backend::BackendVariant;
    use crate::llm::types::{MessagePart, MultimodalMessage, RawResponse};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replies with scripted contents; `None` simulates a transport failure.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Option<&'static str>>>,
        steps_seen: Mutex<Vec<u32>>,
        capture_fails: bool,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Option<&'static str>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                steps_seen: Mutex::new(Vec::new()),
                capture_fails: false,
            }
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        fn model_name(&self) -> &str {
            "scripted"
        }

        fn variant(&self) -> BackendVariant {
            BackendVariant::HostedChatCompletions
        }

        async fn format_request(&self, objective: &str, step: u32) -> PilotResult<MultimodalMessage> {
            if self.capture_fails {
                return Err(PilotError::Capture("no display".into()));
            }
            self.steps_seen.lock().unwrap().push(step);
            Ok(MultimodalMessage {
                parts: vec![MessagePart::Text(format!("{objective}:{step}"))],
            })
        }

        async fn send_to_model(&self, _message: &MultimodalMessage) -> PilotResult<RawResponse> {
            let reply = self.replies.lock().unwrap().pop_front().flatten();
            match reply {
                Some(content) => Ok(RawResponse(serde_json::json!({ "content": content }))),
                None => Err(PilotError::Backend("connection reset".into())),
            }
        }

        fn response_content<'a>(&self, raw: &'a RawResponse) -> Option<&'a str> {
            raw.0["content"].as_str()
        }
    }

    fn config(max_steps: u32, max_failures: u32) -> LoopConfig {
        LoopConfig {
            max_steps,
            max_consecutive_failures: max_failures,
            step_delay: Duration::ZERO,
        }
    }

    const NOT_DONE: &str = r#"{"steps": [{"function": "press", "parameters": {"keys": ["enter"]}, "human_readable_justification": "submit"}], "done": false}"#;
    const DONE: &str = r#"Finished. {"steps": [], "done": true}"#;

    #[tokio::test]
    async fn runs_until_model_reports_done() {
        let backend = ScriptedBackend::new(vec![Some(NOT_DONE), Some(NOT_DONE), Some(DONE)]);
        let mut engine = AgentEngine::new(Box::new(backend), Box::new(DryRunDriver), config(10, 3));

        let summary = engine.run("open google").await;
        assert_eq!(summary.stop, StopReason::Done);
        assert_eq!(summary.steps, 3);
        assert_eq!(summary.failures, 0);
    }

    #[tokio::test]
    async fn transport_failures_hit_the_failure_limit() {
        let backend = ScriptedBackend::new(vec![None, None, None]);
        let mut engine = AgentEngine::new(Box::new(backend), Box::new(DryRunDriver), config(10, 2));

        let summary = engine.run("open google").await;
        assert_eq!(summary.stop, StopReason::FailureLimit);
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.failures, 2);
    }

    #[tokio::test]
    async fn step_limit_stops_an_endless_plan() {
        let backend = ScriptedBackend::new(vec![Some(NOT_DONE); 5]);
        let mut engine = AgentEngine::new(Box::new(backend), Box::new(DryRunDriver), config(3, 3));

        let summary = engine.run("keep going").await;
        assert_eq!(summary.stop, StopReason::StepLimit);
        assert_eq!(summary.steps, 3);
    }

    #[tokio::test]
    async fn transport_failure_yields_degraded_step() {
        let backend = ScriptedBackend::new(vec![None]);
        let engine = AgentEngine::new(Box::new(backend), Box::new(DryRunDriver), config(1, 1));

        let (plan, outcome) = engine.run_step("x", 0).await;
        let plan = plan.expect("error plan is still returned");
        assert_eq!(
            plan.to_value(),
            serde_json::json!({ "error": "No JSON object found", "message": "" })
        );
        assert!(matches!(outcome, StepOutcome::Degraded { .. }));
    }

    #[tokio::test]
    async fn capture_failure_counts_as_failed_step() {
        let mut backend = ScriptedBackend::new(vec![]);
        backend.capture_fails = true;
        let mut engine = AgentEngine::new(Box::new(backend), Box::new(DryRunDriver), config(5, 2));

        let summary = engine.run("x").await;
        assert_eq!(summary.stop, StopReason::FailureLimit);
        assert_eq!(summary.failures, 2);
    }

    #[tokio::test]
    async fn history_records_every_step() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![Some("no json"), Some(DONE)]);
        let mut engine = AgentEngine::new(Box::new(backend), Box::new(DryRunDriver), config(5, 3))
            .with_history(SessionHistory::new(dir.path()).unwrap());

        let summary = engine.run("open google").await;
        assert_eq!(summary.stop, StopReason::Done);

        let history = engine.history().unwrap();
        assert_eq!(history.entries().len(), 2);
        assert_eq!(history.entries()[0].step, 0);
        assert_eq!(history.entries()[1].step, 1);
        assert!(history.entries()[0].outcome.is_failure());
        assert_eq!(
            history.entries()[0].plan.as_ref().unwrap()["error"],
            "No JSON object found"
        );
    }

    #[tokio::test]
    async fn plan_once_returns_parsed_plan() {
        let backend = ScriptedBackend::new(vec![Some(NOT_DONE)]);
        let plan = plan_once(&backend, "open google", 7).await.unwrap();
        assert_eq!(plan.actions().unwrap().len(), 1);
        assert_eq!(*backend.steps_seen.lock().unwrap(), vec![7]);
    }
}
