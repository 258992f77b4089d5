use std::time::Duration;

use crate::errors::{PilotError, PilotResult};
use crate::executor::input::InputDriver;
use crate::llm::plan::{Action, InputCommand};

/// Longest pause a plan may request.
pub const MAX_SLEEP: Duration = Duration::from_secs(60);

/// Outcome of dispatching one plan's actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub executed: usize,
    /// First failure, after which the remaining actions were skipped.
    pub failure: Option<String>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs `actions` in order and stops at the first one that cannot be converted or
/// executed.
pub async fn dispatch(driver: &dyn InputDriver, actions: &[Action]) -> DispatchReport {
    let mut report = DispatchReport::default();

    for (index, action) in actions.iter().enumerate() {
        tracing::info!(
            index,
            function = %action.function,
            justification = %action.human_readable_justification,
            "dispatching action"
        );

        if let Err(e) = run_one(driver, action).await {
            tracing::warn!(index, function = %action.function, error = %e, "action failed, skipping the rest");
            report.failure = Some(e.to_string());
            break;
        }
        report.executed += 1;
    }
    report
}

async fn run_one(driver: &dyn InputDriver, action: &Action) -> PilotResult<()> {
    match action.command()? {
        InputCommand::Sleep { secs } => {
            tokio::time::sleep(sleep_duration(secs)?).await;
            Ok(())
        }
        command => driver.execute(&command).await,
    }
}

/// Negative values sleep for zero; anything above [`MAX_SLEEP`] or not a number is rejected.
fn sleep_duration(secs: f64) -> PilotResult<Duration> {
    let duration = Duration::try_from_secs_f64(if secs < 0.0 { 0.0 } else { secs })
        .map_err(|e| PilotError::Plan(format!("invalid sleep of {secs}s: {e}")))?;
    if duration > MAX_SLEEP {
        return Err(PilotError::Plan(format!(
            "sleep of {secs}s exceeds the {}s limit",
            MAX_SLEEP.as_secs()
        )));
    }
    Ok(duration)
}
