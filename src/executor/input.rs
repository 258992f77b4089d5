use async_trait::async_trait;

use crate::errors::PilotResult;
use crate::llm::plan::InputCommand;

/// Performs keyboard and mouse commands. `sleep` never reaches a driver; the dispatcher
/// waits on its own.
#[async_trait]
pub trait InputDriver: Send + Sync {
    async fn execute(&self, command: &InputCommand) -> PilotResult<()>;
}

/// Logs each command instead of touching the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunDriver;

#[async_trait]
impl InputDriver for DryRunDriver {
    async fn execute(&self, command: &InputCommand) -> PilotResult<()> {
        match command {
            InputCommand::Press { keys, presses, interval } => {
                tracing::info!(?keys, presses, interval, "dry-run: press");
            }
            InputCommand::Write { text, interval } => {
                tracing::info!(text = %text, interval, "dry-run: write");
            }
            InputCommand::Hotkey { keys } => {
                tracing::info!(?keys, "dry-run: hotkey");
            }
            InputCommand::MoveTo { x, y, duration } => {
                tracing::info!(x, y, duration, "dry-run: moveTo");
            }
            InputCommand::Click { x, y, button, clicks, interval } => {
                tracing::info!(?x, ?y, ?button, clicks, interval, "dry-run: click");
            }
            InputCommand::Sleep { secs } => {
                tracing::info!(secs, "dry-run: sleep");
            }
        }
        Ok(())
    }
}
