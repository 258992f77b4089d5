use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::agent_engine::state::StepOutcome;
use crate::errors::PilotResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: i64,
    pub step: u32,
    pub objective: String,
    pub plan: Option<serde_json::Value>,
    pub outcome: StepOutcome,
}

/// Append-only JSONL record of one run.
pub struct SessionHistory {
    pub session_id: String,
    entries: Vec<HistoryEntry>,
    file_path: PathBuf,
}

impl SessionHistory {
    pub fn new(dir: &Path) -> PilotResult<Self> {
        std::fs::create_dir_all(dir)?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = dir.join(format!("session_{session_id}.jsonl"));
        Ok(Self {
            session_id,
            entries: Vec::new(),
            file_path,
        })
    }

    /// Session file under the platform data dir.
    pub fn in_data_dir() -> PilotResult<Self> {
        Self::new(&data_dir_or_cwd())
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Records the entry and appends it to the JSONL file.
    pub fn record(&mut self, entry: HistoryEntry) -> PilotResult<()> {
        let line = serde_json::to_string(&entry)?;
        self.entries.push(entry);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(path = %self.file_path.display(), "history entry flushed");
        Ok(())
    }
}

/// `~/.local/share/open-pilot/sessions` on Linux and the platform equivalent elsewhere,
/// falling back to the current working directory.
fn data_dir_or_cwd() -> PathBuf {
    match dirs::data_dir() {
        Some(base) => base.join("open-pilot").join("sessions"),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
