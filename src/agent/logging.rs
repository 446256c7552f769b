//! JSONL run logger for full run replay.
//!
//! Writes structured events to timestamped JSONL files in
//! `{output_dir}/.maestro-logs/`. Each run produces a file named
//! `run-{ISO8601}-{id}.jsonl`.
//!
//! Uses synchronous `std::fs` since writes are small, buffered, and flushed
//! after each event.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::agent::types::StopReason;
use crate::error::AgentError;

/// Returns the current UTC time as an ISO 8601 string with milliseconds.
pub fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// A structured log entry serialized as a single JSON line.
///
/// Tagged with `event_type` so each line is self-describing for replay.
#[derive(Debug, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum LogEntry {
    RunStart {
        timestamp: String,
        run_id: String,
        objective: String,
        orchestrator_model: String,
        sub_agent_model: String,
        refiner_model: String,
        resumed_exchanges: usize,
    },

    /// One orchestrator call and what it decided.
    OrchestratorTurn {
        timestamp: String,
        iteration: u32,
        complete: bool,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        search_query: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cost: Option<f64>,
    },

    Search {
        timestamp: String,
        iteration: u32,
        query: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        results: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    SubAgentResult {
        timestamp: String,
        iteration: u32,
        prompt: String,
        result: String,
        continuations: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        input_tokens: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        output_tokens: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cost: Option<f64>,
    },

    CodeExecution {
        timestamp: String,
        iteration: u32,
        blocks: usize,
        succeeded: bool,
        output: String,
    },

    /// Completion was declared but blocked by recorded execution errors.
    CompletionBlocked {
        timestamp: String,
        iteration: u32,
    },

    Refine {
        timestamp: String,
        content: String,
        continuations: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        cost: Option<f64>,
    },

    Artifacts {
        timestamp: String,
        project_dir: String,
        created_files: usize,
        created_dirs: usize,
        missing_content: Vec<String>,
        rejected: Vec<String>,
    },

    Error {
        timestamp: String,
        iteration: u32,
        message: String,
    },

    RunEnd {
        timestamp: String,
        iterations: u32,
        reason: StopReason,
        total_cost: f64,
    },
}

/// Append-only JSONL logger for runs.
pub struct RunLogger {
    writer: BufWriter<fs::File>,
    log_path: PathBuf,
}

impl RunLogger {
    /// Create a logger in `{output_dir}/.maestro-logs/`.
    pub fn new(output_dir: &Path, run_id: &str) -> Result<Self, AgentError> {
        Self::new_in_dir(&Self::log_dir_for(output_dir), run_id)
    }

    /// Create a logger writing into `log_dir` directly.
    pub fn new_in_dir(log_dir: &Path, run_id: &str) -> Result<Self, AgentError> {
        let open_error =
            |e: std::io::Error| AgentError::LoggingError(format!("{}: {e}", log_dir.display()));
        fs::create_dir_all(log_dir).map_err(open_error)?;

        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let short_id: String = run_id.chars().take(8).collect();
        let log_path = log_dir.join(format!("run-{stamp}-{short_id}.jsonl"));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(open_error)?;

        Ok(Self {
            writer: BufWriter::new(file),
            log_path,
        })
    }

    pub fn log_dir_for(output_dir: &Path) -> PathBuf {
        output_dir.join(".maestro-logs")
    }

    /// Serialize a log entry as a single JSON line and flush.
    pub fn log_event(&mut self, event: &LogEntry) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Log without failing the run; a broken log file only costs a warning.
    pub fn record(&mut self, event: LogEntry) {
        if let Err(e) = self.log_event(&event) {
            tracing::warn!("Failed to write run log {}: {e:#}", self.log_path.display());
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
