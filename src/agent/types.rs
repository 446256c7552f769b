//! Shared vocabulary of the orchestration loop.
//!
//! [`TaskExchange`] is also the on-disk shape inside `task_data.json`, so it
//! derives both Serialize and Deserialize.

use serde::{Deserialize, Serialize};

use crate::llm::TokenUsage;

/// One sub-task prompt and the result recorded for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskExchange {
    pub prompt: String,
    pub result: String,
}

/// A completed sub-task as shown to later sub-agents.
#[derive(Clone, Debug, PartialEq)]
pub struct SubTaskRecord {
    pub task: String,
    pub result: String,
}

/// What the orchestrator decided this iteration.
#[derive(Clone, Debug, PartialEq)]
pub enum OrchestratorStep {
    /// The sentinel phrase was present. `summary` is the response with the
    /// sentinel removed.
    Complete { summary: String },
    /// Another sub-task is needed.
    SubTask {
        prompt: String,
        search_query: Option<String>,
    },
}

/// A model reply with its accounting.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoleOutput {
    pub text: String,
    pub usage: TokenUsage,
    /// USD, when the model has a known price.
    pub cost: Option<f64>,
    /// Continuation calls made after the first reply.
    pub continuations: u32,
}

/// Why the loop stopped iterating.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The orchestrator declared completion.
    Completed,
    /// `max_iterations` was reached first.
    IterationLimit,
    /// Ctrl+C between iterations.
    Cancelled,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub stop_reason: StopReason,
    pub exchanges: Vec<TaskExchange>,
    /// Orchestrator's closing summary, when it declared completion.
    pub summary: Option<String>,
    pub iterations: u32,
    /// Refined output; `None` when refinement was skipped after cancellation.
    pub refined: Option<String>,
    pub project_dir: Option<std::path::PathBuf>,
    pub exchange_log: Option<std::path::PathBuf>,
    pub total_cost: f64,
}

impl RunOutcome {
    pub fn completed(&self) -> bool {
        self.stop_reason == StopReason::Completed
    }
}
