use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use maestro::agent::Maestro;
use maestro::agent::coding_agent::EXECUTION_ERROR_MARKER;
use maestro::agent::prompts::CONTINUATION_PROMPT;
use maestro::agent::types::{StopReason, TaskExchange};
use maestro::config::{AppConfig, PartialConfig};
use maestro::error::AgentError;
use maestro::llm::{ChatBackend, Completion, CompletionRequest, Role};
use maestro::project::task_data::read_task_data;
use maestro::safety::SafetyLayer;
use maestro::search::Searcher;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ─── Helpers ──────────────────────────────────────────────────────────

/// Answers each call with the next scripted reply and records the requests.
struct ScriptedBackend {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
    stall_when_exhausted: bool,
}

impl ScriptedBackend {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
            stall_when_exhausted: false,
        }
    }

    /// Like `new`, but calls past the end of the script never return.
    fn stalling(replies: &[&str]) -> Self {
        Self {
            stall_when_exhausted: true,
            ..Self::new(replies)
        }
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Content of the last user message of request `i`.
    fn user_text(&self, i: usize) -> String {
        let requests = self.requests();
        let message = requests[i]
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .expect("request has a user message");
        message.content.clone()
    }
}

impl ChatBackend for ScriptedBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, AgentError> {
        self.requests.lock().unwrap().push(request);
        let next = self.replies.lock().unwrap().pop_front();
        let text = match next {
            Some(text) => text,
            None if self.stall_when_exhausted => std::future::pending().await,
            None => return Err(AgentError::LlmError("script exhausted".into())),
        };
        Ok(Completion {
            text,
            ..Default::default()
        })
    }
}

struct FixedSearcher {
    queries: Mutex<Vec<String>>,
}

impl Searcher for FixedSearcher {
    async fn search(&self, query: &str) -> Result<String, AgentError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok("FOUND: the answer is 42".to_string())
    }
}

fn config(dir: &Path, tweak: impl FnOnce(&mut PartialConfig)) -> AppConfig {
    let mut partial = PartialConfig {
        output_dir: Some(dir.to_path_buf()),
        orchestrator_model: Some("planner".into()),
        sub_agent_model: Some("worker".into()),
        ..Default::default()
    };
    tweak(&mut partial);
    partial.finalize()
}

const REFINED_PROJECT: &str = r#"Here is the result.

Project Name: **HelloApp**

<folder_structure>
{"main.py": null, "docs": {"notes.md": null}}
</folder_structure>

Filename: main.py
```python
print("hello")
```
"#;

// ============================================================
// Completion and materialization
// ============================================================

#[tokio::test]
async fn completes_on_sentinel_and_materializes_project() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), |_| {});
    let backend = ScriptedBackend::new(&[
        "Write a hello world script in Python.",
        "print('hello') does it.",
        "The task is complete: the script exists.",
        REFINED_PROJECT,
    ]);

    let outcome = Maestro::new(&config, &backend)
        .run("Build a hello app", None, Vec::new())
        .await
        .unwrap();

    assert!(outcome.completed());
    assert_eq!(outcome.summary.as_deref(), Some("the script exists."));
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.exchanges.len(), 1);
    assert_eq!(outcome.exchanges[0].result, "print('hello') does it.");

    let requests = backend.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[0].model, "planner");
    assert_eq!(requests[1].model, "worker");
    // The refiner defaults to the orchestrator's model.
    assert_eq!(requests[3].model, "planner");
    assert!(backend.user_text(0).ends_with("Previous sub-task results:\nNone"));
    assert!(backend.user_text(2).contains("print('hello') does it."));

    let project = tmp.path().join("HelloApp");
    assert_eq!(outcome.project_dir.as_deref(), Some(project.as_path()));
    let main_py = std::fs::read_to_string(project.join("main.py")).unwrap();
    assert_eq!(main_py, "print(\"hello\")");
    assert!(project.join("docs").is_dir());
    assert!(!project.join("docs/notes.md").exists(), "no code block, no file");

    let saved = read_task_data(tmp.path()).unwrap();
    assert_eq!(saved.objective, "Build a hello app");
    assert_eq!(saved.task_exchanges, outcome.exchanges);

    let log = std::fs::read_to_string(outcome.exchange_log.unwrap()).unwrap();
    assert!(log.starts_with("Objective: Build a hello app"));
    assert!(log.contains("Task 1:\nPrompt: Write a hello world script in Python."));
    assert!(log.ends_with(REFINED_PROJECT.trim()));

    assert!(tmp.path().join(".maestro-logs").is_dir());
}

#[tokio::test]
async fn refined_output_without_structure_creates_no_project() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), |_| {});
    let backend = ScriptedBackend::new(&["The task is complete: nothing to do", "A short essay."]);

    let outcome = Maestro::new(&config, &backend)
        .run("Write an essay", None, Vec::new())
        .await
        .unwrap();

    assert!(outcome.completed());
    assert!(outcome.exchanges.is_empty());
    assert_eq!(outcome.refined.as_deref(), Some("A short essay."));
    assert!(outcome.project_dir.is_none());
    assert!(outcome.exchange_log.is_some());
}

// ============================================================
// File content
// ============================================================

#[tokio::test]
async fn file_content_goes_only_to_the_first_round() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), |_| {});
    let backend = ScriptedBackend::new(&[
        "Summarize part one.",
        "Part one summary.",
        "Summarize part two.",
        "Part two summary.",
        "The task is complete: both parts summarized",
        "Final summary.",
    ]);

    Maestro::new(&config, &backend)
        .run("Summarize this", Some("FILE-BODY"), Vec::new())
        .await
        .unwrap();

    assert!(backend.user_text(0).contains("File content:\nFILE-BODY"));
    assert!(backend.user_text(1).ends_with("Summarize part one.\n\nFile content:\nFILE-BODY"));
    assert!(!backend.user_text(2).contains("FILE-BODY"));
    assert_eq!(backend.user_text(3), "Summarize part two.");
}

// ============================================================
// Empty replies and truncation
// ============================================================

#[tokio::test]
async fn empty_orchestrator_reply_is_retried() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), |c| c.empty_retry_limit = Some(3));
    let backend = ScriptedBackend::new(&["", "  \n", "The task is complete: fine", "Done."]);

    let outcome = Maestro::new(&config, &backend)
        .run("Anything", None, Vec::new())
        .await
        .unwrap();

    assert!(outcome.completed());
    assert_eq!(backend.requests().len(), 4);
}

#[tokio::test]
async fn exhausted_empty_retries_fail_the_run() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), |c| c.empty_retry_limit = Some(2));
    let backend = ScriptedBackend::new(&["", ""]);

    let err = Maestro::new(&config, &backend)
        .run("Anything", None, Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AgentError>(),
        Some(AgentError::EmptyResponse { attempts: 2, .. })
    ));
}

#[tokio::test]
async fn truncated_sub_agent_reply_is_continued() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), |c| {
        c.continuation_threshold = Some(10);
        c.max_continuations = Some(1);
    });
    let backend = ScriptedBackend::new(&[
        "Count.",
        "0123456789abc",
        "-rest",
        "The task is complete: counted",
        "ok",
    ]);

    let outcome = Maestro::new(&config, &backend)
        .run("Count things", None, Vec::new())
        .await
        .unwrap();

    assert_eq!(outcome.exchanges[0].result, "0123456789abc-rest");

    let continuation = &backend.requests()[2];
    let roles: Vec<Role> = continuation.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    assert_eq!(continuation.messages[1].content, "0123456789abc");
    assert_eq!(continuation.messages[2].content, CONTINUATION_PROMPT);
}

#[tokio::test]
async fn refined_output_is_continued_once() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), |c| {
        c.continuation_threshold = Some(10);
        c.max_continuations = Some(0);
    });
    let backend = ScriptedBackend::new(&[
        "Plan.",
        "short",
        "The task is complete: yes",
        "REFINED-PART-ONE",
        "REFINED-PART-TWO",
    ]);

    let outcome = Maestro::new(&config, &backend)
        .run("Write a long answer", None, Vec::new())
        .await
        .unwrap();

    assert_eq!(
        outcome.refined.as_deref(),
        Some("REFINED-PART-ONE\nREFINED-PART-TWO")
    );
    // The second part is also over the threshold but is not continued.
    let requests = backend.requests();
    assert_eq!(requests.len(), 5);

    let continuation = &requests[4];
    let roles: Vec<Role> = continuation.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    assert_eq!(continuation.messages[0].content, requests[3].messages[0].content);
    assert_eq!(continuation.messages[1].content, "REFINED-PART-ONE");
    assert_eq!(continuation.messages[2].content, CONTINUATION_PROMPT);
}

// ============================================================
// Bounds, resume, cancellation
// ============================================================

#[tokio::test]
async fn iteration_limit_still_refines() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), |c| c.max_iterations = Some(2));
    let backend = ScriptedBackend::new(&["step one", "r1", "step two", "r2", "refined anyway"]);

    let outcome = Maestro::new(&config, &backend)
        .run("Never ending", None, Vec::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::IterationLimit);
    assert!(!outcome.completed());
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.exchanges.len(), 2);
    assert_eq!(outcome.refined.as_deref(), Some("refined anyway"));
    assert!(backend.user_text(4).contains("r1\nr2"));
}

#[tokio::test]
async fn resumed_exchanges_seed_the_history() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), |_| {});
    let backend = ScriptedBackend::new(&["The task is complete: already done", "final"]);
    let resumed = vec![TaskExchange {
        prompt: "earlier step".into(),
        result: "earlier result".into(),
    }];

    let outcome = Maestro::new(&config, &backend)
        .run("Resume me", None, resumed)
        .await
        .unwrap();

    assert!(backend
        .user_text(0)
        .ends_with("Previous sub-task results:\nearlier result"));
    assert_eq!(outcome.exchanges.len(), 1);
    let log = std::fs::read_to_string(outcome.exchange_log.unwrap()).unwrap();
    assert!(log.contains("Prompt: earlier step"));
}

#[tokio::test]
async fn cancelled_run_skips_model_calls_and_refinement() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), |_| {});
    let backend = ScriptedBackend::new(&[]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = Maestro::new(&config, &backend)
        .with_cancellation(cancel)
        .run("Stop", None, Vec::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert!(outcome.refined.is_none());
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_refinement() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), |_| {});
    let backend = ScriptedBackend::stalling(&["The task is complete: done"]);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        Maestro::new(&config, &backend)
            .with_cancellation(cancel)
            .run("Stop while refining", None, Vec::new()),
    )
    .await
    .expect("run should return once cancelled")
    .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert!(outcome.refined.is_none());
    assert!(outcome.project_dir.is_none());
    assert!(outcome.exchange_log.is_none());
    // The orchestrator call and the stalled refine call.
    assert_eq!(backend.requests().len(), 2);
}

// ============================================================
// Retrieval augmentation
// ============================================================

#[tokio::test]
async fn search_results_reach_the_sub_agent() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), |_| {});
    let searcher = FixedSearcher {
        queries: Mutex::new(Vec::new()),
    };
    let backend = ScriptedBackend::new(&[
        "Find the answer.\n{\"search_query\": \"what is the answer\"}",
        "It is 42.",
        "The task is complete: answered",
        "42",
    ]);

    let outcome = Maestro::new(&config, &backend)
        .with_searcher(&searcher)
        .run("Answer the question", None, Vec::new())
        .await
        .unwrap();

    assert_eq!(*searcher.queries.lock().unwrap(), vec!["what is the answer"]);
    assert!(backend.user_text(0).contains("search_query"));
    let sub_agent_prompt = backend.user_text(1);
    assert!(sub_agent_prompt.starts_with("Find the answer."));
    assert!(!sub_agent_prompt.contains("{\"search_query\""));
    assert!(sub_agent_prompt.contains("Search Results:\nFOUND: the answer is 42"));
    assert_eq!(outcome.exchanges[0].prompt, "Find the answer.");
}

// ============================================================
// Code execution gating
// ============================================================

#[tokio::test]
async fn failing_generated_code_blocks_completion() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path(), |c| {
        c.max_iterations = Some(2);
        c.execution_enabled = Some(true);
    });
    let safety = SafetyLayer::new(&config).unwrap();
    let backend = ScriptedBackend::new(&[
        "Write the code that restarts the service.",
        "```python\nimport os\nos.system('sudo reboot')\n```",
        "The task is complete: Fix the code so it needs no root",
        "No code this time, just advice.",
        "refined",
    ]);

    let outcome = Maestro::new(&config, &backend)
        .with_safety(&safety)
        .run("Restart helper", None, Vec::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::IterationLimit);
    assert!(outcome.summary.is_none());
    assert_eq!(outcome.exchanges.len(), 2);
    assert!(outcome.exchanges[0].result.contains(EXECUTION_ERROR_MARKER));
    assert_eq!(outcome.exchanges[1].prompt, "Fix the code so it needs no root");

    // The failed attempt is not handed to later sub-agents.
    let second_sub_agent = &backend.requests()[3];
    assert!(!second_sub_agent.system.as_deref().unwrap_or_default().contains("sudo"));
    assert!(tmp.path().join(".maestro-logs/security.log").exists());
}
