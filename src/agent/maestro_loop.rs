//! The orchestration control loop.
//!
//! Each iteration asks the orchestrator for the next step. A sub-task goes
//! through optional web search, the sub-agent, and (for coding tasks with
//! execution enabled) the coding agent; the exchange is recorded and
//! `task_data.json` rewritten. The loop ends on the sentinel, at
//! `max_iterations`, or on cancellation. Then the refiner consolidates the
//! results, artifacts are materialized, and the exchange log is written.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::agent::coding_agent::{CodingAgent, EXECUTION_ERROR_MARKER, is_coding_task};
use crate::agent::logging::{LogEntry, RunLogger, now_iso};
use crate::agent::orchestrator::Orchestrator;
use crate::agent::prompts;
use crate::agent::refiner::Refiner;
use crate::agent::sub_agent::SubAgent;
use crate::agent::types::{OrchestratorStep, RunOutcome, StopReason, SubTaskRecord, TaskExchange};
use crate::config::AppConfig;
use crate::display::{self, Tone};
use crate::error::AgentError;
use crate::llm::{ChatBackend, PriceTable};
use crate::project::artifacts::Artifacts;
use crate::project::exchange_log::write_exchange_log;
use crate::project::materialize::materialize;
use crate::project::task_data::{TaskData, write_task_data};
use crate::safety::SafetyLayer;
use crate::search::Searcher;

/// Placeholder searcher type for runs without retrieval augmentation.
pub struct NoSearch;

impl Searcher for NoSearch {
    async fn search(&self, _query: &str) -> Result<String, AgentError> {
        Err(AgentError::SearchError("search is disabled".into()))
    }
}

/// Drives one objective from first orchestrator call to materialized output.
pub struct Maestro<'a, B, S> {
    config: &'a AppConfig,
    backend: &'a B,
    searcher: Option<&'a S>,
    safety: Option<&'a SafetyLayer>,
    prices: PriceTable,
    cancel: CancellationToken,
}

impl<'a, B: ChatBackend> Maestro<'a, B, NoSearch> {
    pub fn new(config: &'a AppConfig, backend: &'a B) -> Self {
        Self {
            config,
            backend,
            searcher: None,
            safety: None,
            prices: PriceTable::new(config.pricing.clone()),
            cancel: CancellationToken::new(),
        }
    }
}

impl<'a, B: ChatBackend, S: Searcher> Maestro<'a, B, S> {
    /// Enable retrieval augmentation. The orchestrator is asked for a
    /// `search_query` and sub-agents receive the findings.
    pub fn with_searcher<T: Searcher>(self, searcher: &'a T) -> Maestro<'a, B, T> {
        Maestro {
            config: self.config,
            backend: self.backend,
            searcher: Some(searcher),
            safety: self.safety,
            prices: self.prices,
            cancel: self.cancel,
        }
    }

    /// Run generated code for coding sub-tasks through `safety`.
    pub fn with_safety(mut self, safety: &'a SafetyLayer) -> Self {
        self.safety = Some(safety);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the loop for `objective`. `resumed` seeds the history with the
    /// exchanges of an earlier, interrupted run.
    pub async fn run(
        &self,
        objective: &str,
        file_content: Option<&str>,
        resumed: Vec<TaskExchange>,
    ) -> anyhow::Result<RunOutcome> {
        let config = self.config;
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut logger = match RunLogger::new(&config.output_dir, &run_id) {
            Ok(logger) => {
                tracing::info!(log = %logger.log_path().display(), "Run log opened");
                Some(logger)
            }
            Err(e) => {
                tracing::warn!("Run log disabled: {e}");
                None
            }
        };
        record(
            &mut logger,
            LogEntry::RunStart {
                timestamp: now_iso(),
                run_id,
                objective: objective.to_string(),
                orchestrator_model: config.orchestrator_model.clone(),
                sub_agent_model: config.sub_agent_model.clone(),
                refiner_model: config.refiner_model.clone(),
                resumed_exchanges: resumed.len(),
            },
        );

        let use_search = self.searcher.is_some();
        let orchestrator = Orchestrator::new(self.backend, &config.orchestrator_model, &self.prices)
            .with_max_tokens(config.max_tokens)
            .with_empty_retry_limit(config.empty_retry_limit)
            .with_search(use_search)
            .with_stream(config.stream_output);
        let sub_agent = SubAgent::new(self.backend, &config.sub_agent_model, &self.prices)
            .with_max_tokens(config.max_tokens)
            .with_empty_retry_limit(config.empty_retry_limit)
            .with_continuation(config.continuation_threshold, config.max_continuations)
            .with_stream(config.stream_output);

        let mut previous_results: Vec<String> =
            resumed.iter().map(|e| e.result.clone()).collect();
        let mut records: Vec<SubTaskRecord> = resumed
            .iter()
            .filter(|e| !e.result.contains(EXECUTION_ERROR_MARKER))
            .map(|e| SubTaskRecord {
                task: e.prompt.clone(),
                result: e.result.clone(),
            })
            .collect();
        // Only the most recent execution outcome gates completion.
        let mut execution_failing = resumed
            .last()
            .is_some_and(|e| e.result.contains(EXECUTION_ERROR_MARKER));
        let mut exchanges = resumed;

        let mut iteration = 0u32;
        let mut summary = None;
        let mut total_cost = 0.0;

        let stop_reason = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if iteration >= config.max_iterations {
                display::warn_line(&format!(
                    "Reached the iteration limit ({}); refining what we have.",
                    config.max_iterations
                ));
                break StopReason::IterationLimit;
            }
            iteration += 1;
            tracing::info!(iteration, "Orchestrator turn");

            // File content goes along until the first sub-task is recorded.
            let next = self.cancellable(orchestrator.next_step(
                objective,
                file_content.filter(|_| exchanges.is_empty()),
                &previous_results,
            ));
            let Some(next) = next.await else {
                break StopReason::Cancelled;
            };
            let (step, output) = next.inspect_err(|e| fail(&mut logger, iteration, e))?;
            total_cost += output.cost.unwrap_or(0.0);

            let (prompt, search_query) = match step {
                OrchestratorStep::Complete { summary: text } => {
                    record(
                        &mut logger,
                        LogEntry::OrchestratorTurn {
                            timestamp: now_iso(),
                            iteration,
                            complete: true,
                            content: output.text.clone(),
                            search_query: None,
                            cost: output.cost,
                        },
                    );
                    if !execution_failing {
                        summary = Some(text);
                        break StopReason::Completed;
                    }
                    display::panel(
                        "Refinement Needed",
                        "Code execution errors detected. Continuing refinement process.",
                        Tone::Warning,
                    );
                    record(
                        &mut logger,
                        LogEntry::CompletionBlocked {
                            timestamp: now_iso(),
                            iteration,
                        },
                    );
                    (text, None)
                }
                OrchestratorStep::SubTask {
                    prompt,
                    search_query,
                } => {
                    record(
                        &mut logger,
                        LogEntry::OrchestratorTurn {
                            timestamp: now_iso(),
                            iteration,
                            complete: false,
                            content: prompt.clone(),
                            search_query: search_query.clone(),
                            cost: output.cost,
                        },
                    );
                    (prompt, search_query)
                }
            };

            let search_results = match (search_query.as_deref(), self.searcher) {
                (Some(query), Some(searcher)) => {
                    let found = searcher.search(query).await;
                    record(
                        &mut logger,
                        LogEntry::Search {
                            timestamp: now_iso(),
                            iteration,
                            query: query.to_string(),
                            results: found.as_ref().ok().cloned(),
                            error: found.as_ref().err().map(|e| e.to_string()),
                        },
                    );
                    match found {
                        Ok(text) => Some(text),
                        Err(e) => {
                            display::warn_line(&format!("Search failed, continuing without it: {e}"));
                            None
                        }
                    }
                }
                _ => None,
            };

            let sub_prompt = match file_content {
                Some(content) if exchanges.is_empty() => {
                    prompts::with_file_content(&prompt, content)
                }
                _ => prompt.clone(),
            };

            let executed = self.cancellable(sub_agent.execute(
                &sub_prompt,
                search_results.as_deref(),
                &records,
            ));
            let Some(executed) = executed.await else {
                break StopReason::Cancelled;
            };
            let result = executed.inspect_err(|e| fail(&mut logger, iteration, e))?;
            total_cost += result.cost.unwrap_or(0.0);
            record(
                &mut logger,
                LogEntry::SubAgentResult {
                    timestamp: now_iso(),
                    iteration,
                    prompt: prompt.clone(),
                    result: result.text.clone(),
                    continuations: result.continuations,
                    input_tokens: result.usage.input_tokens,
                    output_tokens: result.usage.output_tokens,
                    cost: result.cost,
                },
            );

            let mut recorded = result.text;
            let mut share_with_sub_agents = true;
            if let Some(safety) = self.safety.filter(|_| is_coding_task(&prompt)) {
                if let Some(run) = CodingAgent::new(safety).run(&recorded, iteration).await {
                    record(
                        &mut logger,
                        LogEntry::CodeExecution {
                            timestamp: now_iso(),
                            iteration,
                            blocks: run.blocks,
                            succeeded: run.succeeded,
                            output: run.feedback.clone(),
                        },
                    );
                    execution_failing = !run.succeeded;
                    share_with_sub_agents = run.succeeded;
                    recorded = run.feedback;
                }
            }

            exchanges.push(TaskExchange {
                prompt: prompt.clone(),
                result: recorded.clone(),
            });
            previous_results.push(recorded.clone());
            if share_with_sub_agents {
                records.push(SubTaskRecord {
                    task: prompt,
                    result: recorded,
                });
            }

            let task_data = TaskData {
                objective: objective.to_string(),
                file_content: file_content.map(str::to_string),
                task_exchanges: exchanges.clone(),
            };
            if let Err(e) = write_task_data(&config.output_dir, &task_data) {
                display::warn_line(&format!("Could not save progress: {e}"));
                fail(&mut logger, iteration, &e);
            }
        };

        let mut outcome = RunOutcome {
            stop_reason,
            exchanges,
            summary,
            iterations: iteration,
            refined: None,
            project_dir: None,
            exchange_log: None,
            total_cost,
        };

        if outcome.stop_reason == StopReason::Cancelled {
            display::warn_line("Cancelled. Progress is saved; run `maestro resume` to continue.");
        } else {
            self.finish(objective, &previous_results, &mut outcome, &mut logger)
                .await?;
        }

        record(
            &mut logger,
            LogEntry::RunEnd {
                timestamp: now_iso(),
                iterations: outcome.iterations,
                reason: outcome.stop_reason.clone(),
                total_cost: outcome.total_cost,
            },
        );
        tracing::info!(
            iterations = outcome.iterations,
            reason = ?outcome.stop_reason,
            total_cost = outcome.total_cost,
            "Run finished"
        );
        Ok(outcome)
    }

    /// Refine, materialize, and write the exchange log.
    async fn finish(
        &self,
        objective: &str,
        results: &[String],
        outcome: &mut RunOutcome,
        logger: &mut Option<RunLogger>,
    ) -> anyhow::Result<()> {
        let config = self.config;
        let refiner = Refiner::new(self.backend, &config.refiner_model, &self.prices)
            .with_max_tokens(config.max_tokens)
            .with_empty_retry_limit(config.empty_retry_limit)
            .with_continuation_threshold(config.continuation_threshold)
            .with_stream(config.stream_output);

        let Some(refined) = self.cancellable(refiner.refine(objective, results)).await else {
            outcome.stop_reason = StopReason::Cancelled;
            display::warn_line(
                "Cancelled during refinement. Progress is saved; run `maestro resume` to continue.",
            );
            return Ok(());
        };
        let refined = refined.inspect_err(|e| fail(logger, outcome.iterations, e))?;
        outcome.total_cost += refined.cost.unwrap_or(0.0);
        record(
            logger,
            LogEntry::Refine {
                timestamp: now_iso(),
                content: refined.text.clone(),
                continuations: refined.continuations,
                cost: refined.cost,
            },
        );

        let artifacts = Artifacts::extract(&refined.text, objective);
        if let Some(e) = &artifacts.structure_error {
            display::panel(
                "Folder Structure Error",
                &format!("Error parsing folder structure JSON: {e}"),
                Tone::Error,
            );
        }
        if artifacts.is_empty() {
            tracing::info!("Refined output has no folder structure; nothing to materialize");
        } else {
            let report = materialize(&artifacts, &config.output_dir)?;
            record(
                logger,
                LogEntry::Artifacts {
                    timestamp: now_iso(),
                    project_dir: report.project_dir.display().to_string(),
                    created_files: report.created_files.len(),
                    created_dirs: report.created_dirs.len(),
                    missing_content: report.missing_content.clone(),
                    rejected: report.rejected.clone(),
                },
            );
            outcome.project_dir = Some(report.project_dir);
        }

        let log_path =
            write_exchange_log(&config.output_dir, objective, &outcome.exchanges, &refined.text)?;
        display::panel(
            "Exchange Log",
            &format!("Full exchange log saved to {}", log_path.display()),
            Tone::Info,
        );
        outcome.exchange_log = Some(log_path);
        outcome.refined = Some(refined.text);
        Ok(())
    }

    /// Await `fut` unless the run is cancelled first.
    async fn cancellable<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            out = fut => Some(out),
            _ = self.cancel.cancelled() => None,
        }
    }
}

fn record(logger: &mut Option<RunLogger>, event: LogEntry) {
    if let Some(logger) = logger.as_mut() {
        logger.record(event);
    }
}

fn fail(logger: &mut Option<RunLogger>, iteration: u32, error: &AgentError) {
    tracing::error!(iteration, "{error}");
    record(
        logger,
        LogEntry::Error {
            timestamp: now_iso(),
            iteration,
            message: error.to_string(),
        },
    );
}
