//! The sub-agent role: execute one sub-task prompt.

use super::call::{complete_non_empty, continue_while_truncated};
use super::prompts;
use super::types::{RoleOutput, SubTaskRecord};
use crate::display::{self, Tone};
use crate::error::AgentError;
use crate::llm::pricing::PriceTable;
use crate::llm::{ChatBackend, CompletionRequest, Message};

/// Returned without a model call when the orchestrator produced no prompt.
pub const EMPTY_PROMPT_RESULT: &str = "The sub-task prompt is empty. Please provide a valid prompt.";

pub struct SubAgent<'a, B> {
    backend: &'a B,
    model: String,
    max_tokens: u32,
    empty_retry_limit: u32,
    continuation_threshold: usize,
    max_continuations: u32,
    stream: bool,
    prices: &'a PriceTable,
}

impl<'a, B: ChatBackend> SubAgent<'a, B> {
    pub fn new(backend: &'a B, model: impl Into<String>, prices: &'a PriceTable) -> Self {
        Self {
            backend,
            model: model.into(),
            max_tokens: 4096,
            empty_retry_limit: 3,
            continuation_threshold: 4000,
            max_continuations: 2,
            stream: false,
            prices,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_empty_retry_limit(mut self, limit: u32) -> Self {
        self.empty_retry_limit = limit;
        self
    }

    pub fn with_continuation(mut self, threshold: usize, max_continuations: u32) -> Self {
        self.continuation_threshold = threshold;
        self.max_continuations = max_continuations;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Run `prompt` with the history of earlier sub-tasks as system context
    /// and optional search findings as an extra part.
    pub async fn execute(
        &self,
        prompt: &str,
        search_results: Option<&str>,
        previous_tasks: &[SubTaskRecord],
    ) -> Result<RoleOutput, AgentError> {
        if prompt.trim().is_empty() {
            display::panel(
                "Empty Sub-task Prompt",
                "Empty sub-task prompt received. Skipping API call.",
                Tone::Warning,
            );
            return Ok(RoleOutput {
                text: EMPTY_PROMPT_RESULT.to_string(),
                ..Default::default()
            });
        }

        let mut user = prompt.to_string();
        if let Some(results) = search_results {
            user.push('\n');
            user.push_str(&prompts::search_results_part(results));
        }

        let request = CompletionRequest::new(&self.model, self.max_tokens)
            .with_system(prompts::sub_agent_system(previous_tasks))
            .with_message(Message::user(user))
            .with_stream(self.stream);

        let first =
            complete_non_empty(self.backend, &request, self.empty_retry_limit, "sub-agent")
                .await?;
        let continued = continue_while_truncated(
            self.backend,
            &request,
            first,
            self.continuation_threshold,
            self.max_continuations,
            "",
        )
        .await?;

        let cost = self.prices.cost(&self.model, continued.usage);
        report_usage("Sub-agent", &continued.usage, cost);

        display::panel_with_subtitle(
            "Sub-agent Result",
            &continued.text,
            "Task completed, sending result to Orchestrator",
            Tone::Info,
        );

        Ok(RoleOutput {
            text: continued.text,
            usage: continued.usage,
            cost,
            continuations: continued.continuations,
        })
    }
}

/// Print token counts and cost when the provider reported them.
pub(crate) fn report_usage(role: &str, usage: &crate::llm::TokenUsage, cost: Option<f64>) {
    if let (Some(input), Some(output)) = (usage.input_tokens, usage.output_tokens) {
        eprintln!("Input Tokens: {input}, Output Tokens: {output}");
    }
    if let Some(cost) = cost {
        eprintln!("{role} Cost: ${cost:.4}");
    }
}
