//! The refiner role: consolidate every sub-task result into the deliverable.

use super::call::{complete_non_empty, continue_while_truncated};
use super::prompts;
use super::sub_agent::report_usage;
use super::types::RoleOutput;
use crate::display::{self, Tone};
use crate::error::AgentError;
use crate::llm::pricing::PriceTable;
use crate::llm::{ChatBackend, Completion, CompletionRequest, Message};

pub struct Refiner<'a, B> {
    backend: &'a B,
    model: String,
    max_tokens: u32,
    empty_retry_limit: u32,
    continuation_threshold: usize,
    stream: bool,
    prices: &'a PriceTable,
}

impl<'a, B: ChatBackend> Refiner<'a, B> {
    pub fn new(backend: &'a B, model: impl Into<String>, prices: &'a PriceTable) -> Self {
        Self {
            backend,
            model: model.into(),
            max_tokens: 4096,
            empty_retry_limit: 3,
            continuation_threshold: 4000,
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

    pub fn with_continuation_threshold(mut self, threshold: usize) -> Self {
        self.continuation_threshold = threshold;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Produce the refined output. A truncated reply is continued once.
    pub async fn refine(
        &self,
        objective: &str,
        sub_task_results: &[String],
    ) -> Result<RoleOutput, AgentError> {
        eprintln!("\nCalling the refiner to provide the refined final output for your objective:");

        let request = CompletionRequest::new(&self.model, self.max_tokens)
            .with_message(Message::user(prompts::refiner_prompt(
                objective,
                sub_task_results,
            )))
            .with_stream(self.stream);

        let first =
            complete_non_empty(self.backend, &request, self.empty_retry_limit, "refiner").await?;
        let continued = continue_while_truncated(
            self.backend,
            &request,
            Completion {
                text: first.text.trim().to_string(),
                usage: first.usage,
            },
            self.continuation_threshold,
            1,
            "\n",
        )
        .await?;

        let cost = self.prices.cost(&self.model, continued.usage);
        report_usage("Refine", &continued.usage, cost);
        display::panel("Final Output", &continued.text, Tone::Success);

        Ok(RoleOutput {
            text: continued.text,
            usage: continued.usage,
            cost,
            continuations: continued.continuations,
        })
    }
}
