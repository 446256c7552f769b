//! The orchestrator role: plan the next sub-task or declare the objective done.

use std::sync::LazyLock;

use regex::Regex;

use super::call::complete_non_empty;
use super::prompts::{self, SENTINEL};
use super::types::{OrchestratorStep, RoleOutput};
use crate::display::{self, Tone};
use crate::error::AgentError;
use crate::llm::pricing::PriceTable;
use crate::llm::{ChatBackend, CompletionRequest, Message};

/// A `{"search_query": "..."}` object anywhere in the reply.
static SEARCH_QUERY_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\{\s*"search_query"\s*:\s*"(?:[^"\\]|\\.)*"\s*\}"#)
        .expect("search query pattern is valid")
});

pub struct Orchestrator<'a, B> {
    backend: &'a B,
    model: String,
    max_tokens: u32,
    empty_retry_limit: u32,
    use_search: bool,
    stream: bool,
    prices: &'a PriceTable,
}

impl<'a, B: ChatBackend> Orchestrator<'a, B> {
    pub fn new(backend: &'a B, model: impl Into<String>, prices: &'a PriceTable) -> Self {
        Self {
            backend,
            model: model.into(),
            max_tokens: 4096,
            empty_retry_limit: 3,
            use_search: false,
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

    pub fn with_search(mut self, use_search: bool) -> Self {
        self.use_search = use_search;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Ask the planning model for the next step.
    pub async fn next_step(
        &self,
        objective: &str,
        file_content: Option<&str>,
        previous_results: &[String],
    ) -> Result<(OrchestratorStep, RoleOutput), AgentError> {
        display::panel(
            "Orchestrator",
            "Calling Orchestrator for your objective",
            Tone::Info,
        );
        if let Some(content) = file_content {
            display::panel("File Content", content, Tone::Info);
        }

        let mut user = prompts::orchestrator_prompt(objective, file_content, previous_results);
        if self.use_search {
            user.push_str("\n\n");
            user.push_str(prompts::search_query_addendum());
        }

        let request = CompletionRequest::new(&self.model, self.max_tokens)
            .with_system(prompts::ORCHESTRATOR_SYSTEM)
            .with_message(Message::user(user))
            .with_stream(self.stream);

        let completion =
            complete_non_empty(self.backend, &request, self.empty_retry_limit, "orchestrator")
                .await?;
        let text = completion.text.trim().to_string();
        let step = parse_response(&text, self.use_search);

        match &step {
            OrchestratorStep::Complete { summary } => {
                display::panel("Task Complete", summary, Tone::Success);
            }
            OrchestratorStep::SubTask {
                prompt,
                search_query,
            } => {
                if let Some(query) = search_query {
                    display::panel("Search Query", query, Tone::Info);
                }
                display::panel_with_subtitle(
                    "Orchestrator",
                    prompt,
                    "Sending task to sub-agent",
                    Tone::Success,
                );
            }
        }

        let cost = self.prices.cost(&self.model, completion.usage);
        Ok((
            step,
            RoleOutput {
                text,
                usage: completion.usage,
                cost,
                continuations: 0,
            },
        ))
    }
}

/// Interpret an orchestrator reply.
///
/// The sentinel anywhere in the text means completion. Otherwise the reply is
/// the next sub-task prompt; with search on, a `search_query` JSON object is
/// lifted out of it.
pub fn parse_response(text: &str, use_search: bool) -> OrchestratorStep {
    if text.contains(SENTINEL) {
        return OrchestratorStep::Complete {
            summary: text.replace(SENTINEL, "").trim().to_string(),
        };
    }

    let mut prompt = text.trim().to_string();
    let mut search_query = None;

    if use_search {
        if let Some(m) = SEARCH_QUERY_JSON.find(text) {
            match serde_json::from_str::<serde_json::Value>(m.as_str()) {
                Ok(value) => {
                    search_query = value["search_query"]
                        .as_str()
                        .map(str::trim)
                        .filter(|q| !q.is_empty())
                        .map(str::to_string);
                    prompt = text.replacen(m.as_str(), "", 1).trim().to_string();
                }
                Err(e) => {
                    tracing::warn!("Skipping search query extraction: {e}");
                    display::panel(
                        "JSON Parsing Error",
                        &format!("Error parsing JSON: {e}\nSkipping search query extraction."),
                        Tone::Error,
                    );
                }
            }
        } else {
            tracing::debug!("Orchestrator reply carried no search query");
        }
    }

    OrchestratorStep::SubTask {
        prompt,
        search_query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_anywhere_completes() {
        let step = parse_response("Looks good.\nThe task is complete: all done", false);
        assert_eq!(
            step,
            OrchestratorStep::Complete {
                summary: "Looks good.\n all done".to_string()
            }
        );
    }

    #[test]
    fn plain_reply_is_next_sub_task() {
        let step = parse_response("  Write the parser module.  ", true);
        assert_eq!(
            step,
            OrchestratorStep::SubTask {
                prompt: "Write the parser module.".to_string(),
                search_query: None,
            }
        );
    }

    #[test]
    fn search_query_is_lifted_out_of_prompt() {
        let text = "Research the API.\n{\"search_query\": \"tokio select macro docs\"}";
        let step = parse_response(text, true);
        assert_eq!(
            step,
            OrchestratorStep::SubTask {
                prompt: "Research the API.".to_string(),
                search_query: Some("tokio select macro docs".to_string()),
            }
        );
    }

    #[test]
    fn search_json_left_alone_when_search_disabled() {
        let text = "Do it {\"search_query\": \"q\"}";
        match parse_response(text, false) {
            OrchestratorStep::SubTask {
                prompt,
                search_query,
            } => {
                assert_eq!(prompt, text);
                assert!(search_query.is_none());
            }
            other => panic!("expected sub-task, got {other:?}"),
        }
    }

    #[test]
    fn code_braces_do_not_confuse_query_extraction() {
        let text = "Fix `fn main() { println!(\"hi\"); }`\n{\"search_query\": \"rust println\"}";
        match parse_response(text, true) {
            OrchestratorStep::SubTask {
                prompt,
                search_query,
            } => {
                assert_eq!(search_query.as_deref(), Some("rust println"));
                assert!(prompt.contains("fn main()"));
                assert!(!prompt.contains("search_query"));
            }
            other => panic!("expected sub-task, got {other:?}"),
        }
    }

    #[test]
    fn escaped_quotes_in_query_survive() {
        let text = r#"{"search_query": "what does \"async fn\" desugar to"}"#;
        match parse_response(text, true) {
            OrchestratorStep::SubTask { search_query, .. } => {
                assert_eq!(
                    search_query.as_deref(),
                    Some("what does \"async fn\" desugar to")
                );
            }
            other => panic!("expected sub-task, got {other:?}"),
        }
    }
}
