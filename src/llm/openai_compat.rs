//! [`ChatBackend`] for local inference servers that speak the OpenAI chat
//! completions API (LM Studio, llama.cpp server, vLLM).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::backend::{ChatBackend, Completion, CompletionRequest, Role, TokenUsage};
use crate::error::AgentError;

/// Key sent when the server does not check keys (LM Studio ignores it).
const PLACEHOLDER_API_KEY: &str = "lm-studio";

pub struct OpenAiCompatBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

impl OpenAiCompatBackend {
    /// Build a client for `base_url` (e.g. `http://localhost:1234/v1`).
    /// `api_key` of `None` sends a placeholder key.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| AgentError::LlmError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.unwrap_or_else(|| PLACEHOLDER_API_KEY.to_string()),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn wire_messages(request: &CompletionRequest) -> Vec<WireMessage<'_>> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = &request.system {
        messages.push(WireMessage {
            role: "system",
            content: system,
        });
    }
    for msg in &request.messages {
        messages.push(WireMessage {
            role: match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &msg.content,
        });
    }
    messages
}

fn into_completion(body: WireResponse) -> Completion {
    let text = body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    let usage = body
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();
    Completion { text, usage }
}

impl ChatBackend for OpenAiCompatBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, AgentError> {
        let payload = WireRequest {
            model: &request.model,
            messages: wire_messages(&request),
            max_tokens: request.max_tokens,
        };

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::LlmError(format!("{}: {e}", self.endpoint())))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::LlmError(format!(
                "{} returned HTTP {status}: {body}",
                self.endpoint()
            )));
        }

        let body: WireResponse = resp
            .json()
            .await
            .map_err(|e| AgentError::LlmError(format!("malformed completion response: {e}")))?;

        let completion = into_completion(body);
        if request.stream {
            println!("{}", completion.text);
        }
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::backend::Message;

    #[test]
    fn system_prompt_becomes_first_wire_message() {
        let req = CompletionRequest::new("local-model", 64)
            .with_system("You are an orchestrator")
            .with_message(Message::user("plan"));
        let msgs = wire_messages(&req);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[1].role, "user");
        assert_eq!(msgs[1].content, "plan");
    }

    #[test]
    fn parses_openai_shaped_response() {
        let body: WireResponse = serde_json::from_str(
            r#"{
                "choices": [{"message": {"role": "assistant", "content": "done"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
            }"#,
        )
        .unwrap();
        let completion = into_completion(body);
        assert_eq!(completion.text, "done");
        assert_eq!(completion.usage.input_tokens, Some(12));
        assert_eq!(completion.usage.output_tokens, Some(3));
    }

    #[test]
    fn missing_choices_yield_empty_text() {
        let body: WireResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let completion = into_completion(body);
        assert!(completion.text.is_empty());
        assert_eq!(completion.usage, TokenUsage::default());
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let backend = OpenAiCompatBackend::new("http://localhost:1234/v1/", None).unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:1234/v1/chat/completions");
        assert_eq!(backend.api_key, PLACEHOLDER_API_KEY);
    }
}
