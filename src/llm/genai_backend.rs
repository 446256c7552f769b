//! [`ChatBackend`] over genai, which routes by model name (OpenAI, Anthropic,
//! Gemini, Groq, and Ollama for names no other adapter claims).

use std::io::Write;

use futures::StreamExt;
use genai::adapter::AdapterKind;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent};
use genai::resolver::{Endpoint, ServiceTargetResolver};
use genai::{Client, ModelIden, ServiceTarget};

use super::backend::{ChatBackend, Completion, CompletionRequest, Role, TokenUsage};
use crate::error::AgentError;

/// genai client wrapper. API keys come from the usual provider environment
/// variables (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`, ...).
#[derive(Default)]
pub struct GenaiBackend {
    client: Client,
}

impl GenaiBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send every model to the Ollama server at `ollama_url`, whatever
    /// adapter its name would otherwise select.
    pub fn for_ollama(ollama_url: &str) -> Self {
        let base_url = ollama_base_url(ollama_url);
        let resolver = ServiceTargetResolver::from_resolver_fn(
            move |target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
                let ServiceTarget { model, auth, .. } = target;
                Ok(ServiceTarget {
                    endpoint: Endpoint::from_owned(base_url.clone()),
                    auth,
                    model: ModelIden::new(AdapterKind::Ollama, model.model_name),
                })
            },
        );
        Self {
            client: Client::builder()
                .with_service_target_resolver(resolver)
                .build(),
        }
    }
}

/// genai joins adapter paths onto the endpoint, so it must end in `/`.
fn ollama_base_url(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}

fn to_chat_request(request: &CompletionRequest) -> ChatRequest {
    let mut chat_req = match &request.system {
        Some(system) => ChatRequest::from_system(system),
        None => ChatRequest::default(),
    };
    for msg in &request.messages {
        let message = match msg.role {
            Role::User => ChatMessage::user(&msg.content),
            Role::Assistant => ChatMessage::assistant(&msg.content),
        };
        chat_req = chat_req.append_message(message);
    }
    chat_req
}

impl ChatBackend for GenaiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, AgentError> {
        let chat_req = to_chat_request(&request);
        let chat_options = ChatOptions::default()
            .with_max_tokens(request.max_tokens)
            .with_capture_content(true)
            .with_capture_usage(true);

        let stream_res = self
            .client
            .exec_chat_stream(&request.model, chat_req, Some(&chat_options))
            .await
            .map_err(|e| AgentError::LlmError(format!("{}: {e}", request.model)))?;

        let mut stream = stream_res.stream;
        let mut streamed = String::new();
        let mut captured_text: Option<String> = None;
        let mut usage = TokenUsage::default();

        while let Some(event) = stream.next().await {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => {
                    if request.stream {
                        print!("{}", chunk.content);
                        std::io::stdout().flush().ok();
                    }
                    streamed.push_str(&chunk.content);
                }
                Ok(ChatStreamEvent::End(end)) => {
                    if let Some(text) = end.captured_first_text() {
                        captured_text = Some(text.to_string());
                    }
                    if let Some(u) = &end.captured_usage {
                        usage = TokenUsage {
                            input_tokens: u.prompt_tokens.map(|t| t.max(0) as u64),
                            output_tokens: u.completion_tokens.map(|t| t.max(0) as u64),
                        };
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(AgentError::LlmError(format!(
                        "{}: stream error: {e}",
                        request.model
                    )));
                }
            }
        }

        if request.stream && !streamed.is_empty() {
            println!();
        }

        let text = match captured_text {
            Some(text) if !text.is_empty() => text,
            _ => streamed,
        };

        tracing::debug!(
            model = %request.model,
            chars = text.len(),
            input_tokens = ?usage.input_tokens,
            output_tokens = ?usage.output_tokens,
            "genai completion finished"
        );

        Ok(Completion { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::backend::Message;

    #[test]
    fn chat_request_carries_system_and_turns() {
        let req = CompletionRequest::new("gpt-4o", 512)
            .with_system("be brief")
            .with_message(Message::user("hi"))
            .with_message(Message::assistant("hello"))
            .with_message(Message::user("continue"));

        let chat_req = to_chat_request(&req);
        assert_eq!(chat_req.system.as_deref(), Some("be brief"));
        assert_eq!(chat_req.messages.len(), 3);
        assert_eq!(chat_req.messages[1].role, genai::chat::ChatRole::Assistant);
    }

    #[test]
    fn ollama_base_url_has_one_trailing_slash() {
        assert_eq!(ollama_base_url("http://gpu-box:11434"), "http://gpu-box:11434/");
        assert_eq!(ollama_base_url("http://gpu-box:11434//"), "http://gpu-box:11434/");
    }

    #[tokio::test]
    async fn ollama_backend_targets_configured_server() {
        let backend = GenaiBackend::for_ollama("http://gpu-box:11434");
        let target = backend
            .client
            .resolve_service_target("gpt-4o-mini")
            .await
            .unwrap();
        assert_eq!(target.model.adapter_kind, AdapterKind::Ollama);
        assert_eq!(target.endpoint.base_url(), "http://gpu-box:11434/");
    }

    #[test]
    fn chat_request_without_system() {
        let req = CompletionRequest::new("gpt-4o", 512).with_message(Message::user("hi"));
        let chat_req = to_chat_request(&req);
        assert!(chat_req.system.is_none());
        assert_eq!(chat_req.messages.len(), 1);
    }
}
