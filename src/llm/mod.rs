//! Model access: the [`ChatBackend`] seam, its concrete clients, Ollama
//! preflight and cost accounting.

pub mod backend;
pub mod genai_backend;
pub mod ollama;
pub mod openai_compat;
pub mod pricing;

pub use backend::{ChatBackend, Completion, CompletionRequest, Message, Role, TokenUsage};
pub use pricing::PriceTable;

use genai_backend::GenaiBackend;
use openai_compat::OpenAiCompatBackend;

use crate::config::{AppConfig, BackendKind};
use crate::error::AgentError;

/// The backend selected by configuration.
pub enum Backend {
    Genai(GenaiBackend),
    OpenAiCompat(OpenAiCompatBackend),
}

impl Backend {
    /// Build the configured backend. For [`BackendKind::Ollama`] this also
    /// runs the model preflight (and pulls) before returning.
    pub async fn from_config(config: &AppConfig) -> Result<Self, AgentError> {
        match config.backend {
            BackendKind::Genai => Ok(Backend::Genai(GenaiBackend::new())),
            BackendKind::Ollama => {
                let models = [
                    config.orchestrator_model.as_str(),
                    config.sub_agent_model.as_str(),
                    config.refiner_model.as_str(),
                ];
                ollama::ensure_models(&config.ollama_url, &models, config.auto_pull).await?;
                Ok(Backend::Genai(GenaiBackend::for_ollama(&config.ollama_url)))
            }
            BackendKind::OpenaiCompatible => {
                let api_key = config
                    .api_key_env
                    .as_deref()
                    .and_then(|var| std::env::var(var).ok());
                Ok(Backend::OpenAiCompat(OpenAiCompatBackend::new(
                    &config.base_url,
                    api_key,
                )?))
            }
        }
    }
}

impl ChatBackend for Backend {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, AgentError> {
        match self {
            Backend::Genai(b) => b.complete(request).await,
            Backend::OpenAiCompat(b) => b.complete(request).await,
        }
    }
}
