use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// The TOML file structure for maestro.toml.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub models: Option<ModelsConfig>,
    pub backend: Option<BackendConfig>,
    #[serde(rename = "loop")]
    pub run_loop: Option<LoopConfig>,
    pub search: Option<SearchConfig>,
    pub execution: Option<ExecutionConfig>,
    pub output: Option<OutputConfig>,
    pub pricing: Option<HashMap<String, ModelPrice>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelsConfig {
    pub orchestrator: Option<String>,
    pub sub_agent: Option<String>,
    pub refiner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    pub kind: Option<BackendKind>,
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key (never the key itself).
    pub api_key_env: Option<String>,
    pub ollama_url: Option<String>,
    pub auto_pull: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LoopConfig {
    pub max_iterations: Option<u32>,
    pub max_tokens: Option<u32>,
    pub continuation_threshold: Option<usize>,
    pub max_continuations: Option<u32>,
    pub empty_retry_limit: Option<u32>,
    pub stream_output: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SearchConfig {
    pub enabled: Option<bool>,
    pub provider: Option<SearchProviderKind>,
    pub api_key_env: Option<String>,
    pub max_results: Option<usize>,
    pub rate_limit_secs: Option<f64>,
    /// Read the top hit's page when the provider gives no direct answer.
    pub fetch_top_result: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionConfig {
    pub enabled: Option<bool>,
    pub timeout_secs: Option<u64>,
    /// If specified, fully replaces the default blocklist.
    pub blocked_patterns: Option<Vec<BlocklistEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlocklistEntry {
    pub pattern: String,
    pub reason: String,
}

/// Price of a model in USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ModelPrice {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

/// Which client carries the chat requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Model-name routing through genai (OpenAI, Anthropic, Gemini, Groq, Ollama).
    Genai,
    /// genai against a local Ollama server, with model preflight and pulls.
    Ollama,
    /// Any server speaking the OpenAI chat completions API (LM Studio, vLLM, ...).
    OpenaiCompatible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchProviderKind {
    Duckduckgo,
    Brave,
    Tavily,
}

/// Fully-resolved runtime configuration. All fields have values.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub orchestrator_model: String,
    pub sub_agent_model: String,
    pub refiner_model: String,
    pub backend: BackendKind,
    pub base_url: String,
    pub api_key_env: Option<String>,
    pub ollama_url: String,
    pub auto_pull: bool,
    pub max_iterations: u32,
    pub max_tokens: u32,
    pub continuation_threshold: usize,
    pub max_continuations: u32,
    pub empty_retry_limit: u32,
    pub stream_output: bool,
    pub search_enabled: bool,
    pub search_provider: SearchProviderKind,
    pub search_api_key_env: Option<String>,
    pub search_max_results: usize,
    pub search_rate_limit_secs: f64,
    pub search_fetch_top_result: bool,
    pub execution_enabled: bool,
    pub execution_timeout_secs: u64,
    pub blocked_patterns: Vec<(String, String)>,
    pub output_dir: PathBuf,
    pub security_log_path: PathBuf,
    pub pricing: HashMap<String, ModelPrice>,
}

/// Partial config used during merge. All fields are Option so that
/// missing fields don't override lower-priority values.
#[derive(Debug, Clone, Default)]
pub struct PartialConfig {
    pub orchestrator_model: Option<String>,
    pub sub_agent_model: Option<String>,
    pub refiner_model: Option<String>,
    pub backend: Option<BackendKind>,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub ollama_url: Option<String>,
    pub auto_pull: Option<bool>,
    pub max_iterations: Option<u32>,
    pub max_tokens: Option<u32>,
    pub continuation_threshold: Option<usize>,
    pub max_continuations: Option<u32>,
    pub empty_retry_limit: Option<u32>,
    pub stream_output: Option<bool>,
    pub search_enabled: Option<bool>,
    pub search_provider: Option<SearchProviderKind>,
    pub search_api_key_env: Option<String>,
    pub search_max_results: Option<usize>,
    pub search_rate_limit_secs: Option<f64>,
    pub search_fetch_top_result: Option<bool>,
    pub execution_enabled: Option<bool>,
    pub execution_timeout_secs: Option<u64>,
    pub blocked_patterns: Option<Vec<(String, String)>>,
    pub output_dir: Option<PathBuf>,
    pub pricing: Option<HashMap<String, ModelPrice>>,
}

impl ConfigFile {
    /// Flatten the sectioned TOML layout into a mergeable PartialConfig.
    pub fn to_partial(self) -> PartialConfig {
        let mut partial = PartialConfig::default();

        if let Some(models) = self.models {
            partial.orchestrator_model = models.orchestrator;
            partial.sub_agent_model = models.sub_agent;
            partial.refiner_model = models.refiner;
        }
        if let Some(backend) = self.backend {
            partial.backend = backend.kind;
            partial.base_url = backend.base_url;
            partial.api_key_env = backend.api_key_env;
            partial.ollama_url = backend.ollama_url;
            partial.auto_pull = backend.auto_pull;
        }
        if let Some(run_loop) = self.run_loop {
            partial.max_iterations = run_loop.max_iterations;
            partial.max_tokens = run_loop.max_tokens;
            partial.continuation_threshold = run_loop.continuation_threshold;
            partial.max_continuations = run_loop.max_continuations;
            partial.empty_retry_limit = run_loop.empty_retry_limit;
            partial.stream_output = run_loop.stream_output;
        }
        if let Some(search) = self.search {
            partial.search_enabled = search.enabled;
            partial.search_provider = search.provider;
            partial.search_api_key_env = search.api_key_env;
            partial.search_max_results = search.max_results;
            partial.search_rate_limit_secs = search.rate_limit_secs;
            partial.search_fetch_top_result = search.fetch_top_result;
        }
        if let Some(execution) = self.execution {
            partial.execution_enabled = execution.enabled;
            partial.execution_timeout_secs = execution.timeout_secs;
            partial.blocked_patterns = execution.blocked_patterns.map(|entries| {
                entries
                    .into_iter()
                    .map(|e| (e.pattern, e.reason))
                    .collect()
            });
        }
        if let Some(output) = self.output {
            partial.output_dir = output.dir.map(PathBuf::from);
        }
        partial.pricing = self.pricing;

        partial
    }
}
