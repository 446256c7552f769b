use super::schema::{AppConfig, BackendKind, PartialConfig, SearchProviderKind};
use crate::safety::defaults::default_blocklist;
use std::path::PathBuf;

impl PartialConfig {
    /// Merge self with a lower-priority fallback.
    /// Self's non-None values take precedence.
    /// For blocked_patterns: REPLACE semantics (if self has Some, use it entirely).
    /// For pricing: tables are unioned, self's entries win per model.
    pub fn with_fallback(self, fallback: PartialConfig) -> PartialConfig {
        let pricing = match (self.pricing, fallback.pricing) {
            (Some(mine), Some(mut theirs)) => {
                theirs.extend(mine);
                Some(theirs)
            }
            (mine, theirs) => mine.or(theirs),
        };

        PartialConfig {
            orchestrator_model: self.orchestrator_model.or(fallback.orchestrator_model),
            sub_agent_model: self.sub_agent_model.or(fallback.sub_agent_model),
            refiner_model: self.refiner_model.or(fallback.refiner_model),
            backend: self.backend.or(fallback.backend),
            base_url: self.base_url.or(fallback.base_url),
            api_key_env: self.api_key_env.or(fallback.api_key_env),
            ollama_url: self.ollama_url.or(fallback.ollama_url),
            auto_pull: self.auto_pull.or(fallback.auto_pull),
            max_iterations: self.max_iterations.or(fallback.max_iterations),
            max_tokens: self.max_tokens.or(fallback.max_tokens),
            continuation_threshold: self
                .continuation_threshold
                .or(fallback.continuation_threshold),
            max_continuations: self.max_continuations.or(fallback.max_continuations),
            empty_retry_limit: self.empty_retry_limit.or(fallback.empty_retry_limit),
            stream_output: self.stream_output.or(fallback.stream_output),
            search_enabled: self.search_enabled.or(fallback.search_enabled),
            search_provider: self.search_provider.or(fallback.search_provider),
            search_api_key_env: self.search_api_key_env.or(fallback.search_api_key_env),
            search_max_results: self.search_max_results.or(fallback.search_max_results),
            search_rate_limit_secs: self
                .search_rate_limit_secs
                .or(fallback.search_rate_limit_secs),
            search_fetch_top_result: self
                .search_fetch_top_result
                .or(fallback.search_fetch_top_result),
            execution_enabled: self.execution_enabled.or(fallback.execution_enabled),
            execution_timeout_secs: self
                .execution_timeout_secs
                .or(fallback.execution_timeout_secs),
            blocked_patterns: self.blocked_patterns.or(fallback.blocked_patterns),
            output_dir: self.output_dir.or(fallback.output_dir),
            pricing,
        }
    }

    /// Convert to AppConfig, filling any remaining gaps with defaults.
    pub fn finalize(self) -> AppConfig {
        let output_dir = self.output_dir.unwrap_or_else(|| PathBuf::from("."));
        let security_log_path = output_dir.join(".maestro-logs").join("security.log");
        let orchestrator_model = self
            .orchestrator_model
            .unwrap_or_else(|| "claude-3-opus-20240229".to_string());

        AppConfig {
            sub_agent_model: self
                .sub_agent_model
                .unwrap_or_else(|| "claude-3-haiku-20240307".to_string()),
            refiner_model: self
                .refiner_model
                .unwrap_or_else(|| orchestrator_model.clone()),
            orchestrator_model,
            backend: self.backend.unwrap_or(BackendKind::Genai),
            base_url: self
                .base_url
                .unwrap_or_else(|| "http://localhost:1234/v1".to_string()),
            api_key_env: self.api_key_env,
            ollama_url: self
                .ollama_url
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            auto_pull: self.auto_pull.unwrap_or(true),
            max_iterations: self.max_iterations.unwrap_or(25),
            max_tokens: self.max_tokens.unwrap_or(4096),
            continuation_threshold: self.continuation_threshold.unwrap_or(4000),
            max_continuations: self.max_continuations.unwrap_or(2),
            empty_retry_limit: self.empty_retry_limit.unwrap_or(3),
            stream_output: self.stream_output.unwrap_or(true),
            search_enabled: self.search_enabled.unwrap_or(false),
            search_provider: self
                .search_provider
                .unwrap_or(SearchProviderKind::Duckduckgo),
            search_api_key_env: self.search_api_key_env,
            search_max_results: self.search_max_results.unwrap_or(5),
            search_rate_limit_secs: self.search_rate_limit_secs.unwrap_or(1.0),
            search_fetch_top_result: self.search_fetch_top_result.unwrap_or(true),
            execution_enabled: self.execution_enabled.unwrap_or(false),
            execution_timeout_secs: self.execution_timeout_secs.unwrap_or(60),
            blocked_patterns: self.blocked_patterns.unwrap_or_else(default_blocklist),
            output_dir,
            security_log_path,
            pricing: self.pricing.unwrap_or_default(),
        }
    }
}
