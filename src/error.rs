use std::path::PathBuf;

/// Errors related to configuration loading and parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config at {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid config value for `{key}`: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors related to safety guardrails (command filtering, path containment).
#[derive(Debug, thiserror::Error)]
pub enum GuardrailError {
    #[error("Command blocked: `{command}` - {reason}")]
    CommandBlocked { command: String, reason: String },

    #[error("Write outside project: `{path}` is not within `{root}`")]
    WriteOutsideRoot { path: PathBuf, root: PathBuf },
}

/// Errors related to shell command execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Failed to spawn shell process: {0}")]
    SpawnFailed(String),

    #[error("Process execution failed: {0}")]
    ProcessFailed(String),
}

/// Errors related to the orchestration loop and its model calls.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Ollama not reachable at {url}: {message}")]
    OllamaUnavailable { url: String, message: String },

    #[error("Model '{model}' not available in Ollama: {message}")]
    ModelNotAvailable { model: String, message: String },

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("{role} returned an empty response after {attempts} attempts")]
    EmptyResponse { role: String, attempts: u32 },

    #[error("Objective file not readable at {path}: {message}")]
    ObjectiveFile { path: PathBuf, message: String },

    #[error("Search error: {0}")]
    SearchError(String),

    #[error("Task data error: {0}")]
    TaskDataError(String),

    #[error("Run logging error: {0}")]
    LoggingError(String),
}
