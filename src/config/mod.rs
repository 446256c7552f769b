pub mod merge;
pub mod schema;

pub use schema::*;

use crate::cli::{Cli, Commands};
use crate::error::ConfigError;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Load configuration by merging global, output-directory, and CLI sources.
/// Precedence: CLI > output-dir config > global config (or `--config`) > defaults.
///
/// Missing config files are handled gracefully (defaults apply). A file named
/// explicitly with `--config` must exist and parse.
pub fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    // Layer 1: explicit --config file, or the global config.
    let base = match cli_config_path(cli) {
        Some(path) => load_explicit_config(path)?,
        None => load_global_config(),
    };

    // Determine the output dir from CLI or base config, for loading its config.
    let output_dir = cli_output_dir(cli)
        .or_else(|| base.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    // Layer 2: output-dir config (output_dir/maestro.toml)
    let local = load_toml_file(&output_dir.join("maestro.toml")).unwrap_or_default();

    // Layer 3: CLI args
    let cli_partial = cli_to_partial(cli);

    let config = cli_partial
        .with_fallback(local)
        .with_fallback(base)
        .finalize();

    if config.max_iterations == 0 {
        return Err(ConfigError::InvalidValue {
            key: "loop.max_iterations".into(),
            message: "must be at least 1".into(),
        }
        .into());
    }

    if !config.search_rate_limit_secs.is_finite() || config.search_rate_limit_secs < 0.0 {
        return Err(ConfigError::InvalidValue {
            key: "search.rate_limit_secs".into(),
            message: format!(
                "must be a finite number of seconds, got {}",
                config.search_rate_limit_secs
            ),
        }
        .into());
    }

    Ok(config)
}

/// Load the global config from the platform-specific config directory.
fn load_global_config() -> PartialConfig {
    match global_config_path() {
        Some(p) => load_toml_file(&p).unwrap_or_default(),
        None => {
            tracing::debug!("Could not determine global config directory");
            PartialConfig::default()
        }
    }
}

/// Load a config file the user named on the command line. Unlike the
/// implicit layers, failures here are errors.
fn load_explicit_config(path: &Path) -> Result<PartialConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let file: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(file.to_partial())
}

/// Load and parse a TOML config file into a PartialConfig.
/// Returns None on file-not-found; logs parse errors and returns None.
fn load_toml_file(path: &Path) -> Option<PartialConfig> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            match toml::from_str::<ConfigFile>(&contents)
                .context(format!("Failed to parse {}", path.display()))
            {
                Ok(config_file) => {
                    tracing::info!("Loaded config from {}", path.display());
                    Some(config_file.to_partial())
                }
                Err(e) => {
                    tracing::warn!("Config parse error: {:#}", e);
                    None
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            None
        }
        Err(e) => {
            tracing::warn!("Failed to read config at {}: {}", path.display(), e);
            None
        }
    }
}

/// Resolve the platform-specific global config path.
/// Linux: ~/.config/maestro/maestro.toml
/// macOS: ~/Library/Application Support/maestro/maestro.toml
fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "maestro")
        .map(|dirs| dirs.config_dir().join("maestro.toml"))
}

fn cli_config_path(cli: &Cli) -> Option<&Path> {
    match &cli.command {
        Commands::Run { config, .. } | Commands::Resume { config, .. } => config.as_deref(),
    }
}

fn cli_output_dir(cli: &Cli) -> Option<PathBuf> {
    match &cli.command {
        Commands::Run { output_dir, .. } | Commands::Resume { output_dir, .. } => {
            output_dir.clone()
        }
    }
}

/// Convert CLI arguments to a PartialConfig for merging.
///
/// Boolean flags only ever switch features on; leaving them off defers to
/// the config files.
fn cli_to_partial(cli: &Cli) -> PartialConfig {
    match &cli.command {
        Commands::Run {
            orchestrator_model,
            sub_agent_model,
            refiner_model,
            output_dir,
            search,
            execute_code,
            max_iterations,
            ..
        } => PartialConfig {
            orchestrator_model: orchestrator_model.clone(),
            sub_agent_model: sub_agent_model.clone(),
            refiner_model: refiner_model.clone(),
            output_dir: output_dir.clone(),
            search_enabled: search.then_some(true),
            execution_enabled: execute_code.then_some(true),
            max_iterations: *max_iterations,
            ..Default::default()
        },
        Commands::Resume { output_dir, .. } => PartialConfig {
            output_dir: output_dir.clone(),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn sectioned_toml_flattens_into_partial() {
        let toml_src = r#"
            [models]
            orchestrator = "llama3:70b-instruct"
            sub_agent = "llama3:instruct"

            [backend]
            kind = "ollama"
            auto_pull = false

            [loop]
            max_iterations = 7
            continuation_threshold = 3000

            [search]
            enabled = true
            provider = "tavily"
            api_key_env = "TAVILY_API_KEY"

            [execution]
            blocked_patterns = [{ pattern = "curl", reason = "no network" }]

            [pricing."llama3:instruct"]
            input_per_mtok = 0.0
            output_per_mtok = 0.0
        "#;
        let file: ConfigFile = toml::from_str(toml_src).unwrap();
        let partial = file.to_partial();

        assert_eq!(partial.orchestrator_model.as_deref(), Some("llama3:70b-instruct"));
        assert_eq!(partial.backend, Some(BackendKind::Ollama));
        assert_eq!(partial.auto_pull, Some(false));
        assert_eq!(partial.max_iterations, Some(7));
        assert_eq!(partial.continuation_threshold, Some(3000));
        assert_eq!(partial.search_provider, Some(SearchProviderKind::Tavily));
        assert_eq!(
            partial.blocked_patterns,
            Some(vec![("curl".to_string(), "no network".to_string())])
        );
        assert!(partial.pricing.unwrap().contains_key("llama3:instruct"));
    }

    #[test]
    fn openai_compatible_kind_parses_kebab_case() {
        let file: ConfigFile = toml::from_str("[backend]\nkind = \"openai-compatible\"").unwrap();
        assert_eq!(file.to_partial().backend, Some(BackendKind::OpenaiCompatible));
    }

    #[test]
    fn cli_flags_override_output_dir_config() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("maestro.toml"),
            "[models]\norchestrator = \"from-file\"\nsub_agent = \"sub-from-file\"\n",
        )
        .unwrap();

        let out = tmp.path().to_str().unwrap().to_string();
        let cli = Cli::parse_from([
            "maestro",
            "run",
            "--output-dir",
            &out,
            "--orchestrator-model",
            "from-cli",
            "--search",
        ]);
        let config = load_config(&cli).unwrap();

        assert_eq!(config.orchestrator_model, "from-cli");
        assert_eq!(config.sub_agent_model, "sub-from-file");
        assert!(config.search_enabled);
        assert_eq!(config.output_dir, tmp.path());
    }

    #[test]
    fn explicit_config_must_exist() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.toml");
        let cli = Cli::parse_from([
            "maestro",
            "resume",
            "--config",
            missing.to_str().unwrap(),
        ]);
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().to_str().unwrap().to_string();
        let cli = Cli::parse_from([
            "maestro",
            "run",
            "--output-dir",
            &out,
            "--max-iterations",
            "0",
        ]);
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn non_finite_rate_limit_is_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("maestro.toml"),
            "[search]\nrate_limit_secs = inf\n",
        )
        .unwrap();
        let out = tmp.path().to_str().unwrap().to_string();
        let cli = Cli::parse_from(["maestro", "run", "--output-dir", &out]);
        let err = load_config(&cli).unwrap_err();
        assert!(err.to_string().contains("search.rate_limit_secs"), "{err}");
    }
}
