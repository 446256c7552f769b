use std::io::{BufRead, Write};

use clap::Parser;
use tokio_util::sync::CancellationToken;

use maestro::agent::Maestro;
use maestro::agent::types::{RunOutcome, TaskExchange};
use maestro::cli::{Cli, Commands};
use maestro::config::{self, AppConfig};
use maestro::display;
use maestro::llm::Backend;
use maestro::project::objective::load_objective;
use maestro::project::task_data::{has_task_data, read_task_data};
use maestro::safety::SafetyLayer;
use maestro::search::WebSearcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries model output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!("Maestro starting");

    let config = config::load_config(&cli)?;
    tracing::info!(
        orchestrator = %config.orchestrator_model,
        sub_agent = %config.sub_agent_model,
        refiner = %config.refiner_model,
        backend = ?config.backend,
        output_dir = %config.output_dir.display(),
        "Config loaded"
    );

    match &cli.command {
        Commands::Run { prompt, .. } => {
            if prompt.is_none()
                && has_task_data(&config.output_dir)
                && ask("Found saved task data. Resume the previous objective? (y/n): ")?
                    .eq_ignore_ascii_case("y")
            {
                return resume(&config).await;
            }
            let input = match prompt {
                Some(p) => p.clone(),
                None => ask("Please enter your objective (optionally followed by a file path): ")?,
            };
            let objective = load_objective(&input).await?;
            if let Some(path) = &objective.file_path {
                tracing::info!(file = %path.display(), "Attached file to objective");
            }
            run(&config, &objective.text, objective.file_content.as_deref(), Vec::new()).await
        }
        Commands::Resume { .. } => resume(&config).await,
    }
}

async fn resume(config: &AppConfig) -> anyhow::Result<()> {
    let data = read_task_data(&config.output_dir)?;
    display::panel(
        "Resuming",
        &format!(
            "Objective: {}\nCompleted sub-tasks: {}",
            data.objective,
            data.task_exchanges.len()
        ),
        display::Tone::Info,
    );
    run(
        config,
        &data.objective,
        data.file_content.as_deref(),
        data.task_exchanges,
    )
    .await
}

async fn run(
    config: &AppConfig,
    objective: &str,
    file_content: Option<&str>,
    resumed: Vec<TaskExchange>,
) -> anyhow::Result<()> {
    let backend = Backend::from_config(config).await?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCtrl+C received, stopping after the current step...");
            signal_token.cancel();
        }
    });

    let safety = if config.execution_enabled {
        let safety = SafetyLayer::new(config)?;
        tracing::info!(
            scratch = %safety.workspace_root().display(),
            timeout_secs = config.execution_timeout_secs,
            blocklist_patterns = config.blocked_patterns.len(),
            "Code execution enabled"
        );
        Some(safety)
    } else {
        None
    };

    let mut maestro = Maestro::new(config, &backend).with_cancellation(cancel);
    if let Some(safety) = &safety {
        maestro = maestro.with_safety(safety);
    }

    let outcome = if config.search_enabled {
        let searcher = WebSearcher::from_config(config)?;
        maestro
            .with_searcher(&searcher)
            .run(objective, file_content, resumed)
            .await?
    } else {
        maestro.run(objective, file_content, resumed).await?
    };

    report(config, &outcome);
    Ok(())
}

fn report(config: &AppConfig, outcome: &RunOutcome) {
    // Streamed runs already printed the refined output.
    if let Some(refined) = outcome.refined.as_deref().filter(|_| !config.stream_output) {
        println!("\nRefined Final output:\n{refined}");
    }
    if !outcome.completed() {
        display::warn_line(&format!(
            "Stopped without completion ({:?}) after {} iterations.",
            outcome.stop_reason, outcome.iterations
        ));
    }
    if outcome.total_cost > 0.0 {
        eprintln!("Total cost: ${:.4}", outcome.total_cost);
    }
}

/// Prompt on stderr and read one trimmed line from stdin.
fn ask(question: &str) -> anyhow::Result<String> {
    eprint!("{question}");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
