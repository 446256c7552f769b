use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "maestro",
    version,
    about = "Orchestrator / sub-agent / refiner loop for LLM task decomposition"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a new objective
    Run {
        /// Objective, optionally followed by a path to a text file to include
        #[arg(short, long)]
        prompt: Option<String>,

        /// Model used by the orchestrator (e.g. "claude-3-opus-20240229", "llama3:70b-instruct")
        #[arg(long)]
        orchestrator_model: Option<String>,

        /// Model used by sub-agents
        #[arg(long)]
        sub_agent_model: Option<String>,

        /// Model used by the refiner
        #[arg(long)]
        refiner_model: Option<String>,

        /// Directory receiving generated projects, logs and task data
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Augment sub-agents with web search results
        #[arg(long)]
        search: bool,

        /// Execute generated python/javascript code blocks locally
        #[arg(long)]
        execute_code: bool,

        /// Upper bound on orchestrator iterations
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Path to config file (overrides default search)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Resume the last objective from its saved task data
    Resume {
        /// Directory holding task_data.json
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Path to config file (overrides default search)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
