//! The human-readable markdown record of a run: objective, every sub-task
//! prompt/result, and the refined output.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::objective::{sanitize, truncate};
use crate::agent::types::TaskExchange;

/// Characters of the sanitized objective kept in the log file name.
const NAME_CHARS: usize = 25;

/// `HH-MM-SS_{sanitized objective, first 25 chars}.md`
pub fn log_file_name(objective: &str, at: DateTime<Local>) -> String {
    let timestamp = at.format("%H-%M-%S");
    format!("{timestamp}_{}.md", truncate(&sanitize(objective), NAME_CHARS))
}

fn banner(title: &str) -> String {
    let rule = "=".repeat(40);
    format!("{rule} {title} {rule}\n\n")
}

pub fn render(objective: &str, exchanges: &[TaskExchange], refined_output: &str) -> String {
    let mut log = format!("Objective: {objective}\n\n");
    log.push_str(&banner("Task Breakdown"));
    for (i, exchange) in exchanges.iter().enumerate() {
        log.push_str(&format!("Task {}:\n", i + 1));
        log.push_str(&format!("Prompt: {}\n", exchange.prompt));
        log.push_str(&format!("Result: {}\n\n", exchange.result));
    }
    log.push_str(&banner("Refined Final Output"));
    log.push_str(refined_output);
    log
}

/// Render and write the exchange log into `dir`, returning its path.
pub fn write_exchange_log(
    dir: &Path,
    objective: &str,
    exchanges: &[TaskExchange],
    refined_output: &str,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(log_file_name(objective, Local::now()));
    std::fs::write(&path, render(objective, exchanges, refined_output))?;
    Ok(path)
}
