//! Runs the code a sub-agent wrote for coding sub-tasks and turns the outcome
//! into feedback for the orchestrator.
//!
//! Fenced `python`, `javascript` and `typescript` blocks are written into the
//! scratch directory and run with `python3` / `node` through the
//! [`SafetyLayer`]. A failing run yields feedback carrying
//! [`EXECUTION_ERROR_MARKER`], which keeps the loop from completing.

use std::sync::LazyLock;

use regex::Regex;

use crate::display::{self, Tone};
use crate::exec::ExecResult;
use crate::safety::SafetyLayer;

/// Present in a recorded result while generated code is still failing.
pub const EXECUTION_ERROR_MARKER: &str = "Error executing the generated code";

/// Output kept per block in the feedback text.
const MAX_OUTPUT_CHARS: usize = 4000;

static EXECUTABLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(python|py|javascript|js|typescript|ts)[ \t]*\r?\n(.*?)\r?\n```")
        .expect("executable block pattern is valid")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
}

impl Language {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "python" | "py" => Some(Self::Python),
            "javascript" | "js" => Some(Self::JavaScript),
            "typescript" | "ts" => Some(Self::TypeScript),
            _ => None,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::JavaScript => "js",
            Self::TypeScript => "ts",
        }
    }

    /// Interpreter command line, file name appended.
    fn interpreter(self) -> &'static str {
        match self {
            Self::Python => "python3",
            Self::JavaScript => "node",
            Self::TypeScript => "node --experimental-strip-types",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExecutableBlock {
    pub language: Language,
    pub code: String,
}

/// Whether a sub-task prompt asks for code.
pub fn is_coding_task(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    ["code", "coding", "programming"]
        .iter()
        .any(|word| lower.contains(word))
}

/// Runnable fenced blocks in `response`, in order. Other languages are skipped.
pub fn extract_blocks(response: &str) -> Vec<ExecutableBlock> {
    EXECUTABLE_BLOCK
        .captures_iter(response)
        .filter_map(|caps| {
            let language = Language::from_tag(&caps[1])?;
            Some(ExecutableBlock {
                language,
                code: caps[2].to_string(),
            })
        })
        .collect()
}

/// Result of running every block of one response.
#[derive(Clone, Debug)]
pub struct CodeRun {
    pub blocks: usize,
    pub succeeded: bool,
    /// Text recorded as the sub-task result.
    pub feedback: String,
}

pub struct CodingAgent<'a> {
    safety: &'a SafetyLayer,
}

impl<'a> CodingAgent<'a> {
    pub fn new(safety: &'a SafetyLayer) -> Self {
        Self { safety }
    }

    /// Run the blocks found in `response`. `None` when there is nothing to run.
    pub async fn run(&self, response: &str, iteration: u32) -> Option<CodeRun> {
        let blocks = extract_blocks(response);
        if blocks.is_empty() {
            display::panel(
                "Code Blocks Not Found",
                "No runnable code blocks found in the response.",
                Tone::Warning,
            );
            return None;
        }

        let mut outputs = Vec::new();
        let mut errors = Vec::new();
        for (i, block) in blocks.iter().enumerate() {
            let file_name = format!("task_{iteration}_{}.{}", i + 1, block.language.extension());
            match self.run_block(block, &file_name).await {
                Ok(result) if result.succeeded() => {
                    if !result.stdout.trim().is_empty() {
                        outputs.push(format!("{file_name}:\n{}", clip(&result.stdout)));
                    }
                }
                Ok(result) => errors.push(describe_failure(&file_name, &result)),
                Err(e) => errors.push(format!("{file_name}: {e:#}")),
            }
        }

        let run = if errors.is_empty() {
            let output = if outputs.is_empty() {
                "(no output)".to_string()
            } else {
                outputs.join("\n\n")
            };
            display::panel("Code Execution", &output, Tone::Success);
            CodeRun {
                blocks: blocks.len(),
                succeeded: true,
                feedback: format!("{response}\n\nCode execution output:\n{output}"),
            }
        } else {
            let feedback = format!(
                "{EXECUTION_ERROR_MARKER}:\n{}\n\nPlease review and fix the code before proceeding.",
                errors.join("\n\n")
            );
            display::panel("Code Execution Error", &feedback, Tone::Error);
            CodeRun {
                blocks: blocks.len(),
                succeeded: false,
                feedback,
            }
        };
        tracing::info!(
            iteration,
            blocks = run.blocks,
            succeeded = run.succeeded,
            "Generated code executed"
        );
        Some(run)
    }

    async fn run_block(&self, block: &ExecutableBlock, file_name: &str) -> anyhow::Result<ExecResult> {
        self.safety.check_source(&block.code)?;
        self.safety.write_file(file_name, &block.code)?;
        tracing::debug!(file = file_name, "Running generated code");
        self.safety
            .execute(&format!("{} {file_name}", block.language.interpreter()))
            .await
    }
}

fn describe_failure(file_name: &str, result: &ExecResult) -> String {
    if result.timed_out {
        return format!("{file_name}: timed out");
    }
    let code = result
        .exit_code
        .map_or("unknown".to_string(), |c| c.to_string());
    format!("{file_name} exited with code {code}:\n{}", clip(&result.stderr))
}

fn clip(text: &str) -> String {
    crate::project::objective::truncate(text.trim_end(), MAX_OUTPUT_CHARS)
}
