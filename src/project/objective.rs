//! Objective input handling: split an attached file path off the objective
//! text and derive filesystem-safe names from it.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::AgentError;

static FILE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[./\w]+\.\w+").expect("file path pattern is valid"));

static NON_WORD_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("non-word pattern is valid"));

/// An objective with the content of any file it referenced.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub text: String,
    pub file_path: Option<PathBuf>,
    pub file_content: Option<String>,
}

/// Find a file path inside `input`, if the input looks like it carries one.
///
/// Only inputs containing `/` are considered. The first token shaped like
/// `dir/name.ext` is the path and the objective is the text before it.
pub fn split_objective(input: &str) -> (String, Option<PathBuf>) {
    if !input.contains('/') {
        return (input.trim().to_string(), None);
    }
    match FILE_PATH.find_iter(input).find(|m| m.as_str().contains('/')) {
        Some(m) => {
            let text = input[..m.start()].trim().to_string();
            (text, Some(PathBuf::from(m.as_str())))
        }
        None => (input.trim().to_string(), None),
    }
}

/// Parse `input` and read the referenced file, if any.
pub async fn load_objective(input: &str) -> Result<Objective, AgentError> {
    let (text, file_path) = split_objective(input);
    let file_content = match &file_path {
        Some(path) => Some(tokio::fs::read_to_string(path).await.map_err(|e| {
            AgentError::ObjectiveFile {
                path: path.clone(),
                message: e.to_string(),
            }
        })?),
        None => None,
    };
    Ok(Objective {
        text,
        file_path,
        file_content,
    })
}

/// Replace every run of non-word characters with `_`.
pub fn sanitize(objective: &str) -> String {
    NON_WORD_RUN.replace_all(objective, "_").into_owned()
}

/// First `max_chars` characters of `s`.
pub fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
