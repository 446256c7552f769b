//! Best-effort extraction of project artifacts from the refiner's free text:
//! project name, folder tree, and per-file code blocks.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::objective::sanitize;

static PROJECT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Project Name:(.*)").expect("project name pattern is valid"));

static FOLDER_STRUCTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<folder_structure>(.*?)</folder_structure>")
        .expect("folder structure pattern is valid")
});

static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Filename:\s*`?([^\s`*]+)`?\**\s*```[\w+-]*\n(.*?)\n```")
        .expect("code block pattern is valid")
});

/// A node of the generated project tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Dir(BTreeMap<String, Node>),
    File,
}

/// A file name and the code the refiner gave for it.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub filename: String,
    pub code: String,
}

/// Everything pulled out of one refined output.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub project_name: String,
    pub tree: BTreeMap<String, Node>,
    pub code_blocks: Vec<CodeBlock>,
    /// Set when a `<folder_structure>` block was present but not valid JSON.
    pub structure_error: Option<String>,
}

impl Artifacts {
    /// Extract artifacts, naming the project after `sanitized_objective` when
    /// the output names none.
    pub fn extract(refined: &str, objective: &str) -> Self {
        let (tree, structure_error) = match folder_structure(refined) {
            Ok(tree) => (tree, None),
            Err(e) => (BTreeMap::new(), Some(e)),
        };
        Self {
            project_name: project_name(refined).unwrap_or_else(|| sanitize(objective)),
            tree,
            code_blocks: code_blocks(refined),
            structure_error,
        }
    }

    /// Whether there is anything to write to disk.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

/// The first `Project Name:` line, stripped of markdown emphasis and quotes.
pub fn project_name(refined: &str) -> Option<String> {
    let caps = PROJECT_NAME.captures(refined)?;
    let name = caps[1]
        .trim()
        .trim_matches(|c| matches!(c, '*' | '`' | '"' | '\''))
        .trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Parse the `<folder_structure>` JSON. No block yields an empty tree; an
/// invalid block yields the parse error.
pub fn folder_structure(refined: &str) -> Result<BTreeMap<String, Node>, String> {
    let Some(caps) = FOLDER_STRUCTURE.captures(refined) else {
        return Ok(BTreeMap::new());
    };
    let json = strip_code_fence(caps[1].trim());
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| format!("Error parsing JSON: {e}\nInvalid JSON string: {json}"))?;
    match value {
        serde_json::Value::Object(map) => Ok(to_tree(map)),
        other => Err(format!(
            "Folder structure must be a JSON object, got: {other}"
        )),
    }
}

/// Models often wrap the JSON in a ```json fence inside the tags.
fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn to_tree(map: serde_json::Map<String, serde_json::Value>) -> BTreeMap<String, Node> {
    map.into_iter()
        .map(|(name, value)| {
            let node = match value {
                serde_json::Value::Object(children) => Node::Dir(to_tree(children)),
                _ => Node::File,
            };
            (name, node)
        })
        .collect()
}

/// Every `Filename: <name>` followed by a fenced block.
pub fn code_blocks(refined: &str) -> Vec<CodeBlock> {
    CODE_BLOCK
        .captures_iter(refined)
        .map(|caps| CodeBlock {
            filename: caps[1].to_string(),
            code: caps[2].to_string(),
        })
        .collect()
}
