//! Write extracted artifacts to disk as a project folder.
//!
//! Individual folder/file failures are recorded in the [`MaterializeReport`]
//! and do not stop the rest of the tree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::artifacts::{Artifacts, CodeBlock, Node};
use crate::display::{self, Tone};
use crate::safety::workspace::{WorkspaceGuard, is_plain_component};

/// What happened while materializing a project.
#[derive(Debug, Default, Serialize)]
pub struct MaterializeReport {
    pub project_dir: PathBuf,
    pub created_dirs: Vec<PathBuf>,
    pub created_files: Vec<PathBuf>,
    /// Files named in the tree with no matching code block.
    pub missing_content: Vec<String>,
    /// Tree entries refused because they would leave the project folder.
    pub rejected: Vec<String>,
    /// Entries that failed with an I/O error.
    pub failures: Vec<String>,
}

/// Turn a model-chosen project name into a single directory name.
pub fn project_dir_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    if is_plain_component(&cleaned) {
        cleaned
    } else {
        "project".to_string()
    }
}

/// Create `{output_dir}/{project_name}` and the artifact tree inside it.
pub fn materialize(artifacts: &Artifacts, output_dir: &Path) -> std::io::Result<MaterializeReport> {
    let project_dir = output_dir.join(project_dir_name(&artifacts.project_name));
    let guard = WorkspaceGuard::new(&project_dir)?;
    display::panel(
        "Project Folder",
        &format!("Created project folder: {}", project_dir.display()),
        Tone::Success,
    );
    tracing::info!(project = %project_dir.display(), "Materializing project");

    let mut report = MaterializeReport {
        project_dir: project_dir.clone(),
        ..Default::default()
    };
    write_tree(
        &guard,
        guard.canonical_root(),
        &artifacts.tree,
        &artifacts.code_blocks,
        &mut report,
    );
    Ok(report)
}

fn write_tree(
    guard: &WorkspaceGuard,
    current: &Path,
    tree: &BTreeMap<String, Node>,
    code_blocks: &[CodeBlock],
    report: &mut MaterializeReport,
) {
    for (name, node) in tree {
        let path = current.join(name);
        if !is_plain_component(name) || !matches!(guard.is_write_allowed(&path), Ok(true)) {
            tracing::warn!(entry = %name, "Rejected tree entry outside the project folder");
            display::panel(
                "Rejected Entry",
                &format!("Refusing to create {name}: not a plain name inside the project"),
                Tone::Error,
            );
            report.rejected.push(name.clone());
            continue;
        }

        match node {
            Node::Dir(children) => match std::fs::create_dir_all(&path) {
                Ok(()) => {
                    display::panel(
                        "Folder Creation",
                        &format!("Created folder: {}", path.display()),
                        Tone::Info,
                    );
                    report.created_dirs.push(path.clone());
                    write_tree(guard, &path, children, code_blocks, report);
                }
                Err(e) => {
                    display::panel(
                        "Folder Creation Error",
                        &format!("Error creating folder: {}\nError: {e}", path.display()),
                        Tone::Error,
                    );
                    report.failures.push(format!("{}: {e}", path.display()));
                }
            },
            Node::File => match find_code(code_blocks, name) {
                Some(code) => match std::fs::write(&path, code) {
                    Ok(()) => {
                        display::panel(
                            "File Creation",
                            &format!("Created file: {}", path.display()),
                            Tone::Success,
                        );
                        report.created_files.push(path);
                    }
                    Err(e) => {
                        display::panel(
                            "File Creation Error",
                            &format!("Error creating file: {}\nError: {e}", path.display()),
                            Tone::Error,
                        );
                        report.failures.push(format!("{}: {e}", path.display()));
                    }
                },
                None => {
                    display::panel(
                        "Missing Code Content",
                        &format!("Code content not found for file: {name}"),
                        Tone::Warning,
                    );
                    report.missing_content.push(name.clone());
                }
            },
        }
    }
}

/// Code for `name`: an exact filename match first, then a block whose
/// filename ends in `/name`. Empty code counts as missing.
fn find_code<'a>(code_blocks: &'a [CodeBlock], name: &str) -> Option<&'a str> {
    code_blocks
        .iter()
        .find(|b| b.filename == name)
        .or_else(|| {
            code_blocks
                .iter()
                .find(|b| b.filename.rsplit('/').next() == Some(name))
        })
        .map(|b| b.code.as_str())
        .filter(|code| !code.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::artifacts::folder_structure;
    use tempfile::TempDir;

    fn artifacts(project_name: &str, tree_json: &str, code_blocks: Vec<CodeBlock>) -> Artifacts {
        let text = format!("<folder_structure>{tree_json}</folder_structure>");
        Artifacts {
            project_name: project_name.into(),
            tree: folder_structure(&text).unwrap(),
            code_blocks,
            structure_error: None,
        }
    }

    fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                found.extend(files_under(&path));
            } else {
                found.push(path);
            }
        }
        found
    }

    #[test]
    fn escaping_entries_are_rejected_and_missing_code_reported() {
        let tmp = TempDir::new().unwrap();
        let output_dir = tmp.path().join("out");
        std::fs::create_dir(&output_dir).unwrap();
        let artifacts = artifacts(
            "Demo",
            r#"{"../x.py": null, "..": {"y.py": null}, "/abs.py": null,
                "ok": {"z.py": null}, "m.py": null}"#,
            vec![
                CodeBlock { filename: "x.py".into(), code: "escape".into() },
                CodeBlock { filename: "y.py".into(), code: "escape".into() },
                CodeBlock { filename: "abs.py".into(), code: "escape".into() },
                CodeBlock { filename: "z.py".into(), code: "print('z')".into() },
            ],
        );

        let report = materialize(&artifacts, &output_dir).unwrap();

        let mut rejected = report.rejected.clone();
        rejected.sort();
        assert_eq!(rejected, vec!["..", "../x.py", "/abs.py"]);
        assert_eq!(report.missing_content, vec!["m.py"]);
        assert!(report.failures.is_empty());

        let project = output_dir.join("Demo");
        assert_eq!(
            std::fs::read_to_string(project.join("ok/z.py")).unwrap(),
            "print('z')"
        );
        // Nothing outside the project folder.
        let canonical_project = std::fs::canonicalize(&project).unwrap();
        for file in files_under(tmp.path()) {
            let file = std::fs::canonicalize(file).unwrap();
            assert!(file.starts_with(&canonical_project), "{}", file.display());
        }
    }

    #[test]
    fn traversing_project_name_stays_in_output_dir() {
        let tmp = TempDir::new().unwrap();
        let output_dir = tmp.path().join("out");
        std::fs::create_dir(&output_dir).unwrap();
        let artifacts = artifacts(
            "../../evil",
            r#"{"main.py": null}"#,
            vec![CodeBlock { filename: "main.py".into(), code: "x = 1".into() }],
        );

        let report = materialize(&artifacts, &output_dir).unwrap();

        assert_eq!(report.project_dir.parent(), Some(output_dir.as_path()));
        assert!(report.created_files[0].starts_with(std::fs::canonicalize(&output_dir).unwrap()));
        assert!(!tmp.path().join("evil").exists());
    }

    #[test]
    fn project_dir_name_replaces_separators() {
        assert_eq!(project_dir_name("  Todo/CLI "), "Todo_CLI");
        assert_eq!(project_dir_name(".."), "project");
        assert_eq!(project_dir_name(""), "project");
        assert_eq!(project_dir_name("Weather App"), "Weather App");
    }

    #[test]
    fn find_code_prefers_exact_match() {
        let blocks = vec![
            CodeBlock {
                filename: "src/main.py".into(),
                code: "nested".into(),
            },
            CodeBlock {
                filename: "main.py".into(),
                code: "exact".into(),
            },
        ];
        assert_eq!(find_code(&blocks, "main.py"), Some("exact"));
    }

    #[test]
    fn find_code_falls_back_to_basename() {
        let blocks = vec![CodeBlock {
            filename: "src/app.js".into(),
            code: "x".into(),
        }];
        assert_eq!(find_code(&blocks, "app.js"), Some("x"));
        assert_eq!(find_code(&blocks, "other.js"), None);
    }
}
