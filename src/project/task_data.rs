//! `task_data.json`: the objective and the exchanges so far, rewritten after
//! every sub-task so an interrupted run can be resumed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent::types::TaskExchange;
use crate::error::AgentError;

pub const TASK_DATA_FILE: &str = "task_data.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskData {
    pub objective: String,
    #[serde(default)]
    pub file_content: Option<String>,
    #[serde(default)]
    pub task_exchanges: Vec<TaskExchange>,
}

pub fn task_data_path(dir: &Path) -> PathBuf {
    dir.join(TASK_DATA_FILE)
}

pub fn has_task_data(dir: &Path) -> bool {
    task_data_path(dir).is_file()
}

pub fn read_task_data(dir: &Path) -> Result<TaskData, AgentError> {
    let path = task_data_path(dir);
    let contents = std::fs::read_to_string(&path)
        .map_err(|e| AgentError::TaskDataError(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&contents)
        .map_err(|e| AgentError::TaskDataError(format!("{}: {e}", path.display())))
}

/// Write via a temporary file and rename so a crash never leaves half a file.
pub fn write_task_data(dir: &Path, data: &TaskData) -> Result<(), AgentError> {
    let path = task_data_path(dir);
    let tmp = dir.join(format!("{TASK_DATA_FILE}.tmp"));
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| AgentError::TaskDataError(e.to_string()))?;
    std::fs::create_dir_all(dir)
        .and_then(|_| std::fs::write(&tmp, json))
        .and_then(|_| std::fs::rename(&tmp, &path))
        .map_err(|e| AgentError::TaskDataError(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        assert!(!has_task_data(tmp.path()));
        assert!(matches!(
            read_task_data(tmp.path()),
            Err(AgentError::TaskDataError(_))
        ));
    }

    #[test]
    fn written_data_reads_back() {
        let tmp = TempDir::new().unwrap();
        let data = TaskData {
            objective: "Write a CLI".into(),
            file_content: None,
            task_exchanges: vec![TaskExchange {
                prompt: "step 1".into(),
                result: "done 1".into(),
            }],
        };
        write_task_data(tmp.path(), &data).unwrap();
        assert!(has_task_data(tmp.path()));
        assert!(!tmp.path().join("task_data.json.tmp").exists());
        assert_eq!(read_task_data(tmp.path()).unwrap(), data);
    }

    #[test]
    fn older_files_without_optional_fields_load() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(task_data_path(tmp.path()), r#"{"objective": "x"}"#).unwrap();
        let data = read_task_data(tmp.path()).unwrap();
        assert_eq!(data.objective, "x");
        assert!(data.task_exchanges.is_empty());
    }
}
