//! Prompt builders for the three roles.
//!
//! Everything the models see is assembled here so the wording lives in one
//! place and the role modules only decide *when* to send it.

use super::types::SubTaskRecord;

/// Literal phrase the orchestrator uses to declare the objective done.
pub const SENTINEL: &str = "The task is complete:";

/// Sent in place of a new prompt to ask for the rest of a truncated answer.
pub const CONTINUATION_PROMPT: &str =
    "Continuing from the previous answer, please complete the response.";

pub const ORCHESTRATOR_SYSTEM: &str = "\
You are a detailed and meticulous assistant. Your primary goal is to break down complex \
objectives into manageable sub-tasks, provide thorough reasoning, and ensure code correctness. \
Always explain your thought process step-by-step and validate any code for errors, \
improvements, and adherence to best practices.";

const SUB_AGENT_SYSTEM: &str = "\
You are an expert assistant. Your goal is to execute tasks accurately, provide detailed \
explanations of your reasoning, and ensure the correctness and quality of any code. Always \
explain your thought process and validate your output thoroughly.";

/// Build the orchestrator's planning prompt.
///
/// `file_content` is only passed until the first sub-task is recorded. An
/// empty `previous_results` renders as `None`.
pub fn orchestrator_prompt(
    objective: &str,
    file_content: Option<&str>,
    previous_results: &[String],
) -> String {
    let and_file = if file_content.is_some() {
        " and file content"
    } else {
        ""
    };
    let file_section = file_content
        .map(|content| format!("\nFile content:\n{content}"))
        .unwrap_or_default();
    let previous = if previous_results.is_empty() {
        "None".to_string()
    } else {
        previous_results.join("\n")
    };

    format!(
        "Based on the following objective{and_file}, and the previous sub-task results (if any), \
please break down the objective into the next sub-task, and create a concise and detailed prompt \
for a subagent so it can execute that task. Focus solely on the objective and avoid engaging in \
casual conversation with the subagent.

When dealing with code tasks, make sure to check the code for errors and provide fixes and support \
as part of the next sub-task. If you find any bugs or have suggestions for better code, please \
include them in the next sub-task prompt.

Please assess if the objective has been fully achieved. If the previous sub-task results \
comprehensively address all aspects of the objective, include the phrase '{SENTINEL}' at the \
beginning of your response. If the objective is not yet fully achieved, break it down into the \
next sub-task and create a concise and detailed prompt for a subagent to execute that task.

Objective: {objective}{file_section}

Previous sub-task results:
{previous}"
    )
}

/// Extra instruction asking the orchestrator for a web search query.
pub fn search_query_addendum() -> &'static str {
    "Please also generate a JSON object containing a single 'search_query' key, which represents \
a question that, when asked online, would yield important information for solving the subtask. \
The question should be specific and targeted to elicit the most relevant and helpful resources. \
Format your JSON like this, with no additional text before or after:
{\"search_query\": \"<question>\"}
"
}

/// System message for a sub-agent: role description plus every earlier
/// task/result pair.
pub fn sub_agent_system(previous_tasks: &[SubTaskRecord]) -> String {
    let history = previous_tasks
        .iter()
        .map(|t| format!("Task: {}\nResult: {}", t.task, t.result))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{SUB_AGENT_SYSTEM}\n\nPrevious tasks:\n{history}")
}

/// Attach the objective's file content to the first sub-task prompt.
pub fn with_file_content(prompt: &str, file_content: &str) -> String {
    format!("{prompt}\n\nFile content:\n{file_content}")
}

/// Render search results as the extra user part given to a sub-agent.
pub fn search_results_part(results: &str) -> String {
    format!("\nSearch Results:\n{results}")
}

/// Build the refiner prompt from the objective and every sub-task result.
pub fn refiner_prompt(objective: &str, sub_task_results: &[String]) -> String {
    let results = sub_task_results.join("\n");
    format!(
        "Objective: {objective}

Sub-task results:
{results}

Please review and refine the sub-task results into a cohesive final output. Add any missing \
information or details as needed. If you encounter issues such as missing code or errors, attempt \
to resolve them; if you cannot, describe the problems clearly and suggest steps to fix them.

When working on code projects, ONLY AND ONLY IF THE PROJECT IS CLEARLY A CODING ONE, please \
provide the following:

1. Project Name: Create a concise and appropriate project name that fits the project based on \
what it's creating. The project name should be no more than 20 characters long.

2. Folder Structure: Provide the folder structure as a valid JSON object, where each key \
represents a folder or file, and nested keys represent subfolders. Use null values for files. \
Ensure the JSON is properly formatted without any syntax errors. Please make sure all keys are \
enclosed in double quotes, and ensure objects are correctly encapsulated with braces, separating \
items with commas as necessary. Wrap the JSON object in <folder_structure> tags.

3. Code Files: For each code file, include ONLY the file name, NEVER the file path or any other \
formatting. Use ONLY the format 'Filename: <filename>' followed by the code block enclosed in \
triple backticks, with the language identifier after the opening backticks, like this:

```python
<code>
```

Focus solely on the objective and avoid engaging in casual conversation. Ensure the final output \
is clear, concise, and addresses all aspects of the objective."
    )
}
