use serde_json::Value;

use super::format::{format_legacy_task_line, format_task_line, prioritized_line};
use super::types::{
    tool_notice, ChatReply, LegacyTask, NormalizedResponse, ResponseShape, Task, ToolNotice,
};

pub const CREATE_TASK_TOOL: &str = "create_task";
pub const LIST_TASKS_TOOL: &str = "list_tasks";
pub const PRIORITIZE_TASKS_TOOL: &str = "prioritize_tasks";

/// Maps one backend payload onto a reply and rendered task lines.
///
/// Branches are tried in order: a top-level `tasks` array, then tasks
/// collected from `create_task`/`list_tasks` tool results, then the
/// `prioritize_tasks` ranking. Never fails; unexpected shapes produce the
/// fallback reply and an empty task list.
pub fn normalize_response(payload: &Value) -> NormalizedResponse {
    let reply = ChatReply::from_payload(payload);
    let tool_results = payload
        .get("tool_results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let tool_notices = tool_results
        .iter()
        .filter_map(tool_notice)
        .collect::<Vec<ToolNotice>>();

    let (shape, task_lines) = resolve_task_lines(payload, tool_results);
    NormalizedResponse {
        reply,
        task_lines,
        shape,
        tool_notices,
    }
}

fn resolve_task_lines(payload: &Value, tool_results: &[Value]) -> (ResponseShape, Vec<String>) {
    if let Some(tasks) = payload.get("tasks").and_then(Value::as_array) {
        let lines = tasks
            .iter()
            .enumerate()
            .map(|(index, record)| format_legacy_task_line(&LegacyTask::from_record(record, index)))
            .collect();
        return (ResponseShape::Legacy, lines);
    }

    let collected = collect_tool_tasks(tool_results);
    if !collected.is_empty() {
        let lines = collected
            .iter()
            .enumerate()
            .map(|(index, record)| format_task_line(&Task::from_record(record, index)))
            .collect();
        return (ResponseShape::ToolResults, lines);
    }

    if let Some(ranked) = prioritized_results(tool_results) {
        let lines = ranked.iter().filter_map(prioritized_line).collect();
        return (ResponseShape::Prioritized, lines);
    }

    (ResponseShape::Empty, Vec::new())
}

fn collect_tool_tasks(tool_results: &[Value]) -> Vec<&Value> {
    let mut out = Vec::new();
    for entry in tool_results {
        let Some(result) = entry.get("result").filter(|value| is_truthy(value)) else {
            continue;
        };
        match entry.get("name").and_then(Value::as_str) {
            Some(CREATE_TASK_TOOL) if result.is_object() => out.push(result),
            Some(LIST_TASKS_TOOL) => {
                if let Some(items) = result.as_array() {
                    out.extend(items.iter());
                }
            }
            _ => {}
        }
    }
    out
}

fn prioritized_results(tool_results: &[Value]) -> Option<&Vec<Value>> {
    tool_results.iter().find_map(|entry| {
        if entry.get("name").and_then(Value::as_str) != Some(PRIORITIZE_TASKS_TOOL) {
            return None;
        }
        entry
            .get("result")
            .and_then(|result| result.get("results"))
            .and_then(Value::as_array)
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
