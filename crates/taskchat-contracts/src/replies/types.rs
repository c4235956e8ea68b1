use serde::Serialize;
use serde_json::Value;

use super::fields::{
    self, COMPLETION_CHANCE, LEGACY_DATE, LEGACY_TIME, PRIORITY_SCORE, PRIORITY_TASK_ID, REPLY,
    TASK_DUE, TASK_ID, TASK_TITLE,
};

pub const NO_REPLY_FALLBACK: &str = "(No 'reply' field in response; showing raw JSON below.)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub text: String,
}

impl ChatReply {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            text: REPLY
                .text(payload)
                .unwrap_or_else(|| NO_REPLY_FALLBACK.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: Option<String>,
    pub title: String,
    pub due: Option<String>,
}

impl Task {
    /// `index` is the record's position in the list being rendered and only
    /// feeds the synthesized title.
    pub fn from_record(record: &Value, index: usize) -> Self {
        Self {
            id: TASK_ID.text(record),
            title: task_title(record, index),
            due: TASK_DUE.text(record),
        }
    }
}

/// Task record as rendered for the older top-level `tasks` array, which
/// carries separate date and time fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyTask {
    pub id: Option<String>,
    pub title: String,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl LegacyTask {
    pub fn from_record(record: &Value, index: usize) -> Self {
        Self {
            id: TASK_ID.text(record),
            title: task_title(record, index),
            date: LEGACY_DATE.text(record),
            time: LEGACY_TIME.text(record),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrioritizedTask {
    pub task_id: String,
    pub priority_score: f64,
    pub completion_chance: Option<f64>,
}

impl PrioritizedTask {
    /// `None` when the record has no numeric priority score.
    pub fn from_record(record: &Value) -> Option<Self> {
        let priority_score = PRIORITY_SCORE.number(record)?;
        Some(Self {
            task_id: PRIORITY_TASK_ID
                .text(record)
                .unwrap_or_else(|| "?".to_string()),
            priority_score,
            completion_chance: COMPLETION_CHANCE.number(record),
        })
    }
}

/// A tool call the backend reported as failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolNotice {
    pub tool: String,
    pub error: String,
}

impl ToolNotice {
    pub fn message(&self) -> String {
        format!("{} failed: {}", self.tool, self.error)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    Legacy,
    ToolResults,
    Prioritized,
    Empty,
}

impl ResponseShape {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::ToolResults => "tool_results",
            Self::Prioritized => "prioritized",
            Self::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedResponse {
    pub reply: ChatReply,
    pub task_lines: Vec<String>,
    pub shape: ResponseShape,
    pub tool_notices: Vec<ToolNotice>,
}

fn task_title(record: &Value, index: usize) -> String {
    TASK_TITLE
        .text(record)
        .unwrap_or_else(|| format!("Task {}", index + 1))
}

pub(crate) fn tool_notice(entry: &Value) -> Option<ToolNotice> {
    let obj = entry.as_object()?;
    if obj.get("ok").and_then(Value::as_bool) != Some(false) {
        return None;
    }
    let tool = obj
        .get("name")
        .filter(|value| fields::is_present(value))
        .map(fields::value_text)
        .unwrap_or_else(|| "tool".to_string());
    let error = obj
        .get("error")
        .filter(|value| fields::is_present(value))
        .map(fields::value_text)
        .unwrap_or_else(|| "unknown error".to_string());
    Some(ToolNotice { tool, error })
}
