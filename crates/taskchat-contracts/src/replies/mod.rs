pub mod fields;
pub mod format;
mod normalize;
mod types;

pub use format::{format_legacy_task_line, format_prioritized_line, format_task_line};
pub use normalize::{
    normalize_response, CREATE_TASK_TOOL, LIST_TASKS_TOOL, PRIORITIZE_TASKS_TOOL,
};
pub use types::{
    ChatReply, LegacyTask, NormalizedResponse, PrioritizedTask, ResponseShape, Task, ToolNotice,
    NO_REPLY_FALLBACK,
};
