use serde_json::Value;

use super::types::{LegacyTask, PrioritizedTask, Task};

pub fn format_task_line(task: &Task) -> String {
    let mut line = id_prefix(task.id.as_deref());
    line.push_str(&task.title);
    if let Some(due) = task.due.as_deref() {
        line.push_str(" — due ");
        line.push_str(due);
    }
    line
}

/// The `tasks` array predates `due_at`; it joins whichever of date and time
/// are set with `" @ "`.
pub fn format_legacy_task_line(task: &LegacyTask) -> String {
    let mut line = id_prefix(task.id.as_deref());
    line.push_str(&task.title);
    let when = [task.date.as_deref(), task.time.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<&str>>();
    if !when.is_empty() {
        line.push_str(" — ");
        line.push_str(&when.join(" @ "));
    }
    line
}

pub fn format_prioritized_line(task: &PrioritizedTask) -> String {
    let mut line = format!(
        "Task #{} — priority={}",
        task.task_id,
        fixed_two_places(task.priority_score)
    );
    if let Some(chance) = task.completion_chance {
        line.push_str(&format!(" chance={}%", round_half_up(chance * 100.0) as i64));
    }
    line
}

/// Two decimal places, with exact ties rounded away from zero.
///
/// A double sits exactly halfway between two hundredths only when it is an
/// odd multiple of 1/8, so that case is handled apart from `{:.2}`, which
/// rounds ties to even.
fn fixed_two_places(value: f64) -> String {
    let eighths = value * 8.0;
    if !eighths.is_finite() || eighths.fract() != 0.0 || eighths % 2.0 == 0.0 {
        return format!("{value:.2}");
    }
    // |value| * 100 == |eighths| * 12.5, one half above an integer.
    let hundredths = (eighths.abs() as u64 * 25 + 1) / 2;
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{}.{:02}", hundredths / 100, hundredths % 100)
}

/// Nearest integer, ties toward positive infinity.
fn round_half_up(value: f64) -> f64 {
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

/// Formats a raw `prioritize_tasks` entry, or `None` when it carries no
/// numeric priority score.
pub fn prioritized_line(record: &Value) -> Option<String> {
    PrioritizedTask::from_record(record).map(|task| format_prioritized_line(&task))
}

fn id_prefix(id: Option<&str>) -> String {
    match id {
        Some(id) => format!("#{id} "),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{format_legacy_task_line, format_task_line, prioritized_line};
    use crate::replies::types::{LegacyTask, Task};

    #[test]
    fn task_line_with_id_and_due() {
        let task = Task::from_record(&json!({"id": 3, "title": "X", "due_at": "2024-05-01"}), 0);
        assert_eq!(format_task_line(&task), "#3 X — due 2024-05-01");
    }

    #[test]
    fn task_line_without_optional_parts() {
        let task = Task::from_record(&json!({"title": "Plain"}), 0);
        assert_eq!(format_task_line(&task), "Plain");
    }

    #[test]
    fn legacy_line_joins_date_and_time() {
        let both = LegacyTask::from_record(
            &json!({"title": "A", "date": "2024-01-01", "time": "09:00"}),
            0,
        );
        assert_eq!(format_legacy_task_line(&both), "A — 2024-01-01 @ 09:00");

        let time_only = LegacyTask::from_record(&json!({"title": "A", "time": "09:00"}), 0);
        assert_eq!(format_legacy_task_line(&time_only), "A — 09:00");

        let neither = LegacyTask::from_record(&json!({"title": "A"}), 0);
        assert_eq!(format_legacy_task_line(&neither), "A");
    }

    #[test]
    fn legacy_line_does_not_use_due_at() {
        let task = LegacyTask::from_record(&json!({"title": "A", "due_at": "2024-01-01"}), 0);
        assert_eq!(format_legacy_task_line(&task), "A");
    }

    #[test]
    fn prioritized_line_formats_score_and_chance() {
        let line = prioritized_line(
            &json!({"task_id": 7, "priority_score": 0.5, "completion_chance": 0.8}),
        );
        assert_eq!(line.as_deref(), Some("Task #7 — priority=0.50 chance=80%"));
    }

    #[test]
    fn prioritized_line_omits_non_numeric_chance() {
        let line = prioritized_line(
            &json!({"task_id": 2, "priority_score": 12.346, "completion_chance": "likely"}),
        );
        assert_eq!(line.as_deref(), Some("Task #2 — priority=12.35"));
    }

    #[test]
    fn prioritized_line_rounds_chance_half_up() {
        let line =
            prioritized_line(&json!({"task_id": 1, "priority_score": 1, "completion_chance": 0.125}));
        assert_eq!(line.as_deref(), Some("Task #1 — priority=1.00 chance=13%"));
    }

    #[test]
    fn prioritized_score_ties_round_up() {
        let line = |score: f64| {
            prioritized_line(&json!({"task_id": 1, "priority_score": score})).unwrap_or_default()
        };
        assert_eq!(line(0.125), "Task #1 — priority=0.13");
        assert_eq!(line(0.375), "Task #1 — priority=0.38");
        assert_eq!(line(2.625), "Task #1 — priority=2.63");
        assert_eq!(line(-0.125), "Task #1 — priority=-0.13");
        // 2.675 is stored just below the halfway point.
        assert_eq!(line(2.675), "Task #1 — priority=2.67");
    }

    #[test]
    fn prioritized_chance_ties_round_toward_positive() {
        let line = |chance: f64| {
            prioritized_line(
                &json!({"task_id": 1, "priority_score": 1, "completion_chance": chance}),
            )
            .unwrap_or_default()
        };
        assert_eq!(line(-0.005), "Task #1 — priority=1.00 chance=0%");
        assert_eq!(line(0.005), "Task #1 — priority=1.00 chance=1%");
        assert_eq!(line(0.994), "Task #1 — priority=1.00 chance=99%");
    }

    #[test]
    fn prioritized_line_skips_missing_score() {
        assert_eq!(prioritized_line(&json!({"task_id": 1})), None);
    }
}
