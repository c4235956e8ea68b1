use serde_json::Value;

/// Ordered list of keys consulted for one logical field.
///
/// Lookup returns the first key whose value is present: not missing, not
/// `null`, and not the empty string. Everything else, including `0` and
/// `false`, counts as present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldPrecedence {
    pub field: &'static str,
    pub keys: &'static [&'static str],
}

impl FieldPrecedence {
    pub const fn new(field: &'static str, keys: &'static [&'static str]) -> Self {
        Self { field, keys }
    }

    pub fn first_present<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        let obj = record.as_object()?;
        self.keys
            .iter()
            .filter_map(|key| obj.get(*key))
            .find(|value| is_present(value))
    }

    pub fn text(&self, record: &Value) -> Option<String> {
        self.first_present(record).map(value_text)
    }

    pub fn number(&self, record: &Value) -> Option<f64> {
        self.first_present(record).and_then(Value::as_f64)
    }
}

pub const REPLY: FieldPrecedence = FieldPrecedence::new("reply", &["reply", "assistant_reply"]);

pub const TASK_ID: FieldPrecedence = FieldPrecedence::new("id", &["id"]);
pub const TASK_TITLE: FieldPrecedence =
    FieldPrecedence::new("title", &["title", "description"]);
pub const TASK_DUE: FieldPrecedence =
    FieldPrecedence::new("due", &["due_at", "due_date", "date"]);

pub const LEGACY_DATE: FieldPrecedence =
    FieldPrecedence::new("date", &["date", "due_date", "dueTime"]);
pub const LEGACY_TIME: FieldPrecedence = FieldPrecedence::new("time", &["time", "start_time"]);

pub const PRIORITY_TASK_ID: FieldPrecedence =
    FieldPrecedence::new("task_id", &["task_id", "taskId"]);
pub const PRIORITY_SCORE: FieldPrecedence =
    FieldPrecedence::new("priority_score", &["priority_score", "priorityScore"]);
pub const COMPLETION_CHANCE: FieldPrecedence =
    FieldPrecedence::new("completion_chance", &["completion_chance", "completionChance"]);

pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.is_empty(),
        _ => true,
    }
}

/// Display text for a JSON value: strings verbatim, everything else as
/// compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{is_present, value_text, FieldPrecedence, REPLY, TASK_DUE, TASK_TITLE};

    #[test]
    fn first_present_follows_declared_order() {
        let record = json!({"description": "second", "title": "first"});
        assert_eq!(TASK_TITLE.text(&record).as_deref(), Some("first"));

        let record = json!({"date": "2024-02-02", "due_date": "2024-01-01"});
        assert_eq!(TASK_DUE.text(&record).as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn empty_and_null_values_are_skipped() {
        let record = json!({"reply": "", "assistant_reply": null});
        assert_eq!(REPLY.text(&record), None);

        let record = json!({"reply": null, "assistant_reply": "fallback"});
        assert_eq!(REPLY.text(&record).as_deref(), Some("fallback"));
    }

    #[test]
    fn zero_and_false_are_present() {
        assert!(is_present(&json!(0)));
        assert!(is_present(&json!(false)));
        assert!(!is_present(&json!(null)));
        assert!(!is_present(&json!("")));
    }

    #[test]
    fn non_objects_resolve_to_nothing() {
        let precedence = FieldPrecedence::new("title", &["title"]);
        assert_eq!(precedence.text(&json!("plain string")), None);
        assert_eq!(precedence.text(&json!([1, 2])), None);
        assert_eq!(precedence.number(&json!(null)), None);
    }

    #[test]
    fn value_text_renders_scalars_and_containers() {
        assert_eq!(value_text(&json!("abc")), "abc");
        assert_eq!(value_text(&json!(7)), "7");
        assert_eq!(value_text(&json!(true)), "true");
        assert_eq!(value_text(&json!({"a": 1})), "{\"a\":1}");
    }
}
