use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{CommandSpec, DEFAULT_EXPORT_PATH, EXPORT_COMMAND, NO_ARG_COMMANDS};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub message: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str) -> Self {
        Self {
            action: action.to_string(),
            message: None,
            command_args: BTreeMap::new(),
        }
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = match shell_words::split(arg) {
        Ok(parts) => parts,
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    };
    parts
        .into_iter()
        .filter(|value| !value.is_empty())
        .collect::<Vec<String>>()
        .join(" ")
}

/// Classifies one line of user input.
///
/// Blank input is `noop`, `/command` lines map through the command
/// registry, and anything else is a `send` carrying the trimmed text.
pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop");
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action);
            }

            if command == EXPORT_COMMAND.command {
                let mut intent = Intent::new(EXPORT_COMMAND.action);
                let path = parse_single_path_arg(arg);
                intent.command_args.insert(
                    "path".to_string(),
                    Value::String(if path.is_empty() {
                        DEFAULT_EXPORT_PATH.to_string()
                    } else {
                        path
                    }),
                );
                return intent;
            }

            let mut intent = Intent::new("unknown");
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("send");
    intent.message = Some(raw_trimmed.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn blank_lines_are_noop() {
        assert_eq!(parse_intent("").action, "noop");
        assert_eq!(parse_intent("   \t ").action, "noop");
    }

    #[test]
    fn plain_text_is_trimmed_and_sent() {
        let intent = parse_intent("  add milk to my list \n");
        assert_eq!(intent.action, "send");
        assert_eq!(intent.message.as_deref(), Some("add milk to my list"));
    }

    #[test]
    fn voice_shortcut_is_single_letter() {
        assert_eq!(parse_intent("/v").action, "voice");
        assert_eq!(parse_intent("/V").action, "voice");
        assert_eq!(parse_intent("/voice").action, "unknown");
    }

    #[test]
    fn no_arg_commands() {
        assert_eq!(parse_intent("/help").action, "help");
        assert_eq!(parse_intent("/tasks").action, "tasks");
        assert_eq!(parse_intent("/raw").action, "raw");
        assert_eq!(parse_intent("/health").action, "health");
        assert_eq!(parse_intent("/quit").action, "quit");
        assert_eq!(parse_intent("/exit").action, "quit");
    }

    #[test]
    fn export_defaults_and_quoted_paths() {
        assert_eq!(
            parse_intent("/export").command_args["path"],
            json!("transcript.json")
        );
        assert_eq!(
            parse_intent("/export \"/tmp/my chat.json\"").command_args["path"],
            json!("/tmp/my chat.json")
        );
    }

    #[test]
    fn unknown_command_keeps_argument() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }

    #[test]
    fn lone_slash_is_sent_as_text() {
        let intent = parse_intent("/ what is due today?");
        assert_eq!(intent.action, "send");
        assert_eq!(intent.message.as_deref(), Some("/ what is due today?"));
    }
}
