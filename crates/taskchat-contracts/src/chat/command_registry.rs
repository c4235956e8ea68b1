#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Single-letter command that starts one-shot speech capture.
pub const VOICE_SHORTCUT: &str = "v";

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: VOICE_SHORTCUT,
        action: "voice",
    },
    CommandSpec {
        command: "tasks",
        action: "tasks",
    },
    CommandSpec {
        command: "raw",
        action: "raw",
    },
    CommandSpec {
        command: "health",
        action: "health",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const EXPORT_COMMAND: CommandSpec = CommandSpec {
    command: "export",
    action: "export",
};

pub const DEFAULT_EXPORT_PATH: &str = "transcript.json";

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/help", "/v", "/tasks", "/raw", "/health", "/export", "/quit", "/exit",
];
