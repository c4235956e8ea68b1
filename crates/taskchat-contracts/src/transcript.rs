use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::events::now_utc_iso;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub ts: String,
}

/// In-memory record of the turns shown in one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) -> &Turn {
        self.turns.push(Turn {
            role,
            text: text.into(),
            ts: now_utc_iso(),
        });
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

pub fn write_transcript(path: &Path, session_id: &str, transcript: &Transcript) -> anyhow::Result<()> {
    let mut payload = Map::new();
    payload.insert(
        "session_id".to_string(),
        Value::String(session_id.to_string()),
    );
    payload.insert("exported_at".to_string(), Value::String(now_utc_iso()));
    payload.insert(
        "turns".to_string(),
        serde_json::to_value(transcript.turns())?,
    );

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}
