use std::io::Write;

use anyhow::Result;
use taskchat_contracts::transcript::{Role, Transcript};

use crate::ChatExchange;

/// Terminal rendering of one chat session.
///
/// Keeps the transcript, the current raw-response panel and the current task
/// list; the latter two are replaced on every reply.
pub struct ConversationView<W: Write> {
    out: W,
    transcript: Transcript,
    raw_panel: Option<String>,
    task_lines: Vec<String>,
}

impl<W: Write> ConversationView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            transcript: Transcript::new(),
            raw_panel: None,
            task_lines: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn raw_panel(&self) -> Option<&str> {
        self.raw_panel.as_deref()
    }

    pub fn task_lines(&self) -> &[String] {
        &self.task_lines
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn add_message(&mut self, role: Role, text: &str) -> Result<()> {
        self.transcript.push(role, text);
        let label = match role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        writeln!(self.out, "{label}> {text}")?;
        self.out.flush()?;
        Ok(())
    }

    pub fn show_exchange(&mut self, exchange: &ChatExchange) -> Result<()> {
        let normalized = &exchange.normalized;
        self.add_message(Role::Assistant, &normalized.reply.text)?;

        self.raw_panel = Some(exchange.raw_pretty());
        self.show_raw()?;

        self.task_lines = normalized.task_lines.clone();
        self.show_tasks()?;

        for notice in &normalized.tool_notices {
            self.notice(&notice.message())?;
        }
        Ok(())
    }

    /// The task list keeps whatever the last successful reply produced.
    pub fn show_failure(&mut self, message: &str) -> Result<()> {
        self.add_message(
            Role::Assistant,
            &format!("Error talking to backend: {message}"),
        )?;
        self.raw_panel = Some(format!("Error: {message}"));
        self.show_raw()
    }

    pub fn show_raw(&mut self) -> Result<()> {
        writeln!(self.out, "--- raw response ---")?;
        match self.raw_panel.as_deref() {
            Some(panel) => writeln!(self.out, "{panel}")?,
            None => writeln!(self.out, "(nothing yet)")?,
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn show_tasks(&mut self) -> Result<()> {
        writeln!(self.out, "--- tasks ---")?;
        if self.task_lines.is_empty() {
            writeln!(self.out, "  (no tasks)")?;
        }
        for line in &self.task_lines {
            writeln!(self.out, "  - {line}")?;
        }
        self.out.flush()?;
        Ok(())
    }

    /// Status text that is not part of the conversation.
    pub fn notice(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "* {text}")?;
        self.out.flush()?;
        Ok(())
    }
}
