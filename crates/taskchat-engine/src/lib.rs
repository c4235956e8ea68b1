use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use taskchat_contracts::events::EventWriter;
use taskchat_contracts::replies::{normalize_response, NormalizedResponse};

pub mod submit;
pub mod view;
pub mod voice;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";
pub const DEFAULT_CHAT_ENDPOINT: &str = "/chat";
pub const HEALTH_ENDPOINT: &str = "/health";

const ERROR_TEXT_MAX_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub api_base: String,
    pub chat_endpoint: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            chat_endpoint: DEFAULT_CHAT_ENDPOINT.to_string(),
        }
    }
}

impl ChatConfig {
    /// Flags win over `TASKCHAT_API_BASE` / `TASKCHAT_CHAT_ENDPOINT`, which
    /// win over the built-in defaults.
    pub fn resolve(api_base: Option<String>, chat_endpoint: Option<String>) -> Self {
        Self::from_sources(
            api_base,
            non_empty_env("TASKCHAT_API_BASE"),
            chat_endpoint,
            non_empty_env("TASKCHAT_CHAT_ENDPOINT"),
        )
    }

    fn from_sources(
        api_base_flag: Option<String>,
        api_base_env: Option<String>,
        endpoint_flag: Option<String>,
        endpoint_env: Option<String>,
    ) -> Self {
        let api_base = first_non_empty([api_base_flag, api_base_env])
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let chat_endpoint = first_non_empty([endpoint_flag, endpoint_env])
            .map(|value| {
                if value.starts_with('/') {
                    value
                } else {
                    format!("/{value}")
                }
            })
            .unwrap_or_else(|| DEFAULT_CHAT_ENDPOINT.to_string());
        Self {
            api_base,
            chat_endpoint,
        }
    }

    pub fn chat_url(&self) -> String {
        format!("{}{}", self.api_base, self.chat_endpoint)
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.api_base, HEALTH_ENDPOINT)
    }
}

/// One completed request: what was sent, the untouched payload, and its
/// normalized view.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatExchange {
    pub message: String,
    pub raw: Value,
    pub normalized: NormalizedResponse,
}

impl ChatExchange {
    pub fn raw_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.raw).unwrap_or_else(|_| self.raw.to_string())
    }
}

/// Blocking client for the chat backend. Cloning shares the connection pool
/// and the event log.
#[derive(Debug, Clone)]
pub struct ChatEngine {
    http: HttpClient,
    config: ChatConfig,
    events: EventWriter,
}

impl ChatEngine {
    pub fn new(config: ChatConfig, events: EventWriter) -> Result<Self> {
        // Requests wait for the backend however long it takes.
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed building HTTP client")?;
        Ok(Self {
            http,
            config,
            events,
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn event_writer(&self) -> EventWriter {
        self.events.clone()
    }

    /// Posts `{"message": ...}` and normalizes the reply. Any transport
    /// failure, non-2xx status, or non-JSON body is an error; the JSON shape
    /// itself is never validated. Event log failures never change the
    /// outcome.
    pub fn send_message(&self, message: &str) -> Result<ChatExchange> {
        let url = self.config.chat_url();
        let _ = self.events.emit(
            "message_sent",
            map_object(json!({
                "url": url,
                "message": message,
            })),
        );

        let raw = match self.post_message(&url, message) {
            Ok(raw) => raw,
            Err(err) => {
                let _ = self.events.emit(
                    "request_failed",
                    map_object(json!({
                        "url": url,
                        "error": error_chain_text(&err, ERROR_TEXT_MAX_CHARS),
                    })),
                );
                return Err(err);
            }
        };

        let normalized = normalize_response(&raw);
        let _ = self.events.emit(
            "reply_received",
            map_object(json!({
                "shape": normalized.shape.as_str(),
                "task_count": normalized.task_lines.len(),
                "notice_count": normalized.tool_notices.len(),
                "reply_chars": normalized.reply.text.chars().count(),
            })),
        );

        Ok(ChatExchange {
            message: message.to_string(),
            raw,
            normalized,
        })
    }

    fn post_message(&self, url: &str, message: &str) -> Result<Value> {
        let response = self
            .http
            .post(url)
            .json(&json!({ "message": message }))
            .send()
            .with_context(|| format!("chat request failed ({url})"))?;
        response_json_or_error(response)
    }

    pub fn health(&self) -> Result<Value> {
        let url = self.config.health_url();
        let response = self
            .http
            .get(&url)
            .send()
            .with_context(|| format!("health request failed ({url})"))?;
        response_json_or_error(response)
    }
}

/// Text shown to the user for a failed request: the error chain, deduplicated
/// and truncated.
pub fn failure_message(err: &anyhow::Error) -> String {
    error_chain_text(err, ERROR_TEXT_MAX_CHARS)
}

fn response_json_or_error(response: HttpResponse) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        bail!("Backend error: {}", status.as_u16());
    }
    let body = response
        .text()
        .context("backend response body read failed")?;
    let parsed: Value =
        serde_json::from_str(&body).context("backend returned invalid JSON payload")?;
    Ok(parsed)
}

fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn map_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
