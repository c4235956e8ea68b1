use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use taskchat_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS, DEFAULT_EXPORT_PATH};
use taskchat_contracts::events::EventWriter;
use taskchat_contracts::transcript::{write_transcript, Role};
use taskchat_engine::submit::{SubmitControl, SubmitGuard};
use taskchat_engine::view::ConversationView;
use taskchat_engine::voice::{VoiceCapture, VoiceStart, WhisperCppRecognizer};
use taskchat_engine::{failure_message, map_object, ChatConfig, ChatEngine, ChatExchange};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "taskchat",
    version,
    about = "Terminal chat client for a task assistant backend"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat(ChatArgs),
    Send(SendArgs),
    Health(HealthArgs),
}

#[derive(Debug, Args)]
struct BackendArgs {
    /// Backend base URL [env: TASKCHAT_API_BASE] [default: http://127.0.0.1:8000]
    #[arg(long)]
    base_url: Option<String>,
    /// Chat endpoint path [env: TASKCHAT_CHAT_ENDPOINT] [default: /chat]
    #[arg(long)]
    endpoint: Option<String>,
}

impl BackendArgs {
    fn config(&self) -> ChatConfig {
        ChatConfig::resolve(self.base_url.clone(), self.endpoint.clone())
    }
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    backend: BackendArgs,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct SendArgs {
    #[arg(long)]
    message: String,
    #[command(flatten)]
    backend: BackendArgs,
    #[arg(long)]
    events: Option<PathBuf>,
    /// Print the normalized result as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct HealthArgs {
    #[command(flatten)]
    backend: BackendArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("taskchat error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Send(args) => run_send(args),
        Command::Health(args) => run_health(args),
    }
}

fn session_events(path: Option<PathBuf>) -> Result<EventWriter> {
    let session_id = Uuid::new_v4().to_string();
    let events = match path {
        Some(path) => EventWriter::new(path, session_id),
        None => EventWriter::disabled(session_id),
    };
    events.ensure_writable()?;
    Ok(events)
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let events = session_events(args.events)?;
    let engine = ChatEngine::new(args.backend.config(), events.clone())?;
    let voice = VoiceCapture::new(Arc::new(WhisperCppRecognizer::from_env()), events.clone());

    let (tx, rx) = mpsc::channel();
    spawn_stdin_reader(tx.clone())?;

    let mut session = ChatSession::new(engine, voice, ConversationView::new(io::stdout()), tx);
    session.begin()?;
    while let Ok(event) = rx.recv() {
        if session.handle(event)? == Flow::Exit {
            break;
        }
    }
    session.finish()
}

fn run_send(args: SendArgs) -> Result<i32> {
    let message = args.message.trim().to_string();
    if message.is_empty() {
        bail!("--message must not be empty");
    }
    let engine = ChatEngine::new(args.backend.config(), session_events(args.events)?)?;
    let result = engine.send_message(&message);

    if args.json {
        let (payload, code) = match &result {
            Ok(exchange) => (exchange_json(exchange), 0),
            Err(err) => (json!({ "error": failure_message(err) }), 1),
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    let mut view = ConversationView::new(io::stdout());
    view.add_message(Role::User, &message)?;
    match result {
        Ok(exchange) => {
            view.show_exchange(&exchange)?;
            Ok(0)
        }
        Err(err) => {
            view.show_failure(&failure_message(&err))?;
            Ok(1)
        }
    }
}

fn run_health(args: HealthArgs) -> Result<i32> {
    let engine = ChatEngine::new(args.backend.config(), session_events(None)?)?;
    let payload = engine.health()?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    let ok = payload.get("ok").and_then(Value::as_bool).unwrap_or(false);
    Ok(if ok { 0 } else { 1 })
}

fn exchange_json(exchange: &ChatExchange) -> Value {
    json!({
        "message": exchange.message,
        "reply": exchange.normalized.reply.text,
        "shape": exchange.normalized.shape,
        "task_lines": exchange.normalized.task_lines,
        "tool_notices": exchange
            .normalized
            .tool_notices
            .iter()
            .map(|notice| notice.message())
            .collect::<Vec<String>>(),
        "raw": exchange.raw,
    })
}

fn spawn_stdin_reader(tx: mpsc::Sender<LoopEvent>) -> Result<()> {
    thread::Builder::new()
        .name("taskchat-stdin".to_string())
        .spawn(move || forward_lines(io::stdin().lock(), &tx))
        .context("stdin reader thread spawn failed")?;
    Ok(())
}

/// Forwards each line as `Input` until EOF or a read error, then sends
/// `InputClosed`. Bytes that are not UTF-8 are replaced rather than ending
/// the session.
fn forward_lines<R: BufRead>(mut reader: R, tx: &mpsc::Sender<LoopEvent>) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                if tx.send(LoopEvent::Input(line)).is_err() {
                    return;
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    let _ = tx.send(LoopEvent::InputClosed);
}

#[derive(Debug)]
enum LoopEvent {
    Input(String),
    InputClosed,
    Transcript(String),
    VoiceFailed(String),
    /// The guard travels with the reply so submission stays locked until
    /// the reply has been rendered.
    Reply(Result<ChatExchange>, SubmitGuard),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Main-thread state of an interactive session. Worker threads report back
/// through `tx`; only this struct touches the view.
struct ChatSession<W: Write> {
    engine: ChatEngine,
    voice: VoiceCapture,
    submit: SubmitControl,
    view: ConversationView<W>,
    events: EventWriter,
    tx: mpsc::Sender<LoopEvent>,
    input_open: bool,
}

impl<W: Write> ChatSession<W> {
    fn new(
        engine: ChatEngine,
        voice: VoiceCapture,
        view: ConversationView<W>,
        tx: mpsc::Sender<LoopEvent>,
    ) -> Self {
        let events = engine.event_writer();
        Self {
            engine,
            voice,
            submit: SubmitControl::new(),
            view,
            events,
            tx,
            input_open: true,
        }
    }

    fn begin(&mut self) -> Result<()> {
        let url = self.engine.config().chat_url();
        self.events
            .emit("session_started", map_object(json!({ "url": url })))?;
        self.view.notice(&format!(
            "taskchat talking to {url}. Type /help for commands, /v to speak."
        ))
    }

    fn finish(&mut self) -> Result<()> {
        self.events.emit(
            "session_finished",
            map_object(json!({ "turns": self.view.transcript().len() })),
        )?;
        Ok(())
    }

    fn handle(&mut self, event: LoopEvent) -> Result<Flow> {
        match event {
            LoopEvent::Input(line) => return self.handle_input(&line),
            LoopEvent::InputClosed => {
                self.input_open = false;
            }
            LoopEvent::Transcript(text) => {
                let text = text.trim();
                if text.is_empty() {
                    self.view.notice("No speech recognized.")?;
                } else {
                    self.view.notice(&format!("Heard: {text}"))?;
                    self.submit_message(text.to_string())?;
                }
            }
            LoopEvent::VoiceFailed(message) => {
                self.view
                    .notice(&format!("Voice capture failed: {message}"))?;
            }
            LoopEvent::Reply(result, guard) => {
                match result {
                    Ok(exchange) => self.view.show_exchange(&exchange)?,
                    Err(err) => self.view.show_failure(&failure_message(&err))?,
                }
                drop(guard);
            }
        }
        if !self.input_open && !self.submit.is_locked() {
            return Ok(Flow::Exit);
        }
        Ok(Flow::Continue)
    }

    fn handle_input(&mut self, line: &str) -> Result<Flow> {
        let intent = parse_intent(line);
        match intent.action.as_str() {
            "noop" => {}
            "send" => {
                if let Some(message) = intent.message {
                    self.submit_message(message)?;
                }
            }
            "help" => {
                self.view
                    .notice(&format!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")))?;
            }
            "voice" => self.start_voice()?,
            "tasks" => self.view.show_tasks()?,
            "raw" => self.view.show_raw()?,
            "health" => match self.engine.health() {
                Ok(payload) => self.view.notice(&format!("Backend health: {payload}"))?,
                Err(err) => self
                    .view
                    .notice(&format!("Health check failed: {}", failure_message(&err)))?,
            },
            "export" => {
                let path = intent
                    .command_args
                    .get("path")
                    .and_then(Value::as_str)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_PATH));
                self.export(&path)?;
            }
            "quit" => return Ok(Flow::Exit),
            _ => {
                let command = intent
                    .command_args
                    .get("command")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.view.notice(&format!(
                    "Unknown command /{command}. Type /help for commands."
                ))?;
            }
        }
        Ok(Flow::Continue)
    }

    fn submit_message(&mut self, text: String) -> Result<()> {
        let Some(guard) = self.submit.try_lock() else {
            self.view
                .notice("Still waiting for the previous reply; message not sent.")?;
            return Ok(());
        };
        self.view.add_message(Role::User, &text)?;

        let engine = self.engine.clone();
        let tx = self.tx.clone();
        thread::Builder::new()
            .name("taskchat-request".to_string())
            .spawn(move || {
                let result = engine.send_message(&text);
                let _ = tx.send(LoopEvent::Reply(result, guard));
            })
            .context("request thread spawn failed")?;
        Ok(())
    }

    fn start_voice(&mut self) -> Result<()> {
        let tx = self.tx.clone();
        let started = self.voice.start(move |result| {
            let event = match result {
                Ok(text) => LoopEvent::Transcript(text),
                Err(err) => LoopEvent::VoiceFailed(format!("{err:#}")),
            };
            let _ = tx.send(event);
        });
        match started {
            Ok(VoiceStart::Started) => self.view.notice(&format!(
                "Listening ({})...",
                self.voice.recognizer_name()
            )),
            Ok(VoiceStart::AlreadyRecording) => self.view.notice("Already listening."),
            Ok(VoiceStart::Unsupported) => self.view.notice(
                "Voice input is not available here. Set WHISPER_CPP_BIN and WHISPER_CPP_MODEL and install arecord or ffmpeg.",
            ),
            Err(err) => self.view.notice(&format!("Voice capture failed: {err:#}")),
        }
    }

    fn export(&mut self, path: &Path) -> Result<()> {
        match write_transcript(path, self.events.session_id(), self.view.transcript()) {
            Ok(()) => {
                let _ = self.events.emit(
                    "transcript_exported",
                    map_object(json!({
                        "path": path.to_string_lossy().to_string(),
                        "turns": self.view.transcript().len(),
                    })),
                );
                self.view
                    .notice(&format!("Transcript written to {}", path.display()))
            }
            Err(err) => self.view.notice(&format!("Export failed: {err:#}")),
        }
    }
}
