use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{bail, Context, Result};
use serde_json::json;
use taskchat_contracts::events::EventWriter;
use tempfile::TempDir;

use crate::map_object;

const DEFAULT_CLIP_SECONDS: u64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Recording,
}

/// One-shot speech-to-text backend.
pub trait SpeechRecognizer: Send + Sync {
    fn name(&self) -> &str;
    /// Whether the host can record and transcribe at all.
    fn is_supported(&self) -> bool;
    /// Records one utterance and returns its transcript.
    fn recognize_once(&self) -> Result<String>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceStart {
    Started,
    AlreadyRecording,
    Unsupported,
}

/// Owns the recording state and runs at most one recognition at a time on a
/// worker thread.
#[derive(Clone)]
pub struct VoiceCapture {
    recognizer: Arc<dyn SpeechRecognizer>,
    state: Arc<Mutex<VoiceState>>,
    events: EventWriter,
}

impl VoiceCapture {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, events: EventWriter) -> Self {
        Self {
            recognizer,
            state: Arc::new(Mutex::new(VoiceState::Idle)),
            events,
        }
    }

    pub fn state(&self) -> VoiceState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(VoiceState::Idle)
    }

    pub fn recognizer_name(&self) -> &str {
        self.recognizer.name()
    }

    /// Starts a recognition session unless one is already running.
    /// `on_done` runs on the worker thread after the state is back to idle.
    pub fn start<F>(&self, on_done: F) -> Result<VoiceStart>
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        {
            let mut state = self
                .state
                .lock()
                .map_err(|_| anyhow::anyhow!("voice state lock poisoned"))?;
            if *state == VoiceState::Recording {
                return Ok(VoiceStart::AlreadyRecording);
            }
            if !self.recognizer.is_supported() {
                return Ok(VoiceStart::Unsupported);
            }
            *state = VoiceState::Recording;
        }

        let guard = RecordingGuard {
            state: Arc::clone(&self.state),
        };
        let recognizer = Arc::clone(&self.recognizer);
        let events = self.events.clone();
        events.emit(
            "voice_started",
            map_object(json!({ "recognizer": recognizer.name() })),
        )?;

        let spawned = thread::Builder::new()
            .name("taskchat-voice".to_string())
            .spawn(move || {
                let result = recognizer.recognize_once();
                drop(guard);
                let _ = match &result {
                    Ok(text) => events.emit(
                        "voice_transcript",
                        map_object(json!({ "chars": text.chars().count() })),
                    ),
                    Err(err) => events.emit(
                        "voice_failed",
                        map_object(json!({ "error": format!("{err:#}") })),
                    ),
                };
                on_done(result);
            });
        spawned
            .map(|_| VoiceStart::Started)
            .context("voice thread spawn failed")
    }
}

struct RecordingGuard {
    state: Arc<Mutex<VoiceState>>,
}

impl Drop for RecordingGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            *state = VoiceState::Idle;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recorder {
    Arecord,
    Ffmpeg,
}

impl Recorder {
    fn detect() -> Option<Self> {
        if probe("arecord", "--version") {
            return Some(Self::Arecord);
        }
        if probe("ffmpeg", "-version") {
            return Some(Self::Ffmpeg);
        }
        None
    }

    fn record(self, path: &Path, seconds: u64) -> Result<()> {
        let seconds_arg = seconds.to_string();
        let mut command = match self {
            Self::Arecord => {
                let mut command = Command::new("arecord");
                command.args([
                    "-q", "-f", "S16_LE", "-r", "16000", "-c", "1", "-t", "wav", "-d",
                ]);
                command.arg(&seconds_arg).arg(path);
                command
            }
            Self::Ffmpeg => {
                let mut command = Command::new("ffmpeg");
                command.args([
                    "-hide_banner", "-loglevel", "error", "-f", "alsa", "-i", "default", "-t",
                ]);
                command
                    .arg(&seconds_arg)
                    .args(["-ac", "1", "-ar", "16000", "-y"])
                    .arg(path);
                command
            }
        };
        let status = command
            .stdin(Stdio::null())
            .status()
            .with_context(|| format!("failed to start {self:?} recorder"))?;
        if !status.success() {
            bail!(
                "{self:?} recorder exited with code {}",
                status.code().unwrap_or(-1)
            );
        }
        Ok(())
    }
}

/// Records a short clip from the default input device and transcribes it
/// with a local whisper.cpp build.
///
/// Configured through `WHISPER_CPP_BIN`, `WHISPER_CPP_MODEL`, optional
/// `WHISPER_LANG` (default `en`) and `TASKCHAT_VOICE_SECONDS` (default 5).
#[derive(Debug, Clone)]
pub struct WhisperCppRecognizer {
    bin: Option<PathBuf>,
    model: Option<PathBuf>,
    lang: String,
    clip_seconds: u64,
    recorder: Option<Recorder>,
    tmp_dir: PathBuf,
}

impl WhisperCppRecognizer {
    pub fn from_env() -> Self {
        Self {
            bin: env_path("WHISPER_CPP_BIN"),
            model: env_path("WHISPER_CPP_MODEL"),
            lang: env::var("WHISPER_LANG")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "en".to_string()),
            clip_seconds: env::var("TASKCHAT_VOICE_SECONDS")
                .ok()
                .and_then(|value| value.trim().parse::<u64>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_CLIP_SECONDS),
            recorder: Recorder::detect(),
            tmp_dir: env::temp_dir(),
        }
    }

    /// Private scratch directory for one recording; removed on drop along
    /// with the clip and the transcript file.
    fn clip_dir(&self) -> Result<TempDir> {
        std::fs::create_dir_all(&self.tmp_dir)?;
        tempfile::Builder::new()
            .prefix("taskchat-voice-")
            .tempdir_in(&self.tmp_dir)
            .with_context(|| format!("failed creating clip dir in {}", self.tmp_dir.display()))
    }

    fn transcribe(&self, bin: &Path, model: &Path, wav_path: &Path) -> Result<String> {
        let out_prefix = wav_path.with_extension("");
        let status = Command::new(bin)
            .arg("-m")
            .arg(model)
            .arg("-f")
            .arg(wav_path)
            .args(["-l", self.lang.as_str(), "-otxt", "-of"])
            .arg(&out_prefix)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .with_context(|| format!("failed to start whisper.cpp ({})", bin.display()))?;
        if !status.success() {
            bail!(
                "whisper.cpp exited with code {}",
                status.code().unwrap_or(-1)
            );
        }
        let txt_path = out_prefix.with_extension("txt");
        let text = std::fs::read_to_string(&txt_path)
            .with_context(|| format!("whisper.cpp output missing ({})", txt_path.display()))?;
        Ok(text.split_whitespace().collect::<Vec<&str>>().join(" "))
    }
}

impl SpeechRecognizer for WhisperCppRecognizer {
    fn name(&self) -> &str {
        "whisper.cpp"
    }

    fn is_supported(&self) -> bool {
        let configured = |path: &Option<PathBuf>| path.as_ref().is_some_and(|path| path.exists());
        self.recorder.is_some() && configured(&self.bin) && configured(&self.model)
    }

    fn recognize_once(&self) -> Result<String> {
        let (Some(bin), Some(model), Some(recorder)) =
            (self.bin.as_deref(), self.model.as_deref(), self.recorder)
        else {
            bail!("speech recognition is not available on this host");
        };
        let clip_dir = self.clip_dir()?;
        let wav_path = clip_dir.path().join("clip.wav");

        recorder
            .record(&wav_path, self.clip_seconds)
            .and_then(|()| self.transcribe(bin, model, &wav_path))
    }
}

fn probe(program: &str, flag: &str) -> bool {
    Command::new(program)
        .arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use anyhow::{bail, Result};
    use taskchat_contracts::events::EventWriter;

    use super::{SpeechRecognizer, VoiceCapture, VoiceStart, VoiceState, WhisperCppRecognizer};

    struct ScriptedRecognizer {
        supported: bool,
        release: Mutex<mpsc::Receiver<Result<String, String>>>,
    }

    impl SpeechRecognizer for ScriptedRecognizer {
        fn name(&self) -> &str {
            "scripted"
        }

        fn is_supported(&self) -> bool {
            self.supported
        }

        fn recognize_once(&self) -> Result<String> {
            let next = self
                .release
                .lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?
                .recv()?;
            match next {
                Ok(text) => Ok(text),
                Err(message) => bail!(message),
            }
        }
    }

    fn scripted(supported: bool) -> (VoiceCapture, mpsc::Sender<Result<String, String>>) {
        let (tx, rx) = mpsc::channel();
        let recognizer = ScriptedRecognizer {
            supported,
            release: Mutex::new(rx),
        };
        (
            VoiceCapture::new(Arc::new(recognizer), EventWriter::disabled("voice-test")),
            tx,
        )
    }

    #[test]
    fn second_start_is_refused_while_recording() -> Result<()> {
        let (capture, release) = scripted(true);
        let (done_tx, done_rx) = mpsc::channel();

        let tx = done_tx.clone();
        assert_eq!(
            capture.start(move |result| {
                let _ = tx.send(result.map_err(|err| err.to_string()));
            })?,
            VoiceStart::Started
        );
        assert_eq!(capture.state(), VoiceState::Recording);
        assert_eq!(capture.start(|_| {})?, VoiceStart::AlreadyRecording);

        release.send(Ok("add laundry".to_string()))?;
        let outcome = done_rx.recv_timeout(Duration::from_secs(5))?;
        assert_eq!(outcome, Ok("add laundry".to_string()));
        assert_eq!(capture.state(), VoiceState::Idle);

        let tx = done_tx.clone();
        assert_eq!(
            capture.start(move |result| {
                let _ = tx.send(result.map_err(|err| err.to_string()));
            })?,
            VoiceStart::Started
        );
        release.send(Ok("again".to_string()))?;
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(5))?, Ok("again".to_string()));
        Ok(())
    }

    #[test]
    fn failure_returns_to_idle() -> Result<()> {
        let (capture, release) = scripted(true);
        let (done_tx, done_rx) = mpsc::channel();
        capture.start(move |result| {
            let _ = done_tx.send(result.map_err(|err| err.to_string()));
        })?;

        release.send(Err("microphone busy".to_string()))?;
        let outcome = done_rx.recv_timeout(Duration::from_secs(5))?;
        assert_eq!(outcome, Err("microphone busy".to_string()));
        assert_eq!(capture.state(), VoiceState::Idle);
        Ok(())
    }

    #[test]
    fn unsupported_host_never_records() -> Result<()> {
        let (capture, _release) = scripted(false);
        assert_eq!(capture.start(|_| {})?, VoiceStart::Unsupported);
        assert_eq!(capture.state(), VoiceState::Idle);
        Ok(())
    }

    #[test]
    fn whisper_without_configuration_is_unsupported() {
        let recognizer = WhisperCppRecognizer {
            bin: None,
            model: None,
            lang: "en".to_string(),
            clip_seconds: 5,
            recorder: None,
            tmp_dir: std::env::temp_dir(),
        };
        assert!(!recognizer.is_supported());
        assert!(recognizer.recognize_once().is_err());
    }

    #[test]
    fn each_recording_gets_its_own_scratch_dir() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let recognizer = WhisperCppRecognizer {
            bin: None,
            model: None,
            lang: "en".to_string(),
            clip_seconds: 5,
            recorder: None,
            tmp_dir: temp.path().join("voice"),
        };

        let first = recognizer.clip_dir()?;
        let second = recognizer.clip_dir()?;
        assert_ne!(first.path(), second.path());
        assert!(first.path().starts_with(temp.path().join("voice")));

        let kept = first.path().to_path_buf();
        std::fs::write(kept.join("clip.wav"), b"RIFF")?;
        drop(first);
        assert!(!kept.exists());
        Ok(())
    }
}
