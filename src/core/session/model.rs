//! Session data owned by the session controller.

use serde::{Deserialize, Serialize};

use super::state::{Direction, SessionState};
use crate::errors::{BridgeError, BridgeResult};

/// Default ASR input sample rate (PCM 16-bit mono).
pub const DEFAULT_ASR_SAMPLE_RATE: u32 = 16000;

/// TTS output sample rate (PCM 16-bit mono).
pub const TTS_SAMPLE_RATE: u32 = 24000;

/// Parameters sent to the provider in the single configuration update.
///
/// The core treats these as opaque pass-through values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    pub language: String,
    pub sample_rate: u32,
    pub corpus_text: Option<String>,
    pub enable_turn_detection: bool,
    pub turn_detection_threshold: f32,
    pub turn_detection_silence_ms: u32,
    pub voice: String,
    pub mode: TtsMode,
    pub language_type: String,
    pub speech_rate: Option<f32>,
    pub pitch_rate: Option<f32>,
    pub volume: Option<u32>,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            sample_rate: DEFAULT_ASR_SAMPLE_RATE,
            corpus_text: None,
            enable_turn_detection: false,
            turn_detection_threshold: 0.0,
            turn_detection_silence_ms: 400,
            voice: "Cherry".to_string(),
            mode: TtsMode::ServerCommit,
            language_type: "English".to_string(),
            speech_rate: None,
            pitch_rate: None,
            volume: None,
        }
    }
}

/// Partial parameter update from the caller or a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsUpdate {
    pub language: Option<String>,
    pub sample_rate: Option<u32>,
    pub corpus_text: Option<String>,
    pub enable_turn_detection: Option<bool>,
    pub turn_detection_threshold: Option<f32>,
    #[serde(alias = "turn_detection_silence_duration_ms")]
    pub turn_detection_silence_ms: Option<u32>,
    pub voice: Option<String>,
    pub mode: Option<TtsMode>,
    pub language_type: Option<String>,
    pub speech_rate: Option<f32>,
    pub pitch_rate: Option<f32>,
    pub volume: Option<u32>,
}

impl SessionParams {
    /// Defaults appropriate for a direction.
    pub fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::Asr => Self::default(),
            Direction::Tts => Self {
                sample_rate: TTS_SAMPLE_RATE,
                ..Self::default()
            },
        }
    }

    /// Overlay every field present in `update`.
    pub fn apply(&mut self, update: &ParamsUpdate) {
        if let Some(ref v) = update.language {
            self.language = v.clone();
        }
        if let Some(v) = update.sample_rate {
            self.sample_rate = v;
        }
        if let Some(ref v) = update.corpus_text {
            // An empty corpus means "no corpus".
            self.corpus_text = if v.is_empty() { None } else { Some(v.clone()) };
        }
        if let Some(v) = update.enable_turn_detection {
            self.enable_turn_detection = v;
        }
        if let Some(v) = update.turn_detection_threshold {
            self.turn_detection_threshold = v;
        }
        if let Some(v) = update.turn_detection_silence_ms {
            self.turn_detection_silence_ms = v;
        }
        if let Some(ref v) = update.voice {
            self.voice = v.clone();
        }
        if let Some(v) = update.mode {
            self.mode = v;
        }
        if let Some(ref v) = update.language_type {
            self.language_type = v.clone();
        }
        if update.speech_rate.is_some() {
            self.speech_rate = update.speech_rate;
        }
        if update.pitch_rate.is_some() {
            self.pitch_rate = update.pitch_rate;
        }
        if update.volume.is_some() {
            self.volume = update.volume;
        }
    }
}

/// TTS commit strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsMode {
    /// Provider decides when to synthesize buffered text
    #[default]
    ServerCommit,
    /// Synthesis starts on explicit commit
    Commit,
}

impl TtsMode {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsMode::ServerCommit => "server_commit",
            TtsMode::Commit => "commit",
        }
    }
}

/// One logical streaming session.
#[derive(Debug, Clone)]
pub struct Session {
    pub direction: Direction,
    state: SessionState,
    pub params: SessionParams,
    /// Set exactly once, when the provider acknowledges configuration.
    ready: bool,
    /// Set once the configuration update has been dispatched.
    configured: bool,
    /// Latest cumulative partial transcript.
    transcript: String,
    /// A commit was sent and its final transcript has not arrived yet.
    pub awaiting_final: bool,
    /// Provider session id, when announced.
    pub session_id: Option<String>,
}

impl Session {
    pub fn new(direction: Direction, params: SessionParams) -> Self {
        Self {
            direction,
            state: SessionState::Init,
            params,
            ready: false,
            configured: false,
            transcript: String::new(),
            awaiting_final: false,
            session_id: None,
        }
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    #[inline]
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    #[inline]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: SessionState) -> BridgeResult<()> {
        if self.state == next {
            return Ok(());
        }
        if !self.state.can_transition_to(next) {
            return Err(BridgeError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(direction = %self.direction, from = %self.state, to = %next, "session transition");
        self.state = next;
        Ok(())
    }

    /// Record that configuration is being dispatched.
    ///
    /// Returns `false` when it already was; callers must not send again.
    pub fn mark_configured(&mut self) -> bool {
        if self.configured {
            return false;
        }
        self.configured = true;
        true
    }

    /// Set the ready flag. Returns `true` only the first time.
    pub fn mark_ready(&mut self) -> bool {
        if self.ready {
            return false;
        }
        self.ready = true;
        true
    }

    /// Replace the buffered partial transcript with a new cumulative snapshot.
    pub fn replace_transcript(&mut self, snapshot: &str) {
        self.transcript.clear();
        self.transcript.push_str(snapshot);
    }

    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
    }
}
