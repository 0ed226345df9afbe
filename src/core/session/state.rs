//! Session lifecycle states and the allowed transitions between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of a bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Caller audio in, transcripts out
    Asr,
    /// Caller text in, synthesized audio out
    Tts,
}

impl Direction {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asr => "asr",
            Direction::Tts => "tts",
        }
    }

    /// Default provider model for this direction.
    pub fn default_model(&self) -> &'static str {
        match self {
            Direction::Asr => "qwen3-asr-flash-realtime",
            Direction::Tts => "qwen3-tts-flash-realtime",
        }
    }

    /// Environment variable that overrides the endpoint list.
    pub fn endpoint_env_var(&self) -> &'static str {
        match self {
            Direction::Asr => "DASHSCOPE_ASR_WS_URL",
            Direction::Tts => "DASHSCOPE_TTS_WS_URL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of one streaming session.
///
/// `INIT` is initial; `CLOSED` and `ERROR` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Init,
    Connecting,
    Open,
    SessionCreated,
    Configuring,
    Ready,
    Streaming,
    Finishing,
    Closed,
    Error,
}

impl SessionState {
    /// Whether no further transition is possible.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Error)
    }

    /// Whether content may be forwarded in this state.
    #[inline]
    pub fn accepts_content(&self) -> bool {
        matches!(
            self,
            SessionState::Ready | SessionState::Streaming | SessionState::Finishing
        )
    }

    /// Whether a caller `commit` is meaningful in this state.
    #[inline]
    pub fn accepts_commit(&self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Streaming)
    }

    /// Check whether moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }
        if next == Error {
            return true;
        }
        match (self, next) {
            (Init, Connecting) => true,
            (Connecting, Open) => true,
            (Open, SessionCreated) => true,
            (SessionCreated, Configuring) => true,
            (Configuring, Ready) => true,
            (Ready, Streaming) => true,
            (Ready | Streaming, Finishing) => true,
            // Graceful shutdown is allowed from any connected state.
            (Open | SessionCreated | Configuring, Finishing) => true,
            (Finishing, Closed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Init => "INIT",
            SessionState::Connecting => "CONNECTING",
            SessionState::Open => "OPEN",
            SessionState::SessionCreated => "SESSION_CREATED",
            SessionState::Configuring => "CONFIGURING",
            SessionState::Ready => "READY",
            SessionState::Streaming => "STREAMING",
            SessionState::Finishing => "FINISHING",
            SessionState::Closed => "CLOSED",
            SessionState::Error => "ERROR",
        };
        write!(f, "{name}")
    }
}
