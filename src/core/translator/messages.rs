//! Provider WebSocket message types.
//!
//! The provider speaks an OpenAI-Realtime-style protocol: every frame is a JSON
//! object tagged by `type`.
//!
//! # Protocol Overview
//!
//! Client events (sent to provider):
//! - session.update - Configure the session (exactly once)
//! - input_audio_buffer.append - Append base64 audio
//! - input_audio_buffer.commit - End the current ASR turn
//! - input_text_buffer.append - Append text to synthesize
//! - input_text_buffer.commit - Synthesize buffered text
//! - session.finish - No more input; provider flushes and finishes
//!
//! Server events (received from provider):
//! - session.created / session.updated
//! - conversation.item.input_audio_transcription.text - Partial transcript
//! - conversation.item.input_audio_transcription.completed - Final transcript
//! - conversation.item.input_audio_transcription.failed
//! - input_audio_buffer.speech_started / speech_stopped
//! - response.audio.delta - Synthesized audio chunk (base64)
//! - response.done
//! - session.finished
//! - error

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::session::{Direction, SessionParams};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration sent in `session.update`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SessionConfig {
    Asr(AsrSessionConfig),
    Tts(TtsSessionConfig),
}

/// ASR session configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AsrSessionConfig {
    /// Response modalities (text only for recognition)
    pub modalities: Vec<String>,
    /// Input audio format
    pub input_audio_format: String,
    /// Input sample rate in Hz
    pub sample_rate: u32,
    /// Transcription settings
    pub input_audio_transcription: InputAudioTranscription,
    /// Server VAD settings; `null` disables automatic turn detection
    pub turn_detection: Option<TurnDetection>,
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, Serialize)]
pub struct InputAudioTranscription {
    /// Language hint (e.g., "en", "zh")
    pub language: String,
    /// Context corpus to bias recognition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus: Option<Corpus>,
}

/// Recognition context corpus.
#[derive(Debug, Clone, Serialize)]
pub struct Corpus {
    pub text: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold
        threshold: f32,
        /// Silence duration in ms
        silence_duration_ms: u32,
    },
}

/// TTS session configuration.
#[derive(Debug, Clone, Serialize)]
pub struct TtsSessionConfig {
    pub voice: String,
    pub mode: String,
    pub language_type: String,
    pub response_format: String,
    pub sample_rate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_rate: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch_rate: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u32>,
}

impl SessionConfig {
    /// Build the direction-specific configuration from session parameters.
    pub fn from_params(direction: Direction, params: &SessionParams) -> Self {
        match direction {
            Direction::Asr => SessionConfig::Asr(AsrSessionConfig {
                modalities: vec!["text".to_string()],
                input_audio_format: "pcm".to_string(),
                sample_rate: params.sample_rate,
                input_audio_transcription: InputAudioTranscription {
                    language: params.language.clone(),
                    corpus: params
                        .corpus_text
                        .as_ref()
                        .map(|text| Corpus { text: text.clone() }),
                },
                turn_detection: params.enable_turn_detection.then(|| {
                    TurnDetection::ServerVad {
                        threshold: params.turn_detection_threshold,
                        silence_duration_ms: params.turn_detection_silence_ms,
                    }
                }),
            }),
            Direction::Tts => SessionConfig::Tts(TtsSessionConfig {
                voice: params.voice.clone(),
                mode: params.mode.as_str().to_string(),
                language_type: params.language_type.clone(),
                response_format: "pcm".to_string(),
                sample_rate: params.sample_rate,
                speech_rate: params.speech_rate,
                pitch_rate: params.pitch_rate,
                volume: params.volume,
            }),
        }
    }
}

// =============================================================================
// Client Events (sent to provider)
// =============================================================================

/// Client events sent to the provider.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionConfig,
    },

    /// Append audio to input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },

    /// Commit the input audio buffer
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    /// Append text to synthesize
    #[serde(rename = "input_text_buffer.append")]
    InputTextBufferAppend {
        /// Text content
        text: String,
    },

    /// Commit the input text buffer
    #[serde(rename = "input_text_buffer.commit")]
    InputTextBufferCommit,

    /// Finish the session
    #[serde(rename = "session.finish")]
    SessionFinish,
}

impl ClientEvent {
    /// Create an audio append event from raw bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }

    /// Create the configuration update for a session.
    pub fn session_update(direction: Direction, params: &SessionParams) -> Self {
        ClientEvent::SessionUpdate {
            session: SessionConfig::from_params(direction, params),
        }
    }

    /// Commit event appropriate for the direction.
    pub fn commit(direction: Direction) -> Self {
        match direction {
            Direction::Asr => ClientEvent::InputAudioBufferCommit,
            Direction::Tts => ClientEvent::InputTextBufferCommit,
        }
    }

    /// Wire name of the event, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            ClientEvent::InputAudioBufferCommit => "input_audio_buffer.commit",
            ClientEvent::InputTextBufferAppend { .. } => "input_text_buffer.append",
            ClientEvent::InputTextBufferCommit => "input_text_buffer.commit",
            ClientEvent::SessionFinish => "session.finish",
        }
    }
}

// =============================================================================
// Server Events (received from provider)
// =============================================================================

/// Server events received from the provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error occurred
    #[serde(rename = "error")]
    Error {
        /// Error details
        #[serde(default)]
        error: ApiError,
    },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: SessionInfo,
    },

    /// Session configuration accepted
    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        session: SessionInfo,
    },

    /// Speech started (VAD detected speech)
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,

    /// Speech stopped (VAD detected silence)
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,

    /// Incremental transcript snapshot
    #[serde(rename = "conversation.item.input_audio_transcription.text")]
    TranscriptionText {
        /// Confirmed text
        #[serde(default)]
        text: String,
        /// Unconfirmed cumulative text
        #[serde(default)]
        stash: String,
    },

    /// Input audio transcription completed
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        /// Transcript text
        transcript: String,
    },

    /// Input audio transcription failed
    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    TranscriptionFailed {
        #[serde(default)]
        error: ApiError,
    },

    /// Audio delta (audio data chunk)
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Base64-encoded audio delta
        delta: String,
    },

    /// Response done
    #[serde(rename = "response.done")]
    ResponseDone,

    /// Session finished; no more events will follow
    #[serde(rename = "session.finished")]
    SessionFinished,

    /// Any event type this bridge does not translate
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

/// API error information.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    /// Single-line description for the caller.
    pub fn describe(&self) -> String {
        match (&self.code, self.message.is_empty()) {
            (Some(code), false) => format!("{}: {}", code, self.message),
            (Some(code), true) => code.clone(),
            (None, false) => self.message.clone(),
            (None, true) => "provider error".to_string(),
        }
    }
}

/// Session information.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionInfo {
    /// Session ID
    #[serde(default)]
    pub id: String,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::TtsMode;

    #[test]
    fn test_client_event_serialization() {
        let event = ClientEvent::InputAudioBufferCommit;
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"input_audio_buffer.commit"}"#);
    }

    #[test]
    fn test_audio_append() {
        let data = vec![0u8, 1, 2, 3];
        let event = ClientEvent::audio_append(&data);
        match event {
            ClientEvent::InputAudioBufferAppend { audio } => {
                let decoded = BASE64_STANDARD.decode(&audio).unwrap();
                assert_eq!(decoded, data);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_asr_session_update_without_vad_sends_null_turn_detection() {
        let params = SessionParams {
            language: "en".to_string(),
            corpus_text: Some("band score".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(ClientEvent::session_update(Direction::Asr, &params))
            .unwrap();
        assert_eq!(json["type"], "session.update");
        assert_eq!(json["session"]["modalities"][0], "text");
        assert_eq!(json["session"]["input_audio_format"], "pcm");
        assert_eq!(json["session"]["sample_rate"], 16000);
        assert_eq!(
            json["session"]["input_audio_transcription"]["corpus"]["text"],
            "band score"
        );
        assert!(json["session"]["turn_detection"].is_null());
        assert!(json["session"].get("turn_detection").is_some());
    }

    #[test]
    fn test_asr_session_update_with_vad() {
        let params = SessionParams {
            enable_turn_detection: true,
            turn_detection_threshold: 0.2,
            turn_detection_silence_ms: 600,
            ..Default::default()
        };
        let json = serde_json::to_value(ClientEvent::session_update(Direction::Asr, &params))
            .unwrap();
        assert_eq!(json["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(json["session"]["turn_detection"]["silence_duration_ms"], 600);
        assert!(
            json["session"]["input_audio_transcription"]
                .get("corpus")
                .is_none()
        );
    }

    #[test]
    fn test_tts_session_update() {
        let params = SessionParams {
            voice: "Ethan".to_string(),
            mode: TtsMode::Commit,
            sample_rate: 24000,
            volume: Some(60),
            ..Default::default()
        };
        let json = serde_json::to_value(ClientEvent::session_update(Direction::Tts, &params))
            .unwrap();
        assert_eq!(json["session"]["voice"], "Ethan");
        assert_eq!(json["session"]["mode"], "commit");
        assert_eq!(json["session"]["response_format"], "pcm");
        assert_eq!(json["session"]["volume"], 60);
        assert!(json["session"].get("speech_rate").is_none());
    }

    #[test]
    fn test_server_event_deserialization() {
        let json = r#"{
            "type": "error",
            "error": {
                "type": "invalid_request_error",
                "code": "InvalidParameter",
                "message": "Test error"
            }
        }"#;
        let event = ServerEvent::parse(json).unwrap();
        match event {
            ServerEvent::Error { error } => {
                assert_eq!(error.describe(), "InvalidParameter: Test error");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_unknown_event_type_is_tolerated() {
        let event = ServerEvent::parse(r#"{"type":"rate_limits.updated","rate_limits":[]}"#)
            .unwrap();
        assert!(matches!(event, ServerEvent::Unknown));
    }

    #[test]
    fn test_known_type_with_missing_field_is_an_error() {
        assert!(ServerEvent::parse(r#"{"type":"response.audio.delta"}"#).is_err());
        assert!(ServerEvent::parse("not json").is_err());
    }

    #[test]
    fn test_partial_transcript_fields() {
        let event = ServerEvent::parse(
            r#"{"type":"conversation.item.input_audio_transcription.text","text":"","stash":"hello wor"}"#,
        )
        .unwrap();
        match event {
            ServerEvent::TranscriptionText { text, stash } => {
                assert!(text.is_empty());
                assert_eq!(stash, "hello wor");
            }
            _ => panic!("Wrong event type"),
        }
    }
}
