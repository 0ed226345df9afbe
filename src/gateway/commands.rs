//! Caller command lines.
//!
//! One JSON object per line, tagged by `type`:
//!
//! ```text
//! {"type":"config","language":"en","corpus_text":"..."}
//! {"type":"audio","audio_b64":"..."}      (alias field: b64)
//! {"type":"text","text":"..."}
//! {"type":"commit"}
//! {"type":"close"}                         (alias: stop)
//! ```

use base64::prelude::*;
use bytes::Bytes;
use serde::Deserialize;

use crate::core::session::{Direction, ParamsUpdate, SessionCommand};
use crate::errors::{BridgeError, BridgeResult};

/// Maximum accepted size of a single text unit (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

/// Incoming command line from the caller
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallerCommand {
    /// Session parameters, before configuration is dispatched
    Config(ParamsUpdate),

    /// Base64 PCM audio (recognition)
    Audio {
        #[serde(alias = "b64", default)]
        audio_b64: String,
    },

    /// Text to synthesize
    Text {
        #[serde(default)]
        text: String,
    },

    /// End of turn
    Commit,

    /// Graceful shutdown
    #[serde(alias = "stop")]
    Close,
}

impl CallerCommand {
    /// Validate the command for `direction` and turn it into a session command.
    pub fn into_session_command(self, direction: Direction) -> BridgeResult<SessionCommand> {
        match self {
            CallerCommand::Config(update) => Ok(SessionCommand::Configure(update)),
            CallerCommand::Audio { audio_b64 } => {
                if direction != Direction::Asr {
                    return Err(BridgeError::CallerInput(format!(
                        "audio is not accepted by the {direction} bridge"
                    )));
                }
                let audio = BASE64_STANDARD
                    .decode(audio_b64.trim())
                    .map_err(|e| BridgeError::CallerInput(format!("invalid base64 audio: {e}")))?;
                if audio.is_empty() {
                    return Err(BridgeError::CallerInput("empty audio payload".to_string()));
                }
                Ok(SessionCommand::Audio(Bytes::from(audio)))
            }
            CallerCommand::Text { text } => {
                if direction != Direction::Tts {
                    return Err(BridgeError::CallerInput(format!(
                        "text is not accepted by the {direction} bridge"
                    )));
                }
                if text.is_empty() {
                    return Err(BridgeError::CallerInput("empty text".to_string()));
                }
                if text.len() > MAX_TEXT_SIZE {
                    return Err(BridgeError::CallerInput(format!(
                        "text exceeds {MAX_TEXT_SIZE} bytes"
                    )));
                }
                Ok(SessionCommand::Text(text))
            }
            CallerCommand::Commit => Ok(SessionCommand::Commit),
            CallerCommand::Close => Ok(SessionCommand::Close),
        }
    }
}

/// Parse one input line.
///
/// Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str, direction: Direction) -> BridgeResult<Option<SessionCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let command: CallerCommand = serde_json::from_str(line)
        .map_err(|e| BridgeError::CallerInput(format!("unrecognized command line: {e}")))?;
    command.into_session_command(direction).map(Some)
}

/// Whether a session command must pass the readiness gate.
#[inline]
pub fn is_gated(command: &SessionCommand) -> bool {
    matches!(command, SessionCommand::Audio(_) | SessionCommand::Text(_))
}
