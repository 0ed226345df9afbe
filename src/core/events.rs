//! Canonical caller-facing events and the queue that carries them to stdout.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Event written to the caller, one JSON object per line.
///
/// The vocabulary is provider independent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// Transport connected
    Open,
    /// Endpoint that accepted the connection
    WsUrl { url: String },
    /// Provider announced its session
    Session { id: String },
    /// Provider accepted the session configuration
    SessionUpdated,
    /// Latest cumulative partial transcript
    Partial { text: String },
    /// Final transcript of a turn
    Final { text: String },
    /// Turn boundary, carrying the final transcript
    TurnEnd { text: String },
    SpeechStart,
    SpeechStop,
    /// Synthesized audio chunk, base64 as delivered by the provider
    Audio { b64: String },
    ResponseDone,
    /// Provider finished the session
    End,
    /// Transport closed
    Close { code: Option<u16>, msg: String },
    Error { message: String },
    /// Raw inbound provider frame, only when raw forwarding is enabled
    Provider { message: serde_json::Value },
}

impl BridgeEvent {
    pub fn error(message: impl Into<String>) -> Self {
        BridgeEvent::Error {
            message: message.into(),
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::Open => "open",
            BridgeEvent::WsUrl { .. } => "ws_url",
            BridgeEvent::Session { .. } => "session",
            BridgeEvent::SessionUpdated => "session_updated",
            BridgeEvent::Partial { .. } => "partial",
            BridgeEvent::Final { .. } => "final",
            BridgeEvent::TurnEnd { .. } => "turn_end",
            BridgeEvent::SpeechStart => "speech_start",
            BridgeEvent::SpeechStop => "speech_stop",
            BridgeEvent::Audio { .. } => "audio",
            BridgeEvent::ResponseDone => "response_done",
            BridgeEvent::End => "end",
            BridgeEvent::Close { .. } => "close",
            BridgeEvent::Error { .. } => "error",
            BridgeEvent::Provider { .. } => "provider",
        }
    }

    /// Serialize as a single output line, without the trailing newline.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Producer side of the caller event stream.
///
/// Emitting never blocks; the single writer task drains the queue in order.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: BridgeEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::debug!(event = e.0.name(), "Event stream closed; dropping event");
        }
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = BridgeEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}
