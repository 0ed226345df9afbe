//! Protocol gateway: the caller's JSONL line protocol.
//!
//! The gateway reads command lines, routes audio and text through the
//! readiness gate, and hands everything to the session task. Events flow
//! back through a single writer task so output lines never interleave.

pub mod commands;
pub mod writer;

pub use commands::{CallerCommand, parse_line};
pub use writer::spawn_writer;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};

use crate::config::BridgeConfig;
use crate::core::events::{BridgeEvent, EventSink};
use crate::core::gate::{DEFAULT_GATE_TIMEOUT, GateOutcome};
use crate::core::session::{
    SessionCommand, SessionController, SessionHandle, SessionOutcome, SessionSettings,
};
use crate::core::transport::Connector;
use crate::errors::BridgeError;

/// Line counters, logged when the gateway exits.
#[derive(Debug, Default, Clone, Copy)]
struct InputStats {
    lines: u64,
    skipped: u64,
    forwarded: u64,
    dropped: u64,
}

/// One bridge process: one caller stream, one provider session.
pub struct Gateway {
    settings: SessionSettings,
    gate_timeout: Duration,
    connector: Arc<dyn Connector>,
}

impl Gateway {
    pub fn new(settings: SessionSettings, connector: Arc<dyn Connector>) -> Self {
        Self {
            settings,
            gate_timeout: DEFAULT_GATE_TIMEOUT,
            connector,
        }
    }

    /// Build a gateway from a loaded configuration.
    pub fn from_config(config: &BridgeConfig, connector: Arc<dyn Connector>) -> Self {
        Self::new(config.session_settings(), connector).with_gate_timeout(config.gate_timeout)
    }

    pub fn with_gate_timeout(mut self, timeout: Duration) -> Self {
        self.gate_timeout = timeout;
        self
    }

    /// Run until the session ends. Returns the process exit code.
    ///
    /// End of input is treated as `close`.
    pub async fn run<R, W>(self, input: R, output: W) -> i32
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Gateway {
            settings,
            gate_timeout,
            connector,
        } = self;
        let direction = settings.direction;
        let (events, rx) = EventSink::channel();
        let writer = spawn_writer(output, rx);
        let mut session = SessionController::spawn(settings, connector, events.clone());

        tracing::info!(%direction, gate_timeout_ms = gate_timeout.as_millis() as u64, "Bridge started");

        let mut stats = InputStats::default();
        let mut lines = input.lines();

        loop {
            let next = tokio::select! {
                line = lines.next_line() => line,
                _ = session.commands.closed() => {
                    tracing::debug!("Session ended; no longer reading input");
                    break;
                }
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::info!("End of input; closing session");
                    session.send(SessionCommand::Close).await;
                    break;
                }
                Err(e) => {
                    tracing::warn!("Failed to read input: {}", e);
                    session.send(SessionCommand::Close).await;
                    break;
                }
            };

            stats.lines += 1;
            let command = match parse_line(&line, direction) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    stats.skipped += 1;
                    tracing::debug!("Skipping input line: {}", e);
                    continue;
                }
            };

            if commands::is_gated(&command)
                && !pass_gate(&mut session, gate_timeout, &events, &mut stats).await
            {
                continue;
            }

            let closing = matches!(command, SessionCommand::Close);
            if !session.send(command).await {
                tracing::debug!("Session ended; dropping command");
                break;
            }
            if closing {
                break;
            }
        }

        let outcome = session.join().await;
        drop(events);

        tracing::info!(
            lines = stats.lines,
            skipped = stats.skipped,
            forwarded = stats.forwarded,
            dropped = stats.dropped,
            "Bridge stopped"
        );

        match writer.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!("Failed to write events: {}", e),
            Err(e) => tracing::error!("Writer task failed: {}", e),
        }

        if let SessionOutcome::Failed(ref e) = outcome {
            tracing::error!("Session failed: {}", e);
        }
        outcome.exit_code()
    }
}

/// Wait for readiness before forwarding one audio or text unit.
///
/// A timed-out unit is dropped with one `error` event. When the session has
/// already ended the unit is dropped silently; the session emitted its own
/// terminal event.
async fn pass_gate(
    session: &mut SessionHandle,
    gate_timeout: Duration,
    events: &EventSink,
    stats: &mut InputStats,
) -> bool {
    match session.gate.await_ready(gate_timeout).await {
        GateOutcome::Ready => {
            stats.forwarded += 1;
            true
        }
        GateOutcome::TimedOut => {
            stats.dropped += 1;
            let err = BridgeError::Timeout(format!(
                "session not ready after {}ms; dropped input",
                gate_timeout.as_millis()
            ));
            tracing::warn!(error = %err, "Dropping unit");
            events.emit(BridgeEvent::error(err.to_string()));
            false
        }
        GateOutcome::Closed => {
            stats.dropped += 1;
            tracing::debug!("Session ended before ready; dropping unit");
            false
        }
    }
}
