//! Session controller.
//!
//! One spawned task per bridge process. It owns the provider connection and
//! is the only writer of [`Session`] state: caller commands reach it through
//! an mpsc channel, provider frames through the WebSocket stream, and both
//! are processed in one `select!` loop.
//!
//! # Lifecycle
//!
//! ```text
//! INIT -> CONNECTING -> OPEN -> SESSION_CREATED -> CONFIGURING -> READY
//!      -> STREAMING -> FINISHING -> CLOSED        (any -> ERROR)
//! ```

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};

use super::model::{ParamsUpdate, Session, SessionParams};
use super::state::{Direction, SessionState};
use crate::core::events::{BridgeEvent, EventSink};
use crate::core::gate::{ReadinessGate, ReadySignal};
use crate::core::transport::{
    Connector, DEFAULT_CONNECT_TIMEOUT, EndpointSet, WsStream, connect_first,
};
use crate::core::translator::{ClientEvent, Directive, EventTranslator, ServerEvent};
use crate::errors::{BridgeError, BridgeResult, EXIT_OK};

/// Channel capacity for caller commands.
const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Bound on flushing a close frame after the loop ends.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Default grace period between `close` and the remote close acknowledgment.
pub const DEFAULT_FINISH_TIMEOUT: Duration = Duration::from_secs(15);

type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

// =============================================================================
// Commands and Settings
// =============================================================================

/// Command from the caller, already validated by the gateway.
#[derive(Debug)]
pub enum SessionCommand {
    /// Merge parameters before configuration is dispatched
    Configure(ParamsUpdate),
    /// Decoded PCM audio (recognition)
    Audio(Bytes),
    /// Text to synthesize
    Text(String),
    /// End of turn
    Commit,
    /// Graceful shutdown
    Close,
}

/// Everything the controller needs besides the connector.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub direction: Direction,
    pub params: SessionParams,
    pub endpoints: EndpointSet,
    pub connect_timeout: Duration,
    pub finish_timeout: Duration,
    /// Emit each provider frame verbatim as a `provider` event
    pub forward_raw: bool,
}

impl SessionSettings {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            params: SessionParams::for_direction(direction),
            endpoints: EndpointSet::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            finish_timeout: DEFAULT_FINISH_TIMEOUT,
            forward_raw: false,
        }
    }
}

/// How the session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Graceful shutdown, including a soft finish timeout
    Closed,
    /// Terminal failure; exactly one `error` event was emitted
    Failed(BridgeError),
}

impl SessionOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionOutcome::Closed => EXIT_OK,
            SessionOutcome::Failed(e) => e.exit_code(),
        }
    }
}

// =============================================================================
// Session Handle
// =============================================================================

/// Caller-side handle to a running session task.
pub struct SessionHandle {
    /// Command channel into the session task
    pub commands: mpsc::Sender<SessionCommand>,
    /// Readiness gate for audio and content units
    pub gate: ReadinessGate,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    /// Queue a command. Returns `false` once the session task has ended.
    pub async fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Release the command channel and wait for the session to end.
    pub async fn join(self) -> SessionOutcome {
        drop(self.commands);
        drop(self.gate);
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Session task aborted: {}", e);
                SessionOutcome::Failed(BridgeError::Transport(format!(
                    "session task aborted: {e}"
                )))
            }
        }
    }
}

// =============================================================================
// Session Controller
// =============================================================================

/// Single owner of the session state machine.
pub struct SessionController {
    session: Session,
    translator: EventTranslator,
    endpoints: EndpointSet,
    connect_timeout: Duration,
    finish_timeout: Duration,
    forward_raw: bool,
    connector: Arc<dyn Connector>,
    ready: ReadySignal,
    events: EventSink,
    commands: mpsc::Receiver<SessionCommand>,
    finish_deadline: Option<Instant>,
    close_requested: bool,
    close_frame_sent: bool,
}

impl SessionController {
    /// Spawn the session task. Connecting starts immediately.
    pub fn spawn(
        settings: SessionSettings,
        connector: Arc<dyn Connector>,
        events: EventSink,
    ) -> SessionHandle {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (ready, gate) = ReadinessGate::new();

        let controller = SessionController {
            session: Session::new(settings.direction, settings.params),
            translator: EventTranslator::for_direction(settings.direction),
            endpoints: settings.endpoints,
            connect_timeout: settings.connect_timeout,
            finish_timeout: settings.finish_timeout,
            forward_raw: settings.forward_raw,
            connector,
            ready,
            events,
            commands: rx,
            finish_deadline: None,
            close_requested: false,
            close_frame_sent: false,
        };

        let task = tokio::spawn(controller.run());

        SessionHandle {
            commands: tx,
            gate,
            task,
        }
    }

    /// Drive the session from `INIT` to a terminal state.
    pub async fn run(mut self) -> SessionOutcome {
        let (sink, stream) = match self.connect().await {
            Ok(halves) => halves,
            Err(e) => return self.terminate(e),
        };

        let outcome = self.pump(sink, stream).await;

        tracing::info!(
            direction = %self.session.direction,
            state = %self.session.state(),
            session_id = ?self.session.session_id,
            "Session ended"
        );
        outcome
    }

    async fn connect(&mut self) -> BridgeResult<(WsSink, WsSource)> {
        self.session.transition(SessionState::Connecting)?;

        let (ws_stream, candidate) = connect_first(
            &self.endpoints,
            self.connect_timeout,
            self.connector.as_ref(),
        )
        .await?;

        self.session.transition(SessionState::Open)?;
        let url = self.connector.request_url(&candidate);
        self.events.emit_all(self.translator.on_open(url.as_str()));

        Ok(ws_stream.split())
    }

    async fn pump(&mut self, mut sink: WsSink, mut stream: WsSource) -> SessionOutcome {
        let mut commands_open = true;

        loop {
            let deadline = self.finish_deadline;
            let finish_timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            // Commands are polled before inbound frames so a `config` queued
            // while connecting is merged before `session.created` is handled.
            let step = tokio::select! {
                biased;

                _ = finish_timer => self.on_finish_timeout(),

                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command, &mut sink).await,
                    None => {
                        commands_open = false;
                        tracing::debug!("Command channel closed; closing session");
                        self.handle_command(SessionCommand::Close, &mut sink).await
                    }
                },

                message = stream.next() => self.handle_message(message, &mut sink).await,
            };

            if let ControlFlow::Break(outcome) = step {
                // Flushes a pending close reply; bounded so a dead peer cannot stall exit.
                let _ = tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, sink.close()).await;
                return outcome;
            }
        }
    }

    // =========================================================================
    // Caller Commands
    // =========================================================================

    async fn handle_command(
        &mut self,
        command: SessionCommand,
        sink: &mut WsSink,
    ) -> ControlFlow<SessionOutcome> {
        match command {
            SessionCommand::Configure(update) => {
                if self.session.is_configured() {
                    tracing::info!("Session already configured; ignoring config");
                } else {
                    self.session.params.apply(&update);
                    tracing::debug!(params = ?self.session.params, "Session parameters updated");
                }
                ControlFlow::Continue(())
            }
            SessionCommand::Audio(data) => {
                self.forward_content(ClientEvent::audio_append(&data), sink)
                    .await
            }
            SessionCommand::Text(text) => {
                self.forward_content(ClientEvent::InputTextBufferAppend { text }, sink)
                    .await
            }
            SessionCommand::Commit => self.commit(sink).await,
            SessionCommand::Close => self.close(sink).await,
        }
    }

    async fn forward_content(
        &mut self,
        event: ClientEvent,
        sink: &mut WsSink,
    ) -> ControlFlow<SessionOutcome> {
        let state = self.session.state();
        if !state.accepts_content() || self.close_frame_sent {
            tracing::debug!(%state, kind = event.kind(), "Dropping content outside the streaming window");
            return ControlFlow::Continue(());
        }

        if let Err(e) = self.send_event(sink, &event).await {
            return self.fail(e);
        }

        if state == SessionState::Ready {
            self.advance(SessionState::Streaming);
        }
        ControlFlow::Continue(())
    }

    async fn commit(&mut self, sink: &mut WsSink) -> ControlFlow<SessionOutcome> {
        let state = self.session.state();
        if !state.accepts_commit() {
            let err = BridgeError::CallerInput(format!("commit is not valid in state {state}"));
            tracing::debug!("{}", err);
            return ControlFlow::Continue(());
        }

        let event = ClientEvent::commit(self.session.direction);
        if let Err(e) = self.send_event(sink, &event).await {
            tracing::warn!(error = %e, "Commit send failed");
            return ControlFlow::Continue(());
        }

        if self.session.direction == Direction::Asr {
            self.session.awaiting_final = true;
        }
        self.advance(SessionState::Finishing);
        ControlFlow::Continue(())
    }

    async fn close(&mut self, sink: &mut WsSink) -> ControlFlow<SessionOutcome> {
        if self.close_requested {
            tracing::debug!("Close already in progress");
            return ControlFlow::Continue(());
        }
        self.close_requested = true;
        self.advance(SessionState::Finishing);
        self.arm_finish_deadline();

        match self.session.direction {
            Direction::Tts if self.session.is_ready() => {
                if let Err(e) = self.send_event(sink, &ClientEvent::SessionFinish).await {
                    tracing::warn!(error = %e, "session.finish send failed");
                    self.send_close_frame(sink).await;
                }
            }
            Direction::Asr if self.session.awaiting_final => {
                tracing::debug!("Waiting for the final transcript before closing");
            }
            _ => self.send_close_frame(sink).await,
        }
        ControlFlow::Continue(())
    }

    // =========================================================================
    // Provider Frames
    // =========================================================================

    async fn handle_message(
        &mut self,
        message: Option<Result<Message, tungstenite::Error>>,
        sink: &mut WsSink,
    ) -> ControlFlow<SessionOutcome> {
        match message {
            Some(Ok(Message::Text(text))) => self.handle_frame(text.as_str(), sink).await,
            Some(Ok(Message::Binary(data))) => {
                tracing::debug!(len = data.len(), "Ignoring binary frame");
                ControlFlow::Continue(())
            }
            Some(Ok(Message::Ping(data))) => {
                if let Err(e) = sink.send(Message::Pong(data)).await {
                    tracing::warn!("Failed to send pong: {}", e);
                }
                ControlFlow::Continue(())
            }
            Some(Ok(Message::Close(frame))) => self.on_remote_close(frame),
            Some(Ok(_)) => ControlFlow::Continue(()),
            Some(Err(e)) => self.fail(BridgeError::from(e)),
            None => self.on_remote_close(None),
        }
    }

    async fn handle_frame(&mut self, text: &str, sink: &mut WsSink) -> ControlFlow<SessionOutcome> {
        if self.forward_raw {
            if let Ok(message) = serde_json::from_str::<serde_json::Value>(text) {
                self.events.emit(BridgeEvent::Provider { message });
            }
        }

        let event = match ServerEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                let err = BridgeError::Protocol(e.to_string());
                tracing::warn!(error = %err, frame_len = text.len(), "Dropping malformed provider frame");
                return ControlFlow::Continue(());
            }
        };

        let translation = self.translator.on_event(&mut self.session, event);
        self.events.emit_all(translation.events);

        match translation.directive {
            Some(directive) => self.apply(directive, sink).await,
            None => ControlFlow::Continue(()),
        }
    }

    async fn apply(
        &mut self,
        directive: Directive,
        sink: &mut WsSink,
    ) -> ControlFlow<SessionOutcome> {
        match directive {
            Directive::Configure => self.configure(sink).await,
            Directive::Ready => {
                if self.session.state() == SessionState::Configuring {
                    self.advance(SessionState::Ready);
                }
                self.ready.set_ready();
                tracing::info!(session_id = ?self.session.session_id, "Session ready");
                ControlFlow::Continue(())
            }
            Directive::TurnCompleted => {
                self.session.awaiting_final = false;
                if self.close_requested && self.session.direction == Direction::Asr {
                    self.send_close_frame(sink).await;
                }
                ControlFlow::Continue(())
            }
            Directive::Finished => {
                tracing::info!("Provider finished the session");
                if self.session.state() != SessionState::Finishing {
                    self.advance(SessionState::Finishing);
                }
                self.arm_finish_deadline();
                self.send_close_frame(sink).await;
                ControlFlow::Continue(())
            }
            Directive::Fail(err) => self.fail(err),
        }
    }

    async fn configure(&mut self, sink: &mut WsSink) -> ControlFlow<SessionOutcome> {
        if !self.session.mark_configured() {
            return ControlFlow::Continue(());
        }
        if self.close_requested {
            tracing::debug!("Close requested before configuration; not configuring");
            return ControlFlow::Continue(());
        }

        self.advance(SessionState::SessionCreated);
        self.advance(SessionState::Configuring);

        let event = ClientEvent::session_update(self.session.direction, &self.session.params);
        match self.send_event(sink, &event).await {
            Ok(()) => {
                tracing::info!(
                    direction = %self.session.direction,
                    sample_rate = self.session.params.sample_rate,
                    "Sent session configuration"
                );
                ControlFlow::Continue(())
            }
            Err(e) => self.fail(e),
        }
    }

    fn on_remote_close(&mut self, frame: Option<CloseFrame>) -> ControlFlow<SessionOutcome> {
        let (code, reason) = match &frame {
            Some(frame) => (Some(u16::from(frame.code)), frame.reason.as_str().to_string()),
            None => (None, String::new()),
        };
        let state = self.session.state();

        if state == SessionState::Finishing {
            tracing::info!(?code, reason = %reason, "Provider closed the connection");
            self.events.emit(self.translator.on_close(code, &reason));
            self.advance(SessionState::Closed);
            return ControlFlow::Break(SessionOutcome::Closed);
        }

        let err = BridgeError::Transport(match code {
            Some(code) => format!("connection closed by provider in state {state} (code {code})"),
            None => format!("connection closed by provider in state {state}"),
        });
        tracing::error!(error = %err, "Unexpected close");
        self.events.emit(self.translator.on_error(&err));
        self.events.emit(self.translator.on_close(code, &reason));
        self.advance(SessionState::Error);
        ControlFlow::Break(SessionOutcome::Failed(err))
    }

    fn on_finish_timeout(&mut self) -> ControlFlow<SessionOutcome> {
        let err = BridgeError::Timeout(format!(
            "no close acknowledgment within {}ms",
            self.finish_timeout.as_millis()
        ));
        tracing::warn!(error = %err, "Dropping connection");
        self.events
            .emit(self.translator.on_close(None, "finish timeout"));
        self.advance(SessionState::Closed);
        ControlFlow::Break(SessionOutcome::Closed)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn send_event(&self, sink: &mut WsSink, event: &ClientEvent) -> BridgeResult<()> {
        let json = serde_json::to_string(event)
            .map_err(|e| BridgeError::Protocol(format!("failed to serialize {}: {e}", event.kind())))?;
        sink.send(Message::Text(json.into())).await?;
        tracing::trace!(kind = event.kind(), "Sent provider event");
        Ok(())
    }

    async fn send_close_frame(&mut self, sink: &mut WsSink) {
        if self.close_frame_sent {
            return;
        }
        self.close_frame_sent = true;

        if let Err(e) = sink.send(Message::Close(None)).await {
            tracing::warn!("Failed to send close frame: {}", e);
        }
    }

    fn arm_finish_deadline(&mut self) {
        if self.finish_deadline.is_none() {
            self.finish_deadline = Some(Instant::now() + self.finish_timeout);
        }
    }

    /// Transition, logging instead of failing on an unexpected order.
    fn advance(&mut self, next: SessionState) {
        if let Err(e) = self.session.transition(next) {
            tracing::warn!("{}", e);
        }
    }

    /// Report an error; only fatal ones end the session.
    fn fail(&mut self, err: BridgeError) -> ControlFlow<SessionOutcome> {
        if !err.is_fatal() {
            tracing::warn!(state = %self.session.state(), error = %err, "Session error");
            self.events.emit(self.translator.on_error(&err));
            return ControlFlow::Continue(());
        }
        ControlFlow::Break(self.terminate(err))
    }

    /// Emit the single terminal `error` event and enter `ERROR`.
    fn terminate(&mut self, err: BridgeError) -> SessionOutcome {
        tracing::error!(state = %self.session.state(), error = %err, "Session failed");
        self.events.emit(self.translator.on_error(&err));
        self.advance(SessionState::Error);
        SessionOutcome::Failed(err)
    }
}
