//! Scripted DashScope realtime mock.
//!
//! Accepts WebSocket connections on 127.0.0.1, announces `session.created`,
//! and answers client events from a fixed script. Every client frame is
//! recorded so tests can assert on what the bridge actually sent.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::accept_hdr_async;

use realtime_bridge::core::session::{Direction, SessionSettings};
use realtime_bridge::core::transport::{EndpointSet, WsConnector};
use realtime_bridge::{BridgeEvent, Gateway};

/// What the mock sends, keyed by the client event that triggers it.
#[derive(Clone, Debug)]
pub struct MockScript {
    /// Raw frames sent before `session.created`
    pub preamble: Vec<String>,
    /// How many times `session.created` is announced
    pub created_count: usize,
    /// Send a close frame right after `session.created`
    pub close_after_created: bool,
    /// Hold back the `session.update` replies
    pub update_delay: Duration,
    pub on_update: Vec<Value>,
    pub on_append: Vec<Value>,
    pub on_commit: Vec<Value>,
    pub on_finish: Vec<Value>,
}

impl Default for MockScript {
    fn default() -> Self {
        Self {
            preamble: Vec::new(),
            created_count: 1,
            close_after_created: false,
            update_delay: Duration::ZERO,
            on_update: vec![session_updated()],
            on_append: Vec::new(),
            on_commit: Vec::new(),
            on_finish: Vec::new(),
        }
    }
}

pub fn session_created(id: &str) -> Value {
    json!({ "type": "session.created", "event_id": "evt_1", "session": { "id": id, "object": "realtime.session" } })
}

pub fn session_updated() -> Value {
    json!({ "type": "session.updated", "event_id": "evt_2", "session": {} })
}

pub fn partial(text: &str, stash: &str) -> Value {
    json!({ "type": "conversation.item.input_audio_transcription.text", "item_id": "item_1", "text": text, "stash": stash })
}

pub fn completed(transcript: &str) -> Value {
    json!({ "type": "conversation.item.input_audio_transcription.completed", "item_id": "item_1", "transcript": transcript })
}

pub fn audio_delta(b64: &str) -> Value {
    json!({ "type": "response.audio.delta", "response_id": "resp_1", "delta": b64 })
}

pub fn response_done() -> Value {
    json!({ "type": "response.done", "response": { "id": "resp_1", "status": "completed" } })
}

pub fn session_finished() -> Value {
    json!({ "type": "session.finished", "event_id": "evt_9" })
}

pub fn provider_error(code: &str, message: &str) -> Value {
    json!({ "type": "error", "error": { "type": "invalid_request_error", "code": code, "message": message } })
}

/// Running mock server.
pub struct MockProvider {
    pub port: u16,
    received: Arc<Mutex<Vec<Value>>>,
    authorization: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl MockProvider {
    pub async fn start(script: MockScript) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let authorization = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicU64::new(0));

        let task = {
            let received = received.clone();
            let authorization = authorization.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::Relaxed);
                    let script = script.clone();
                    let received = received.clone();
                    let authorization = authorization.clone();
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(stream, script, received, authorization).await
                        {
                            eprintln!("mock connection error: {e}");
                        }
                    });
                }
            })
        };

        Self {
            port,
            received,
            authorization,
            connections,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/api-ws/v1/realtime", self.port)
    }

    /// Client frames received so far.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    /// `type` of every client frame, in arrival order.
    pub fn received_types(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|v| v["type"].as_str().map(str::to_string))
            .collect()
    }

    pub fn authorization(&self) -> Vec<String> {
        self.authorization.lock().unwrap().clone()
    }

    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle_connection(
    stream: TcpStream,
    script: MockScript,
    received: Arc<Mutex<Vec<Value>>>,
    authorization: Arc<Mutex<Vec<String>>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_hdr_async(stream, |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        if let Some(value) = req.headers().get("Authorization")
            && let Ok(value) = value.to_str()
        {
            authorization.lock().unwrap().push(value.to_string());
        }
        Ok(resp)
    })
    .await?;
    let (mut write, mut read) = ws_stream.split();

    for raw in &script.preamble {
        write.send(Message::Text(raw.clone().into())).await?;
    }
    for _ in 0..script.created_count {
        write
            .send(Message::Text(session_created("sess_mock").to_string().into()))
            .await?;
    }
    if script.close_after_created {
        write.send(Message::Close(None)).await?;
    }

    // Keep reading until the stream ends so close replies are flushed.
    while let Some(msg) = read.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(_) => continue,
            Err(_) => break,
        };
        let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        let kind = frame["type"].as_str().unwrap_or_default().to_string();
        received.lock().unwrap().push(frame);

        if kind == "session.update" && !script.update_delay.is_zero() {
            tokio::time::sleep(script.update_delay).await;
        }
        let replies = match kind.as_str() {
            "session.update" => &script.on_update,
            "input_audio_buffer.append" | "input_text_buffer.append" => &script.on_append,
            "input_audio_buffer.commit" | "input_text_buffer.commit" => &script.on_commit,
            "session.finish" => &script.on_finish,
            _ => continue,
        };
        for reply in replies {
            if write
                .send(Message::Text(reply.to_string().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    }
    Ok(())
}

// =============================================================================
// Bridge harness
// =============================================================================

/// Output of one bridge run.
pub struct BridgeRun {
    pub exit_code: i32,
    pub events: Vec<BridgeEvent>,
}

impl BridgeRun {
    pub fn names(&self) -> Vec<&'static str> {
        self.events.iter().map(BridgeEvent::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.iter().filter(|e| e.name() == name).count()
    }
}

pub fn settings(direction: Direction, endpoints: &str) -> SessionSettings {
    let mut settings = SessionSettings::new(direction);
    settings.endpoints = EndpointSet::parse_list(endpoints).unwrap();
    settings.connect_timeout = Duration::from_secs(2);
    settings.finish_timeout = Duration::from_secs(3);
    settings
}

/// Run a bridge over `lines` and collect every emitted event.
pub async fn run_bridge(gateway: Gateway, lines: &[Value]) -> BridgeRun {
    let mut input = String::new();
    for line in lines {
        input.push_str(&line.to_string());
        input.push('\n');
    }
    run_bridge_raw(gateway, input).await
}

pub async fn run_bridge_raw(gateway: Gateway, input: String) -> BridgeRun {
    use tokio::io::AsyncReadExt;

    let (client, mut server) = tokio::io::duplex(1 << 20);
    let exit_code = tokio::time::timeout(
        Duration::from_secs(15),
        gateway.run(std::io::Cursor::new(input), client),
    )
    .await
    .expect("bridge did not finish");

    let mut out = String::new();
    server.read_to_string(&mut out).await.unwrap();
    let events = out
        .lines()
        .map(|line| serde_json::from_str::<BridgeEvent>(line).unwrap())
        .collect();

    BridgeRun { exit_code, events }
}

/// Run a bridge whose input lines arrive after the given pauses.
///
/// Input ends after the last step.
pub async fn run_bridge_paced(gateway: Gateway, steps: Vec<(Duration, Value)>) -> BridgeRun {
    use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

    let (mut input_tx, input_rx) = tokio::io::duplex(1 << 16);
    let feeder = tokio::spawn(async move {
        for (pause, line) in steps {
            tokio::time::sleep(pause).await;
            let mut bytes = line.to_string().into_bytes();
            bytes.push(b'\n');
            if input_tx.write_all(&bytes).await.is_err() {
                break;
            }
        }
    });

    let (client, mut server) = tokio::io::duplex(1 << 20);
    let exit_code = tokio::time::timeout(
        Duration::from_secs(15),
        gateway.run(BufReader::new(input_rx), client),
    )
    .await
    .expect("bridge did not finish");
    feeder.abort();

    let mut out = String::new();
    server.read_to_string(&mut out).await.unwrap();
    let events = out
        .lines()
        .map(|line| serde_json::from_str::<BridgeEvent>(line).unwrap())
        .collect();

    BridgeRun { exit_code, events }
}

pub fn gateway(direction: Direction, settings: SessionSettings) -> Gateway {
    let connector = Arc::new(WsConnector::new("sk-mock", direction.default_model()));
    Gateway::new(settings, connector).with_gate_timeout(Duration::from_secs(3))
}
