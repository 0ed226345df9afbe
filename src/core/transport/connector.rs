//! WebSocket connector for provider endpoints.

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;
use zeroize::Zeroizing;

use super::endpoints::EndpointCandidate;
use crate::errors::{BridgeError, BridgeResult};
use crate::utils::{host_header, with_model};

/// An established provider connection.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens one connection to one endpoint candidate.
///
/// Failover ordering and per-attempt timeouts live in
/// [`connect_first`](super::connect_first); implementations only attempt
/// the candidate they are given.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, candidate: &EndpointCandidate) -> BridgeResult<WsStream>;

    /// URL reported to the caller for a candidate.
    fn request_url(&self, candidate: &EndpointCandidate) -> Url {
        candidate.address.clone()
    }
}

/// Production connector: authenticated WebSocket handshake.
pub struct WsConnector {
    api_key: Zeroizing<String>,
    model: String,
}

impl WsConnector {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: Zeroizing::new(api_key.into()),
            model: model.into(),
        }
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, url: &Url) -> BridgeResult<http::Request<()>> {
        http::Request::builder()
            .uri(url.as_str())
            .header("Authorization", format!("Bearer {}", self.api_key.as_str()))
            .header("OpenAI-Beta", "realtime=v1")
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", host_header(url))
            .body(())
            .map_err(|e| BridgeError::Transport(e.to_string()))
    }
}

impl std::fmt::Debug for WsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnector")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, candidate: &EndpointCandidate) -> BridgeResult<WsStream> {
        let url = self.request_url(candidate);
        let request = self.build_request(&url)?;

        tracing::debug!(endpoint = %candidate, ordinal = candidate.ordinal, "Connecting");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request).await?;
        Ok(ws_stream)
    }

    fn request_url(&self, candidate: &EndpointCandidate) -> Url {
        with_model(&candidate.address, &self.model)
    }
}
