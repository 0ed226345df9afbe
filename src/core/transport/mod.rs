//! Provider transport: endpoint candidates and ordered failover.

pub mod connector;
pub mod endpoints;

use std::time::Duration;

pub use connector::{Connector, WsConnector, WsStream};
pub use endpoints::{DASHSCOPE_INTL_WS_URL, DASHSCOPE_WS_URL, EndpointCandidate, EndpointSet};

use crate::errors::{ConnectionError, EndpointFailure};

/// Default bound on a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect to the first reachable candidate.
///
/// Candidates are attempted strictly in order, each under its own
/// `per_attempt_timeout`. The first success wins and later candidates are
/// never touched. When every attempt fails the returned error lists one
/// failure per candidate, in attempt order, and no connection is left open.
pub async fn connect_first<C>(
    endpoints: &EndpointSet,
    per_attempt_timeout: Duration,
    connector: &C,
) -> Result<(WsStream, EndpointCandidate), ConnectionError>
where
    C: Connector + ?Sized,
{
    let mut failures = Vec::with_capacity(endpoints.len());

    for candidate in endpoints.candidates() {
        let reason = match tokio::time::timeout(per_attempt_timeout, connector.connect(candidate))
            .await
        {
            Ok(Ok(stream)) => {
                tracing::info!(
                    endpoint = %candidate,
                    ordinal = candidate.ordinal,
                    "Connected to provider"
                );
                return Ok((stream, candidate.clone()));
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}ms", per_attempt_timeout.as_millis()),
        };

        tracing::warn!(
            endpoint = %candidate,
            ordinal = candidate.ordinal,
            reason = %reason,
            "Connect attempt failed"
        );
        failures.push(EndpointFailure {
            address: candidate.address.to_string(),
            ordinal: candidate.ordinal,
            reason,
        });
    }

    Err(ConnectionError { failures })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{BridgeError, BridgeResult};
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    /// Records every attempt. Candidates below `succeed_from` fail (or hang);
    /// the rest use a real connector.
    struct ScriptedConnector {
        attempts: Mutex<Vec<usize>>,
        succeed_from: usize,
        hang: bool,
        inner: WsConnector,
    }

    impl ScriptedConnector {
        fn new(succeed_from: usize) -> Self {
            Self {
                attempts: Mutex::new(Vec::new()),
                succeed_from,
                hang: false,
                inner: WsConnector::new("sk-test", "m"),
            }
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, candidate: &EndpointCandidate) -> BridgeResult<WsStream> {
            self.attempts.lock().unwrap().push(candidate.ordinal);
            if candidate.ordinal < self.succeed_from {
                if self.hang {
                    std::future::pending::<()>().await;
                }
                return Err(BridgeError::Transport("connection refused".to_string()));
            }
            self.inner.connect(candidate).await
        }
    }

    async fn spawn_accepting_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    if let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await {
                        while let Some(Ok(_)) = ws.next().await {}
                    }
                });
            }
        });
        format!("ws://{addr}/realtime")
    }

    #[tokio::test]
    async fn test_last_candidate_succeeds_after_ordered_attempts() {
        let good = spawn_accepting_server().await;
        let endpoints = EndpointSet::parse_list(&format!(
            "ws://primary.invalid/a,ws://secondary.invalid/b,{good}"
        ))
        .unwrap();
        let connector = ScriptedConnector::new(2);

        let (_stream, winner) = connect_first(&endpoints, Duration::from_secs(5), &connector)
            .await
            .unwrap();

        assert_eq!(winner.ordinal, 2);
        assert_eq!(*connector.attempts.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_first_success_stops_the_sequence() {
        let good = spawn_accepting_server().await;
        let endpoints =
            EndpointSet::parse_list(&format!("{good},ws://never-tried.invalid/x")).unwrap();
        let connector = ScriptedConnector::new(0);

        let (_stream, winner) = connect_first(&endpoints, Duration::from_secs(5), &connector)
            .await
            .unwrap();

        assert_eq!(winner.ordinal, 0);
        assert_eq!(*connector.attempts.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_all_failing_aggregates_every_reason() {
        let endpoints =
            EndpointSet::parse_list("ws://a.invalid/x,ws://b.invalid/y,ws://c.invalid/z").unwrap();
        let connector = ScriptedConnector::new(usize::MAX);

        let err = connect_first(&endpoints, Duration::from_secs(5), &connector)
            .await
            .unwrap_err();

        assert_eq!(err.failures.len(), 3);
        let ordinals: Vec<usize> = err.failures.iter().map(|f| f.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
        assert!(err.failures.iter().all(|f| f.reason.contains("refused")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_attempt_has_its_own_timeout() {
        let endpoints = EndpointSet::parse_list("ws://a.invalid/x,ws://b.invalid/y").unwrap();
        let mut connector = ScriptedConnector::new(usize::MAX);
        connector.hang = true;

        let err = connect_first(&endpoints, Duration::from_millis(200), &connector)
            .await
            .unwrap_err();

        assert_eq!(*connector.attempts.lock().unwrap(), vec![0, 1]);
        assert!(err.failures.iter().all(|f| f.reason == "timed out after 200ms"));
    }

    #[tokio::test]
    async fn test_empty_set_fails_without_attempts() {
        let endpoints = EndpointSet::parse_list("").unwrap();
        let connector = ScriptedConnector::new(0);
        let err = connect_first(&endpoints, Duration::from_secs(1), &connector)
            .await
            .unwrap_err();
        assert!(err.failures.is_empty());
        assert!(connector.attempts.lock().unwrap().is_empty());
    }
}
