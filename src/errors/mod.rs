//! Error types shared by every bridge component.
//!
//! The taxonomy separates terminal failures (transport, configuration) from
//! data-level anomalies that are absorbed locally. [`BridgeError::is_fatal`]
//! and [`BridgeError::exit_code`] encode that policy in one place so the
//! session controller and the binary agree on it.

use std::fmt;

use thiserror::Error;

use crate::core::session::SessionState;

/// Process exit code for a clean shutdown.
pub const EXIT_OK: i32 = 0;
/// Process exit code when the session ended in the `ERROR` state.
pub const EXIT_SESSION_ERROR: i32 = 1;
/// Process exit code when the credential is missing.
pub const EXIT_MISSING_CREDENTIAL: i32 = 2;
/// Process exit code for a malformed startup configuration.
pub const EXIT_INVALID_CONFIG: i32 = 3;
/// Process exit code when every endpoint candidate failed.
pub const EXIT_CONNECT_FAILED: i32 = 5;

/// Failure of a single endpoint attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    /// Address that was attempted
    pub address: String,
    /// Priority of the candidate (0 is tried first)
    pub ordinal: usize,
    /// Human readable failure reason
    pub reason: String,
}

/// Aggregated failure after every endpoint candidate was attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionError {
    pub failures: Vec<EndpointFailure>,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "no endpoint candidates configured");
        }
        write!(
            f,
            "all {} endpoint candidates failed: ",
            self.failures.len()
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(
                f,
                "[{}] {}: {}",
                failure.ordinal, failure.address, failure.reason
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for ConnectionError {}

/// Errors that can occur while running a bridge session.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// All endpoint candidates exhausted
    #[error("Connection failed: {0}")]
    Connection(#[from] ConnectionError),

    /// Malformed inbound provider frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Remote rejected the session configuration
    #[error("Configuration rejected: {0}")]
    ConfigRejected(String),

    /// Provider-reported failure after the session became ready
    #[error("Provider error: {0}")]
    Provider(String),

    /// Readiness or finish wait exceeded
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Malformed caller command line
    #[error("Invalid caller input: {0}")]
    CallerInput(String),

    /// Transport failure after the connection was established
    #[error("Transport error: {0}")]
    Transport(String),

    /// State machine transition that is not allowed
    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    /// Credential not provided
    #[error("Missing credential: {0} is not set")]
    MissingCredential(String),

    /// Startup configuration could not be parsed or validated
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    /// Whether this error terminates the session.
    ///
    /// Data-level anomalies and timeouts are absorbed by the session;
    /// everything else ends it.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            BridgeError::Protocol(_)
                | BridgeError::CallerInput(_)
                | BridgeError::Provider(_)
                | BridgeError::Timeout(_)
        )
    }

    /// Process exit code associated with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeError::Connection(_) => EXIT_CONNECT_FAILED,
            BridgeError::MissingCredential(_) => EXIT_MISSING_CREDENTIAL,
            BridgeError::InvalidConfig(_) => EXIT_INVALID_CONFIG,
            _ => EXIT_SESSION_ERROR,
        }
    }
}

impl From<serde_yaml::Error> for BridgeError {
    fn from(e: serde_yaml::Error) -> Self {
        BridgeError::InvalidConfig(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BridgeError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        BridgeError::Transport(e.to_string())
    }
}
