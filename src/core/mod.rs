pub mod events;
pub mod gate;
pub mod session;
pub mod translator;
pub mod transport;

// Re-export commonly used types for convenience
pub use events::{BridgeEvent, EventSink};
pub use gate::{DEFAULT_GATE_TIMEOUT, GateOutcome, ReadinessGate, ReadySignal};
pub use session::{
    Direction, ParamsUpdate, SessionCommand, SessionController, SessionHandle, SessionOutcome,
    SessionParams, SessionSettings, SessionState, TtsMode,
};
pub use translator::{Directive, EventTranslator, Translation};
pub use transport::{Connector, EndpointCandidate, EndpointSet, WsConnector, connect_first};
