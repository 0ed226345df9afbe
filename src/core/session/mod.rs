pub mod controller;
pub mod model;
pub mod state;

pub use controller::{
    DEFAULT_FINISH_TIMEOUT, SessionCommand, SessionController, SessionHandle, SessionOutcome,
    SessionSettings,
};
pub use model::{
    DEFAULT_ASR_SAMPLE_RATE, ParamsUpdate, Session, SessionParams, TTS_SAMPLE_RATE, TtsMode,
};
pub use state::{Direction, SessionState};
