//! Provider event translation.
//!
//! [`EventTranslator`] maps inbound provider events to canonical
//! [`BridgeEvent`]s. It updates only the session flags it owns (ready flag,
//! transcript buffer); anything that needs the transport or a state
//! transition is handed back to the session controller as a [`Directive`].

mod asr;
pub mod messages;
mod tts;

pub use messages::{ApiError, ClientEvent, ServerEvent, SessionConfig};

use crate::core::events::BridgeEvent;
use crate::core::session::{Direction, Session};
use crate::errors::BridgeError;

/// Follow-up action the session controller must take.
#[derive(Debug)]
pub enum Directive {
    /// Send the single configuration update.
    Configure,
    /// Configuration acknowledged; open the readiness gate.
    Ready,
    /// The committed turn produced its final result.
    TurnCompleted,
    /// Provider finished the session; close the transport.
    Finished,
    /// Provider failure; terminal only when [`BridgeError::is_fatal`].
    Fail(BridgeError),
}

/// Outcome of translating one provider event.
#[derive(Debug, Default)]
pub struct Translation {
    /// Canonical events, in emission order
    pub events: Vec<BridgeEvent>,
    pub directive: Option<Directive>,
}

impl Translation {
    #[inline]
    pub fn none() -> Self {
        Self::default()
    }

    pub fn emit(event: BridgeEvent) -> Self {
        Self {
            events: vec![event],
            directive: None,
        }
    }

    pub fn directive(directive: Directive) -> Self {
        Self {
            events: Vec::new(),
            directive: Some(directive),
        }
    }

    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directive = Some(directive);
        self
    }
}

/// Per-direction translator, selected when the session is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTranslator {
    Asr,
    Tts,
}

impl EventTranslator {
    pub fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::Asr => EventTranslator::Asr,
            Direction::Tts => EventTranslator::Tts,
        }
    }

    /// Events for a freshly opened transport.
    pub fn on_open(&self, url: &str) -> Vec<BridgeEvent> {
        vec![
            BridgeEvent::Open,
            BridgeEvent::WsUrl {
                url: url.to_string(),
            },
        ]
    }

    /// Event for a closed transport.
    pub fn on_close(&self, code: Option<u16>, reason: &str) -> BridgeEvent {
        BridgeEvent::Close {
            code,
            msg: reason.to_string(),
        }
    }

    /// Event for a terminal failure.
    pub fn on_error(&self, error: &BridgeError) -> BridgeEvent {
        BridgeEvent::error(error.to_string())
    }

    /// Translate one inbound provider event.
    pub fn on_event(&self, session: &mut Session, event: ServerEvent) -> Translation {
        match event {
            ServerEvent::SessionCreated { session: info } => {
                if session.is_configured() {
                    tracing::debug!("Ignoring duplicate session.created");
                    return Translation::none();
                }
                let mut translation = Translation::directive(Directive::Configure);
                if !info.id.is_empty() {
                    translation.events = vec![BridgeEvent::Session {
                        id: info.id.clone(),
                    }];
                    session.session_id = Some(info.id);
                }
                translation
            }

            ServerEvent::SessionUpdated { .. } => {
                if !session.is_configured() {
                    let err = BridgeError::Protocol(
                        "session.updated before configuration was sent".to_string(),
                    );
                    tracing::warn!("{}", err);
                    return Translation::none();
                }
                if !session.mark_ready() {
                    tracing::debug!("Ignoring repeated session.updated");
                    return Translation::none();
                }
                Translation::emit(BridgeEvent::SessionUpdated).with_directive(Directive::Ready)
            }

            ServerEvent::Error { error } => {
                let err = if session.is_ready() {
                    BridgeError::Provider(error.describe())
                } else {
                    BridgeError::ConfigRejected(error.describe())
                };
                Translation::directive(Directive::Fail(err))
            }

            ServerEvent::SessionFinished => {
                Translation::emit(BridgeEvent::End).with_directive(Directive::Finished)
            }

            ServerEvent::Unknown => {
                tracing::debug!("Dropping unrecognized provider event");
                Translation::none()
            }

            other => match self {
                EventTranslator::Asr => asr::translate(session, other),
                EventTranslator::Tts => tts::translate(other),
            },
        }
    }
}
