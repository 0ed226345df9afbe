//! Recognition-direction translation.

use super::{Directive, Translation};
use crate::core::events::BridgeEvent;
use crate::core::session::Session;
use crate::core::translator::messages::ServerEvent;

pub(super) fn translate(session: &mut Session, event: ServerEvent) -> Translation {
    match event {
        ServerEvent::TranscriptionText { text, stash } => {
            // Snapshots are cumulative; the latest one replaces the buffer.
            let snapshot = if stash.is_empty() { text } else { stash };
            if snapshot.is_empty() {
                return Translation::none();
            }
            session.replace_transcript(&snapshot);
            Translation::emit(BridgeEvent::Partial { text: snapshot })
        }

        ServerEvent::TranscriptionCompleted { transcript } => {
            session.clear_transcript();
            let mut translation = Translation::directive(Directive::TurnCompleted);
            if !transcript.is_empty() {
                translation.events = vec![
                    BridgeEvent::Final {
                        text: transcript.clone(),
                    },
                    BridgeEvent::TurnEnd { text: transcript },
                ];
            }
            translation
        }

        ServerEvent::TranscriptionFailed { error } => {
            session.clear_transcript();
            tracing::warn!(error = %error.describe(), "Transcription failed");
            Translation::emit(BridgeEvent::error(format!(
                "transcription failed: {}",
                error.describe()
            )))
            .with_directive(Directive::TurnCompleted)
        }

        ServerEvent::SpeechStarted => Translation::emit(BridgeEvent::SpeechStart),
        ServerEvent::SpeechStopped => Translation::emit(BridgeEvent::SpeechStop),

        other => {
            tracing::debug!(event = ?other, "Dropping event not used for recognition");
            Translation::none()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{Direction, SessionParams};

    fn session() -> Session {
        Session::new(Direction::Asr, SessionParams::default())
    }

    fn text(text: &str, stash: &str) -> ServerEvent {
        ServerEvent::TranscriptionText {
            text: text.to_string(),
            stash: stash.to_string(),
        }
    }

    #[test]
    fn test_partial_carries_latest_snapshot() {
        let mut session = session();
        let first = translate(&mut session, text("", "hel"));
        assert_eq!(first.events, vec![BridgeEvent::Partial { text: "hel".into() }]);
        let second = translate(&mut session, text("", "hello there"));
        assert_eq!(
            second.events,
            vec![BridgeEvent::Partial {
                text: "hello there".into()
            }]
        );
        assert_eq!(session.transcript(), "hello there");
    }

    #[test]
    fn test_partial_falls_back_to_text() {
        let mut session = session();
        let t = translate(&mut session, text("confirmed", ""));
        assert_eq!(
            t.events,
            vec![BridgeEvent::Partial {
                text: "confirmed".into()
            }]
        );
    }

    #[test]
    fn test_empty_partial_emits_nothing() {
        let mut session = session();
        session.replace_transcript("kept");
        let t = translate(&mut session, text("", ""));
        assert!(t.events.is_empty());
        assert_eq!(session.transcript(), "kept");
    }

    #[test]
    fn test_final_emits_final_then_turn_end_and_clears_buffer() {
        let mut session = session();
        translate(&mut session, text("", "my name is"));
        let t = translate(
            &mut session,
            ServerEvent::TranscriptionCompleted {
                transcript: "My name is Li.".into(),
            },
        );
        assert_eq!(
            t.events,
            vec![
                BridgeEvent::Final {
                    text: "My name is Li.".into()
                },
                BridgeEvent::TurnEnd {
                    text: "My name is Li.".into()
                },
            ]
        );
        assert!(matches!(t.directive, Some(Directive::TurnCompleted)));
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_empty_final_still_completes_turn() {
        let mut session = session();
        session.replace_transcript("uh");
        let t = translate(
            &mut session,
            ServerEvent::TranscriptionCompleted {
                transcript: String::new(),
            },
        );
        assert!(t.events.is_empty());
        assert!(matches!(t.directive, Some(Directive::TurnCompleted)));
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_speech_boundaries_pass_through() {
        let mut session = session();
        assert_eq!(
            translate(&mut session, ServerEvent::SpeechStarted).events,
            vec![BridgeEvent::SpeechStart]
        );
        assert_eq!(
            translate(&mut session, ServerEvent::SpeechStopped).events,
            vec![BridgeEvent::SpeechStop]
        );
    }

    #[test]
    fn test_synthesis_events_are_ignored() {
        let mut session = session();
        let t = translate(
            &mut session,
            ServerEvent::AudioDelta {
                delta: "AAAA".into(),
            },
        );
        assert!(t.events.is_empty());
    }
}
