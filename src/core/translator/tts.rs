//! Synthesis-direction translation.

use super::Translation;
use crate::core::events::BridgeEvent;
use crate::core::translator::messages::ServerEvent;

pub(super) fn translate(event: ServerEvent) -> Translation {
    match event {
        // Forwarded verbatim; the provider already base64-encodes chunks.
        ServerEvent::AudioDelta { delta } if delta.is_empty() => Translation::none(),
        ServerEvent::AudioDelta { delta } => Translation::emit(BridgeEvent::Audio { b64: delta }),

        ServerEvent::ResponseDone => Translation::emit(BridgeEvent::ResponseDone),

        other => {
            tracing::debug!(event = ?other, "Dropping event not used for synthesis");
            Translation::none()
        }
    }
}
