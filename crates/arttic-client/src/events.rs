//! Session notifications.

use arttic_protocol::{
    ErrorPayload, GalleryPayload, GenerationCompletePayload, ModelLoadedPayload,
    ModelUnloadedPayload, ProgressPayload,
};

use crate::state::OperationKind;

/// Everything a session broadcasts to subscribers.
///
/// Connection lifecycle changes and service pushes share one stream so a
/// subscriber sees them in the order the session observed them. Slow
/// subscribers that fall behind the broadcast buffer miss the oldest
/// notifications, never the newest.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// The WebSocket link is up.
    Connected,
    /// The link dropped; a redial will be scheduled unless the ceiling
    /// was reached.
    Disconnected,
    /// A redial is scheduled. `attempt` counts redials over the whole
    /// session, not just the current outage.
    Reconnecting {
        /// Cumulative redial number, starting at 1.
        attempt: u64,
    },
    /// Consecutive redials hit the configured ceiling; the session is done
    /// dialing and its phase is now errored.
    ReconnectsExhausted {
        /// Consecutive failures at the moment the session gave up.
        attempts: u32,
    },
    /// The service finished loading a checkpoint.
    ModelLoaded(ModelLoadedPayload),
    /// The service released its checkpoint.
    ModelUnloaded(ModelUnloadedPayload),
    /// A generation finished.
    GenerationComplete(GenerationCompletePayload),
    /// Progress tick for the in-flight operation.
    Progress(ProgressPayload),
    /// The outputs directory changed.
    GalleryUpdated(GalleryPayload),
    /// The service reported a failure. The in-flight operation, if any,
    /// was released; the link stays up.
    ServerError(ErrorPayload),
    /// An inbound frame had a recognized kind but an undecodable payload.
    /// The frame was dropped; no state changed.
    DecodeFailed {
        /// Decode failure description.
        detail: String,
    },
    /// An inbound envelope carried a kind this client does not know.
    /// Ignored apart from this notification.
    UnknownKind {
        /// The unrecognized `type` tag.
        kind: String,
    },
    /// No inbound traffic arrived within the configured operation timeout;
    /// the slot was force-released.
    OperationTimedOut {
        /// The operation that was abandoned.
        kind: OperationKind,
    },
}

impl SessionEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Reconnecting { .. } => "reconnecting",
            Self::ReconnectsExhausted { .. } => "reconnects_exhausted",
            Self::ModelLoaded(_) => "model_loaded",
            Self::ModelUnloaded(_) => "model_unloaded",
            Self::GenerationComplete(_) => "generation_complete",
            Self::Progress(_) => "progress",
            Self::GalleryUpdated(_) => "gallery_updated",
            Self::ServerError(_) => "server_error",
            Self::DecodeFailed { .. } => "decode_failed",
            Self::UnknownKind { .. } => "unknown_kind",
            Self::OperationTimedOut { .. } => "operation_timed_out",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_stable() {
        assert_eq!(SessionEvent::Connected.name(), "connected");
        assert_eq!(
            SessionEvent::Reconnecting { attempt: 3 }.name(),
            "reconnecting"
        );
        assert_eq!(
            SessionEvent::OperationTimedOut {
                kind: OperationKind::Generating
            }
            .name(),
            "operation_timed_out"
        );
    }
}
