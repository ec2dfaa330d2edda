//! Inbound frame routing.
//!
//! One text frame in, one [`SessionEvent`] out. Routing applies the frame's
//! state effects, releases the operation slot on terminal events, and never
//! fails: undecodable and unrecognized frames degrade to notifications so a
//! single bad frame cannot take the session down.

use tracing::{debug, warn};

use arttic_protocol::{Inbound, ServerEvent};

use crate::events::SessionEvent;
use crate::gate::OperationGate;
use crate::state::SessionState;

/// Route one inbound text frame.
pub(crate) fn handle_frame(
    state: &mut SessionState,
    gate: &OperationGate,
    text: &str,
) -> SessionEvent {
    match Inbound::parse(text) {
        Ok(Inbound::Event(event)) => on_event(state, gate, event),
        Ok(Inbound::Unrecognized { kind }) => {
            warn!(kind = %kind, "ignoring unknown message type");
            SessionEvent::UnknownKind { kind }
        }
        Err(err) => {
            warn!(error = %err, "dropping undecodable frame");
            SessionEvent::DecodeFailed {
                detail: err.to_string(),
            }
        }
    }
}

/// Apply a decoded event to the session.
fn on_event(state: &mut SessionState, gate: &OperationGate, event: ServerEvent) -> SessionEvent {
    if event.is_terminal() {
        if let Some(kind) = gate.release() {
            debug!(operation = %kind, event = event.kind(), "operation slot released");
        }
    }
    match event {
        ServerEvent::ModelLoaded(payload) => {
            state.is_model_loaded = true;
            state.model_family = Some(payload.model_type.clone());
            state.status_message = Some(payload.status_message.clone());
            state.default_width = Some(payload.width);
            state.default_height = Some(payload.height);
            SessionEvent::ModelLoaded(payload)
        }
        ServerEvent::ModelUnloaded(payload) => {
            // The family of the last loaded checkpoint stays visible; only
            // the loaded flag drops.
            state.is_model_loaded = false;
            state.status_message = Some(payload.status_message.clone());
            SessionEvent::ModelUnloaded(payload)
        }
        ServerEvent::GenerationComplete(payload) => SessionEvent::GenerationComplete(payload),
        ServerEvent::ProgressUpdate(payload) => SessionEvent::Progress(payload),
        ServerEvent::GalleryUpdated(payload) => SessionEvent::GalleryUpdated(payload),
        ServerEvent::Error(payload) => {
            warn!(error = %payload.message, "service reported an error");
            SessionEvent::ServerError(payload)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
