//! Protocol decode errors.

use thiserror::Error;

/// Failure to decode an inbound frame.
///
/// The two variants separate "the frame is not an envelope at all" from
/// "the envelope carries a recognized kind but its payload does not match
/// that kind's schema". Unrecognized kinds are not errors — see
/// [`crate::Inbound::Unrecognized`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not a `{"type": ..., "data": ...}` envelope.
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// The payload of a recognized kind failed to decode.
    #[error("bad `{kind}` payload: {source}")]
    Payload {
        /// Envelope `type` tag.
        kind: String,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
}
