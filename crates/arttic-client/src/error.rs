//! Client error types.

use thiserror::Error;

use arttic_protocol::ProtocolError;

use crate::state::OperationKind;

/// Everything that can go wrong on the client side.
///
/// Transport failures are recovered internally by the reconnect loop; they
/// surface here only when a caller-facing call (dial, transmit, fetch) hits
/// one directly.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The client configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The `/api/config` fetch failed.
    #[error("config fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The WebSocket transport failed.
    #[error("transport failure: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// An outbound command could not be serialized.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// An inbound frame could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Another operation currently occupies the slot.
    #[error("`{0}` is already in flight")]
    Busy(OperationKind),

    /// The session is not connected; nothing was transmitted.
    #[error("not connected")]
    NotConnected,

    /// The session task has shut down.
    #[error("session closed")]
    SessionClosed,
}
