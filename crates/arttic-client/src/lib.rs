//! # arttic-client
//!
//! Async client for an ArtTic-LAB image generation service.
//!
//! A spawned session task owns the WebSocket and the session state; callers
//! drive it through a [`SessionHandle`]:
//!
//! - **Session**: single-task actor over the socket, watch-published
//!   [`SessionSnapshot`]s, broadcast [`SessionEvent`]s
//! - **Connection**: `/ws` endpoint derivation, dial, fixed-delay reconnect
//!   with an optional attempt ceiling
//! - **Operations**: single-slot [`OperationGate`] so at most one command
//!   is ever in flight, released by terminal events
//! - **HTTP**: [`ApiClient`] for the `/api/config` inventory and
//!   cache-busted output image URLs

#![deny(unsafe_code)]

pub mod api;
pub mod config;
mod connection;
pub mod error;
pub mod events;
pub mod gate;
mod router;
mod sender;
pub mod session;
pub mod state;

pub use api::ApiClient;
pub use config::{ClientConfig, DEFAULT_EVENT_BUFFER, DEFAULT_RECONNECT_DELAY_MS, ReconnectPolicy};
pub use error::ClientError;
pub use events::SessionEvent;
pub use gate::{OperationGate, OperationPermit};
pub use session::SessionHandle;
pub use state::{ConnectionPhase, OperationKind, SessionSnapshot};
