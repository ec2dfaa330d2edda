//! # arttic-protocol
//!
//! Wire types for the ArtTic-LAB realtime protocol: the `{action, payload}`
//! command envelopes the client sends, the `{type, data}` event envelopes
//! the service pushes, model-family strings, and the `/api/config` document.
//!
//! This crate is pure data — no IO, no runtime. Transport and session
//! semantics live in `arttic-client`.

pub mod command;
pub mod error;
pub mod event;
pub mod family;
pub mod service;

pub use command::{ClientCommand, GenerateParams, LoadModelParams, UnloadModelParams};
pub use error::ProtocolError;
pub use event::{
    ErrorPayload, GalleryPayload, GenerationCompletePayload, Inbound, ModelLoadedPayload,
    ModelUnloadedPayload, ProgressPayload, ServerEvent,
};
pub use family::ModelFamily;
pub use service::ServiceConfig;
