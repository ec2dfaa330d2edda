//! Inbound event envelopes.
//!
//! [`ServerEvent`] enumerates every message kind the service pushes over the
//! WebSocket. [`Inbound::parse`] decodes a raw text frame in two stages so
//! that unrecognized kinds are reported without being treated as decode
//! failures.
//!
//! Wire format (`type` selects the variant, `data` carries the payload):
//! ```json
//! { "type": "model_loaded", "data": { "status_message": "Ready: ...", ... } }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::family::ModelFamily;

/// Messages pushed by the service.
///
/// Each variant serializes to a `{"type", "data"}` envelope with the
/// snake_case kind string the service emits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A checkpoint finished loading and the service is ready.
    ModelLoaded(ModelLoadedPayload),
    /// The loaded checkpoint was released.
    ModelUnloaded(ModelUnloadedPayload),
    /// A generation finished and the image was written to the outputs dir.
    GenerationComplete(GenerationCompletePayload),
    /// Progress tick for the in-flight operation.
    ProgressUpdate(ProgressPayload),
    /// The outputs directory changed; sent to every connected client.
    GalleryUpdated(GalleryPayload),
    /// The in-flight operation failed server-side.
    Error(ErrorPayload),
}

impl ServerEvent {
    /// All kind strings this client recognizes, for exhaustive testing and
    /// unknown-kind detection.
    pub const KINDS: &'static [&'static str] = &[
        "model_loaded",
        "model_unloaded",
        "generation_complete",
        "progress_update",
        "gallery_updated",
        "error",
    ];

    /// The envelope `type` string for this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelLoaded(_) => "model_loaded",
            Self::ModelUnloaded(_) => "model_unloaded",
            Self::GenerationComplete(_) => "generation_complete",
            Self::ProgressUpdate(_) => "progress_update",
            Self::GalleryUpdated(_) => "gallery_updated",
            Self::Error(_) => "error",
        }
    }

    /// Whether this event ends an in-flight operation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ModelLoaded(_)
                | Self::ModelUnloaded(_)
                | Self::GenerationComplete(_)
                | Self::Error(_)
        )
    }
}

/// Payload of `model_loaded`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelLoadedPayload {
    /// Human-readable ready line, e.g. `Ready: dreamshaper (SD 1.5)`.
    pub status_message: String,
    /// Architecture family of the loaded checkpoint.
    pub model_type: ModelFamily,
    /// Default generation width for this family.
    pub width: u32,
    /// Default generation height for this family.
    pub height: u32,
}

/// Payload of `model_unloaded`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelUnloadedPayload {
    /// Human-readable status line, `No model loaded.` in practice.
    pub status_message: String,
}

/// Payload of `generation_complete`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationCompletePayload {
    /// Filename under the outputs dir, `{timestamp}_{model}_{seed}.png`.
    pub image_filename: String,
    /// Human-readable result line carrying timing and seed.
    pub info: String,
}

/// Payload of `progress_update`.
///
/// `progress` is a fraction in `0.0..=1.0`. Values are forwarded exactly as
/// received; the service may legitimately restart a sub-stage, so a later
/// tick can carry a smaller value than an earlier one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    /// Stage description, e.g. `Sampling... 7/20`.
    pub description: String,
    /// Completion fraction.
    pub progress: f64,
}

/// Payload of `gallery_updated`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GalleryPayload {
    /// Output filenames, newest first.
    pub images: Vec<String>,
}

/// Payload of `error`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Server-side failure description.
    pub message: String,
}

/// Envelope skeleton used to pick the kind out before typed decode.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
}

/// Result of decoding one inbound text frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// A recognized, fully decoded event.
    Event(ServerEvent),
    /// An envelope whose `type` this client does not know. Not an error:
    /// routers log these and move on.
    Unrecognized {
        /// The unrecognized `type` tag.
        kind: String,
    },
}

impl Inbound {
    /// Decode one text frame.
    ///
    /// A frame that is not an envelope at all fails with
    /// [`ProtocolError::Envelope`]; a recognized kind whose payload does not
    /// match its schema fails with [`ProtocolError::Payload`]; an envelope
    /// with an unknown kind succeeds as [`Inbound::Unrecognized`].
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawEnvelope = serde_json::from_str(text).map_err(ProtocolError::Envelope)?;
        if !ServerEvent::KINDS.contains(&raw.kind.as_str()) {
            return Ok(Self::Unrecognized { kind: raw.kind });
        }
        let event = serde_json::from_str::<ServerEvent>(text).map_err(|source| {
            ProtocolError::Payload {
                kind: raw.kind,
                source,
            }
        })?;
        Ok(Self::Event(event))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
