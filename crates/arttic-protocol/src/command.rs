//! Outbound command envelopes.
//!
//! Commands are the client half of the wire protocol:
//! ```json
//! { "action": "load_model", "payload": { "model_name": "...", ... } }
//! ```
//! The service dispatches on `action` and ignores unknown ones with a logged
//! warning, so a client must never wait for a reply to an action the service
//! does not recognize.

use serde::{Deserialize, Serialize};

/// Commands sent to the service.
///
/// All three are long-running operations: issuing one occupies the client's
/// single operation slot until a terminal event arrives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Load a checkpoint and apply scheduler / memory options.
    LoadModel(LoadModelParams),
    /// Release the loaded checkpoint.
    UnloadModel(UnloadModelParams),
    /// Render one image with the loaded checkpoint.
    GenerateImage(GenerateParams),
}

impl ClientCommand {
    /// All action strings, for exhaustive testing.
    pub const ACTIONS: &'static [&'static str] =
        &["load_model", "unload_model", "generate_image"];

    /// The envelope `action` string for this command.
    pub fn action(&self) -> &'static str {
        match self {
            Self::LoadModel(_) => "load_model",
            Self::UnloadModel(_) => "unload_model",
            Self::GenerateImage(_) => "generate_image",
        }
    }
}

/// Payload of `load_model`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadModelParams {
    /// Checkpoint name as listed in the service config (no extension).
    pub model_name: String,
    /// Scheduler name as listed in the service config, e.g. `Euler A`.
    pub scheduler_name: String,
    /// Enable VAE slicing and tiling on the loaded pipeline.
    pub vae_tiling: bool,
    /// Keep submodules on CPU and stream them to the device on demand.
    pub cpu_offload: bool,
}

impl LoadModelParams {
    /// Params with both memory options off.
    pub fn new(model_name: impl Into<String>, scheduler_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            scheduler_name: scheduler_name.into(),
            vae_tiling: false,
            cpu_offload: false,
        }
    }
}

/// Payload of `unload_model`. The service takes no arguments for an unload;
/// the empty object keeps the envelope shape uniform.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UnloadModelParams {}

/// Payload of `generate_image`.
///
/// A `None` seed goes out as JSON `null`; the service then draws one from
/// `0..2^32` itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerateParams {
    /// Positive prompt.
    pub prompt: String,
    /// Negative prompt; the service skips it when empty.
    pub negative_prompt: String,
    /// Sampling step count.
    pub steps: u32,
    /// Classifier-free guidance scale.
    pub guidance: f64,
    /// RNG seed, or `null` to let the service pick.
    pub seed: Option<i64>,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            steps: 20,
            guidance: 7.5,
            seed: None,
            width: 512,
            height: 512,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
