//! Model family identification.

use serde::{Deserialize, Serialize};

/// Architecture family of a loaded checkpoint, as reported by the service in
/// `model_loaded.model_type`.
///
/// The set is open: families this client does not know about pass through as
/// [`ModelFamily::Other`] with the wire string preserved.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelFamily {
    /// Stable Diffusion 1.5 (`"SD 1.5"`).
    Sd15,
    /// Stable Diffusion 2.x (`"SD 2.x"`).
    Sd2x,
    /// Stable Diffusion XL (`"SDXL"`).
    Sdxl,
    /// Stable Diffusion 3 (`"SD3"`).
    Sd3,
    /// A family this client does not recognize.
    Other(String),
}

impl ModelFamily {
    /// Wire string for this family.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sd15 => "SD 1.5",
            Self::Sd2x => "SD 2.x",
            Self::Sdxl => "SDXL",
            Self::Sd3 => "SD3",
            Self::Other(name) => name,
        }
    }

    /// Default square resolution the service selects for this family,
    /// `None` for unrecognized families.
    pub fn default_resolution(&self) -> Option<u32> {
        match self {
            Self::Sd15 => Some(512),
            Self::Sd2x => Some(768),
            Self::Sdxl | Self::Sd3 => Some(1024),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for ModelFamily {
    fn from(value: String) -> Self {
        match value.as_str() {
            "SD 1.5" => Self::Sd15,
            "SD 2.x" => Self::Sd2x,
            "SDXL" => Self::Sdxl,
            "SD3" => Self::Sd3,
            _ => Self::Other(value),
        }
    }
}

impl From<ModelFamily> for String {
    fn from(value: ModelFamily) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
