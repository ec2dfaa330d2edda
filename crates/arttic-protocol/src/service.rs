//! Static service configuration.

use serde::{Deserialize, Serialize};

/// Document served by `GET /api/config`.
///
/// Fetched once at startup and again on manual refresh; the gallery list in
/// particular goes stale as other clients generate, so refreshing re-reads
/// the same endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Checkpoint names available to load, without file extensions.
    pub models: Vec<String>,
    /// Scheduler names accepted by `load_model`.
    pub schedulers: Vec<String>,
    /// Output filenames currently in the gallery, newest first.
    pub gallery_images: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_service_document() {
        let body = r#"{
            "models": ["dreamshaper", "sd_xl_base_1.0"],
            "schedulers": ["Euler A", "DPM++ 2M", "DDIM", "UniPC", "Euler", "LMS"],
            "gallery_images": ["20250101-120000_dreamshaper_7.png"]
        }"#;
        let config: ServiceConfig = serde_json::from_str(body).unwrap();
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.schedulers[0], "Euler A");
        assert_eq!(config.gallery_images.len(), 1);
    }

    #[test]
    fn default_is_empty() {
        let config = ServiceConfig::default();
        assert!(config.models.is_empty());
        assert!(config.schedulers.is_empty());
        assert!(config.gallery_images.is_empty());
    }
}
