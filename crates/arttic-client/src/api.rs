//! HTTP side of the service: startup config and output image URLs.

use chrono::{DateTime, Utc};

use arttic_protocol::ServiceConfig;

use crate::error::ClientError;

/// Client for the service's plain-HTTP endpoints.
///
/// The WebSocket carries all stateful traffic; this client only fetches the
/// startup inventory and builds URLs for finished images.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Client for the service at `server_url` (`http(s)://host[:port]`).
    pub fn new(server_url: impl Into<String>) -> Self {
        let base_url = server_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Fetch `/api/config`: available models, schedulers and the current
    /// gallery listing.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] when the request fails or the service
    /// answers with a non-success status.
    pub async fn service_config(&self) -> Result<ServiceConfig, ClientError> {
        let url = format!("{}/api/config", self.base_url);
        let config = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<ServiceConfig>()
            .await?;
        Ok(config)
    }

    /// URL of a finished image under the outputs mount.
    pub fn output_url(&self, filename: &str) -> String {
        format!("{}/outputs/{filename}", self.base_url)
    }

    /// Output URL with a cache-busting query so a refetch bypasses any
    /// stale copy of a previously displayed image.
    pub fn fresh_output_url(&self, filename: &str) -> String {
        self.fresh_output_url_at(filename, Utc::now())
    }

    /// [`Self::fresh_output_url`] with an explicit timestamp.
    pub fn fresh_output_url_at(&self, filename: &str, at: DateTime<Utc>) -> String {
        format!(
            "{}/outputs/{filename}?t={}",
            self.base_url,
            at.timestamp_millis()
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
