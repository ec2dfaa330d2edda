//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection;
use crate::error::ClientError;

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Default delay between reconnect attempts in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;
/// Default broadcast capacity for session notifications.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

// ─────────────────────────────────────────────────────────────────────────────
// Reconnect policy
// ─────────────────────────────────────────────────────────────────────────────

/// How the session redials after an unexpected closure.
///
/// The default is a fixed 3000 ms delay with no attempt ceiling and no
/// backoff: every closure schedules exactly one redial, forever. Note that
/// an operation in flight when the connection drops is abandoned, not
/// resumed; its slot stays occupied across the reconnect unless
/// [`ClientConfig::operation_timeout_ms`] is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay before each redial in ms (default: 3000).
    #[serde(default = "default_reconnect_delay_ms")]
    pub delay_ms: u64,
    /// Consecutive failed redials tolerated before the session gives up
    /// (default: no ceiling).
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}
fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay as a [`Duration`].
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Service base URL, `http(s)://host[:port]`. The WebSocket endpoint
    /// and output image URLs are derived from it.
    pub server_url: String,
    /// Reconnect policy.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
    /// When set, an operation that sees no inbound traffic for this many
    /// milliseconds after transmission is force-released with a timeout
    /// notification. Unset by default: an operation whose terminal event
    /// never arrives occupies the slot indefinitely.
    #[serde(default)]
    pub operation_timeout_ms: Option<u64>,
    /// Broadcast capacity for session notifications (default: 256).
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl ClientConfig {
    /// Configuration with default policies for the given base URL.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            reconnect: ReconnectPolicy::default(),
            operation_timeout_ms: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Check that a WebSocket endpoint can be derived from `server_url`.
    pub fn validate(&self) -> Result<(), ClientError> {
        let _ = connection::ws_url(&self.server_url)?;
        if self.event_buffer == 0 {
            return Err(ClientError::Config("event_buffer must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Operation timeout as a [`Duration`], if configured.
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_defaults() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_ms, 3000);
        assert_eq!(policy.delay(), Duration::from_millis(3000));
        assert_eq!(policy.max_attempts, None);
    }

    #[test]
    fn config_defaults() {
        let config = ClientConfig::new("http://127.0.0.1:8000");
        assert_eq!(config.reconnect, ReconnectPolicy::default());
        assert_eq!(config.operation_timeout_ms, None);
        assert_eq!(config.event_buffer, 256);
    }

    #[test]
    fn deserialize_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"server_url":"http://localhost:8000"}"#).unwrap();
        assert_eq!(config.reconnect.delay_ms, 3000);
        assert_eq!(config.event_buffer, 256);
        assert!(config.operation_timeout_ms.is_none());
    }

    #[test]
    fn deserialize_overrides() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "server_url": "https://lab.example",
                "reconnect": {"delay_ms": 50, "max_attempts": 4},
                "operation_timeout_ms": 60000
            }"#,
        )
        .unwrap();
        assert_eq!(config.reconnect.delay_ms, 50);
        assert_eq!(config.reconnect.max_attempts, Some(4));
        assert_eq!(config.operation_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn validate_accepts_http_and_https() {
        assert!(ClientConfig::new("http://localhost:8000").validate().is_ok());
        assert!(ClientConfig::new("https://lab.example").validate().is_ok());
    }

    #[test]
    fn validate_rejects_other_schemes() {
        let err = ClientConfig::new("ftp://lab.example").validate().unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn validate_rejects_zero_event_buffer() {
        let mut config = ClientConfig::new("http://localhost:8000");
        config.event_buffer = 0;
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));
    }
}
