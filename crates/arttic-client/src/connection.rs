//! WebSocket endpoint derivation and dialing.

use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::error::ClientError;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Derive the WebSocket endpoint from the service base URL.
///
/// The service mounts its socket at `/ws` next to the HTTP API, so
/// `http://host:port` becomes `ws://host:port/ws` and `https` becomes `wss`.
/// A trailing slash on the base URL is tolerated.
pub(crate) fn ws_url(server_url: &str) -> Result<String, ClientError> {
    let trimmed = server_url.trim_end_matches('/');
    let (scheme, rest) = if let Some(rest) = trimmed.strip_prefix("http://") {
        ("ws", rest)
    } else if let Some(rest) = trimmed.strip_prefix("https://") {
        ("wss", rest)
    } else {
        return Err(ClientError::Config(format!(
            "unsupported server URL scheme: {server_url}"
        )));
    };
    if rest.is_empty() {
        return Err(ClientError::Config(format!(
            "server URL has no host: {server_url}"
        )));
    }
    Ok(format!("{scheme}://{rest}/ws"))
}

/// Dial the service WebSocket.
pub(crate) async fn open(server_url: &str) -> Result<WsStream, ClientError> {
    let url = ws_url(server_url)?;
    debug!(%url, "dialing service socket");
    let (stream, _response) = connect_async(&url).await?;
    Ok(stream)
}
