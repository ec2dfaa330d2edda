//! Outbound command encoding and transmission.

use futures::SinkExt;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use arttic_protocol::ClientCommand;

use crate::connection::WsStream;
use crate::error::ClientError;

/// Encode a command as the `{"action", "payload"}` text frame the service
/// expects.
pub(crate) fn encode(command: &ClientCommand) -> Result<String, ClientError> {
    serde_json::to_string(command).map_err(ClientError::Encode)
}

/// Encode and push one command down the socket.
///
/// The send is flushed before returning, so an `Ok` means the frame left
/// this process.
pub(crate) async fn transmit(
    stream: &mut WsStream,
    command: &ClientCommand,
) -> Result<(), ClientError> {
    let text = encode(command)?;
    debug!(action = command.action(), "transmitting command");
    stream.send(Message::Text(text.into())).await?;
    Ok(())
}
