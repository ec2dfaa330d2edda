//! Session actor and its public handle.
//!
//! One spawned task owns the socket, the session state and the operation
//! gate. Callers hold a [`SessionHandle`] and talk to the task over
//! channels: commands go in through an mpsc queue, state comes back as
//! [`SessionSnapshot`] values on a watch channel, and notifications fan out
//! over a broadcast channel. Nothing outside the task ever touches the
//! socket, so inbound frames and state mutations stay strictly ordered.

use futures::StreamExt;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use arttic_protocol::{ClientCommand, GenerateParams, LoadModelParams, UnloadModelParams};

use crate::config::ClientConfig;
use crate::connection::{self, WsStream};
use crate::error::ClientError;
use crate::events::SessionEvent;
use crate::gate::OperationGate;
use crate::router;
use crate::sender;
use crate::state::{ConnectionPhase, OperationKind, SessionSnapshot, SessionState};

const REQUEST_QUEUE: usize = 16;

/// A command on its way to the session task.
struct Submit {
    command: ClientCommand,
    reply: oneshot::Sender<Result<(), ClientError>>,
}

/// Why the connected loop ended.
enum ServeEnd {
    /// The socket closed or failed; the reconnect loop takes over.
    LinkLost,
    /// The session was asked to shut down.
    Shutdown,
}

/// Handle to a running session.
///
/// Dropping the handle asks the task to shut down; [`SessionHandle::close`]
/// does the same but waits for the task to finish.
#[derive(Debug)]
pub struct SessionHandle {
    requests: mpsc::Sender<Submit>,
    snapshots: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Validate `config` and spawn the session task.
    ///
    /// The task dials immediately and keeps redialing per the configured
    /// reconnect policy; the handle is usable straight away, though
    /// commands are rejected with [`ClientError::NotConnected`] until the
    /// link is up.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when `config` is unusable.
    pub fn spawn(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_QUEUE);
        let (snapshots_tx, snapshots_rx) = watch::channel(SessionSnapshot::default());
        let (events_tx, _) = broadcast::channel(config.event_buffer);
        let cancel = CancellationToken::new();
        let runner = SessionRunner {
            state: SessionState::default(),
            gate: OperationGate::new(),
            requests: requests_rx,
            snapshots: snapshots_tx,
            events: events_tx.clone(),
            cancel: cancel.clone(),
            consecutive_failures: 0,
            op_deadline: None,
            config,
        };
        let task = tokio::spawn(runner.run());
        Ok(Self {
            requests: requests_tx,
            snapshots: snapshots_rx,
            events: events_tx,
            cancel,
            task: Some(task),
        })
    }

    /// Ask the service to load a checkpoint.
    ///
    /// Resolves once the command is on the wire; completion arrives later
    /// as a [`SessionEvent::ModelLoaded`] or [`SessionEvent::ServerError`].
    pub async fn load_model(&self, params: LoadModelParams) -> Result<(), ClientError> {
        self.submit(ClientCommand::LoadModel(params)).await
    }

    /// Ask the service to release its checkpoint.
    pub async fn unload_model(&self) -> Result<(), ClientError> {
        self.submit(ClientCommand::UnloadModel(UnloadModelParams {})).await
    }

    /// Ask the service to generate an image.
    pub async fn generate(&self, params: GenerateParams) -> Result<(), ClientError> {
        self.submit(ClientCommand::GenerateImage(params)).await
    }

    /// Queue one command for transmission.
    ///
    /// # Errors
    ///
    /// [`ClientError::Busy`] when another operation holds the slot,
    /// [`ClientError::NotConnected`] when the link is down, and
    /// [`ClientError::SessionClosed`] when the task has exited. Transport
    /// and encode failures surface as themselves.
    pub async fn submit(&self, command: ClientCommand) -> Result<(), ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(Submit {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ClientError::SessionClosed)?;
        reply_rx.await.map_err(|_| ClientError::SessionClosed)?
    }

    /// The current session snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// The operation currently occupying the slot, if any.
    pub fn operation(&self) -> Option<OperationKind> {
        self.snapshots.borrow().operation
    }

    /// A watch receiver that yields every snapshot change.
    pub fn snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Subscribe to session notifications.
    ///
    /// A subscriber that falls more than the configured buffer behind
    /// observes a lag error and continues from the oldest retained event.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Wait until the link is up.
    ///
    /// Transient error phases do not resolve this: as long as the session
    /// keeps redialing, the wait keeps waiting.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConnected`] when the session exhausts its redials
    /// first, [`ClientError::SessionClosed`] when it shut down instead.
    pub async fn wait_until_connected(&self) -> Result<(), ClientError> {
        let mut snapshots = self.snapshots.clone();
        match snapshots.wait_for(|s| s.phase.is_connected()).await {
            Ok(_) => Ok(()),
            // The task exited; the final snapshot says why.
            Err(_) if self.snapshots.borrow().phase == ConnectionPhase::Errored => {
                Err(ClientError::NotConnected)
            }
            Err(_) => Err(ClientError::SessionClosed),
        }
    }

    /// Resolves once the session task has exited.
    pub async fn closed(&self) {
        self.requests.closed().await;
    }

    /// Shut the session down and wait for the task to finish.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State owned by the session task.
struct SessionRunner {
    config: ClientConfig,
    state: SessionState,
    gate: OperationGate,
    requests: mpsc::Receiver<Submit>,
    snapshots: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
    /// Dials failed since the last successful open; drives the ceiling.
    consecutive_failures: u32,
    /// When the in-flight operation is declared dead. Survives link loss,
    /// so a slot stuck across a reconnect still times out once traffic
    /// resumes.
    op_deadline: Option<Instant>,
}

impl SessionRunner {
    async fn run(mut self) {
        info!(server = %self.config.server_url, "session task started");
        loop {
            self.set_phase(ConnectionPhase::Connecting);
            let Some(dialed) = self.dial().await else {
                break;
            };
            match dialed {
                Ok(stream) => {
                    self.consecutive_failures = 0;
                    self.set_phase(ConnectionPhase::Connected);
                    self.emit(SessionEvent::Connected);
                    match self.serve(stream).await {
                        ServeEnd::Shutdown => break,
                        ServeEnd::LinkLost => self.emit(SessionEvent::Disconnected),
                    }
                }
                Err(err) => {
                    warn!(error = %err, "dial failed");
                    self.set_phase(ConnectionPhase::Errored);
                    self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                }
            }
            if self.cancel.is_cancelled() || !self.schedule_reconnect().await {
                break;
            }
        }
        info!("session task stopped");
    }

    /// Dial once, rejecting commands until the handshake settles.
    ///
    /// Returns `None` when the session should stop instead of connecting.
    async fn dial(&mut self) -> Option<Result<WsStream, ClientError>> {
        let open = connection::open(&self.config.server_url);
        tokio::pin!(open);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return None,
                result = &mut open => return Some(result),
                submit = self.requests.recv() => match submit {
                    Some(submit) => {
                        let _ = submit.reply.send(Err(ClientError::NotConnected));
                    }
                    None => return None,
                },
            }
        }
    }

    /// Pump the established link until it drops or the session shuts down.
    async fn serve(&mut self, mut stream: WsStream) -> ServeEnd {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = stream.close(None).await;
                    return ServeEnd::Shutdown;
                }
                submit = self.requests.recv() => match submit {
                    Some(submit) => self.handle_submit(&mut stream, submit).await,
                    None => {
                        let _ = stream.close(None).await;
                        return ServeEnd::Shutdown;
                    }
                },
                frame = stream.next() => match frame {
                    Some(Ok(message)) => self.on_message(message),
                    Some(Err(err)) => {
                        // Momentary phase; the reconnect path flips it to
                        // reconnecting right after.
                        warn!(error = %err, "socket failed");
                        self.set_phase(ConnectionPhase::Errored);
                        return ServeEnd::LinkLost;
                    }
                    None => {
                        debug!("socket closed by peer");
                        return ServeEnd::LinkLost;
                    }
                },
                () = Self::op_timeout(self.op_deadline), if self.op_deadline.is_some() => {
                    self.on_operation_timeout();
                }
            }
        }
    }

    /// Sleep out the reconnect delay, rejecting commands in the meantime.
    ///
    /// Returns `false` when the session should stop dialing: shutdown, all
    /// handles gone, or the failure ceiling reached.
    async fn schedule_reconnect(&mut self) -> bool {
        if let Some(max) = self.config.reconnect.max_attempts {
            if self.consecutive_failures >= max {
                warn!(
                    attempts = self.consecutive_failures,
                    "redial ceiling reached, giving up"
                );
                self.set_phase(ConnectionPhase::Errored);
                self.emit(SessionEvent::ReconnectsExhausted {
                    attempts: self.consecutive_failures,
                });
                return false;
            }
        }
        self.state.reconnect_attempts += 1;
        let attempt = self.state.reconnect_attempts;
        self.set_phase(ConnectionPhase::Reconnecting);
        self.emit(SessionEvent::Reconnecting { attempt });
        info!(
            attempt,
            delay_ms = self.config.reconnect.delay_ms,
            "reconnect scheduled"
        );
        let sleep = tokio::time::sleep(self.config.reconnect.delay());
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => return true,
                () = self.cancel.cancelled() => return false,
                submit = self.requests.recv() => match submit {
                    Some(submit) => {
                        let _ = submit.reply.send(Err(ClientError::NotConnected));
                    }
                    None => return false,
                },
            }
        }
    }

    async fn handle_submit(&mut self, stream: &mut WsStream, submit: Submit) {
        let Submit { command, reply } = submit;
        let result = self.begin_operation(stream, command).await;
        let _ = reply.send(result);
    }

    /// Claim the slot, transmit, confirm.
    ///
    /// The claim is only kept when the frame actually leaves: a busy gate
    /// or a failed transmit drops the permit and the slot frees again.
    async fn begin_operation(
        &mut self,
        stream: &mut WsStream,
        command: ClientCommand,
    ) -> Result<(), ClientError> {
        let kind = OperationKind::of(&command);
        let permit = self.gate.try_begin(kind)?;
        if let Err(err) = sender::transmit(stream, &command).await {
            warn!(error = %err, action = kind.as_str(), "transmit failed");
            drop(permit);
            return Err(err);
        }
        permit.commit();
        if let Some(timeout) = self.config.operation_timeout() {
            self.op_deadline = Some(Instant::now() + timeout);
        }
        info!(action = kind.as_str(), "command transmitted");
        self.publish();
        Ok(())
    }

    fn on_message(&mut self, message: Message) {
        // Inbound traffic of any kind proves the service is alive, so it
        // restarts the operation timer.
        self.rearm_op_deadline();
        match message {
            Message::Text(text) => {
                let event = router::handle_frame(&mut self.state, &self.gate, text.as_str());
                if self.gate.current().is_none() {
                    self.op_deadline = None;
                }
                self.publish();
                self.emit(event);
            }
            Message::Binary(_) => warn!("ignoring unexpected binary frame"),
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => {}
        }
    }

    fn rearm_op_deadline(&mut self) {
        if self.gate.current().is_some() {
            if let Some(timeout) = self.config.operation_timeout() {
                self.op_deadline = Some(Instant::now() + timeout);
            }
        }
    }

    fn on_operation_timeout(&mut self) {
        self.op_deadline = None;
        if let Some(kind) = self.gate.release() {
            warn!(operation = %kind, "operation timed out, releasing the slot");
            self.publish();
            self.emit(SessionEvent::OperationTimedOut { kind });
        }
    }

    async fn op_timeout(deadline: Option<Instant>) {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }

    fn set_phase(&mut self, phase: ConnectionPhase) {
        if self.state.phase != phase {
            info!(from = self.state.phase.as_str(), to = phase.as_str(), "phase changed");
            self.state.phase = phase;
        }
        self.publish();
    }

    /// Publish the current snapshot if it differs from the last one.
    fn publish(&self) {
        let snapshot = self.state.snapshot(self.gate.current());
        let _ = self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    fn emit(&self, event: SessionEvent) {
        debug!(event = event.name(), "notifying subscribers");
        let _ = self.events.send(event);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn unreachable_config() -> ClientConfig {
        // Port 9 on localhost refuses immediately on any sane test host.
        let mut config = ClientConfig::new("http://127.0.0.1:9");
        config.reconnect.delay_ms = 5;
        config
    }

    #[tokio::test]
    async fn spawn_rejects_invalid_config() {
        let err = SessionHandle::spawn(ClientConfig::new("ftp://nope")).unwrap_err();
        assert_matches!(err, ClientError::Config(_));
    }

    #[tokio::test]
    async fn close_stops_the_task() {
        let handle = SessionHandle::spawn(unreachable_config()).unwrap();
        let requests = handle.requests.clone();
        handle.close().await;
        // The task is gone; the queue is closed.
        assert!(requests.is_closed());
    }

    #[tokio::test]
    async fn closed_resolves_after_close() {
        let handle = SessionHandle::spawn(unreachable_config()).unwrap();
        let cancel = handle.cancel.clone();
        cancel.cancel();
        handle.closed().await;
    }

    #[tokio::test]
    async fn initial_snapshot_is_empty() {
        let handle = SessionHandle::spawn(unreachable_config()).unwrap();
        let snapshot = handle.snapshots().borrow().clone();
        assert!(!snapshot.is_model_loaded);
        assert!(snapshot.operation.is_none());
        handle.close().await;
    }
}
