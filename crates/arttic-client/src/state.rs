//! Session state tracking.
//!
//! The session task owns a [`SessionState`] and mutates it as frames arrive;
//! callers only ever see immutable [`SessionSnapshot`] copies published
//! through a watch channel.

use std::fmt;

use serde::Serialize;

use arttic_protocol::{ClientCommand, ModelFamily};

/// Lifecycle of the WebSocket link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    /// First dial is in progress.
    #[default]
    Connecting,
    /// The link is up and commands can be transmitted.
    Connected,
    /// The link dropped and a redial is scheduled or in progress.
    Reconnecting,
    /// The session gave up redialing.
    Errored,
}

impl ConnectionPhase {
    /// Stable lowercase name, as used in snapshots and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Errored => "errored",
        }
    }

    /// Whether commands can be transmitted right now.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of command currently occupying the operation slot.
///
/// Named by the wire action that started it, so a busy rejection tells the
/// caller exactly which request is still pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum OperationKind {
    /// A `load_model` is pending.
    #[serde(rename = "load_model")]
    LoadingModel,
    /// An `unload_model` is pending.
    #[serde(rename = "unload_model")]
    UnloadingModel,
    /// A `generate_image` is pending.
    #[serde(rename = "generate_image")]
    Generating,
}

impl OperationKind {
    /// Every kind, for exhaustive tests.
    pub const ALL: &'static [OperationKind] =
        &[Self::LoadingModel, Self::UnloadingModel, Self::Generating];

    /// The kind a given command occupies the slot as.
    pub fn of(command: &ClientCommand) -> Self {
        match command {
            ClientCommand::LoadModel(_) => Self::LoadingModel,
            ClientCommand::UnloadModel(_) => Self::UnloadingModel,
            ClientCommand::GenerateImage(_) => Self::Generating,
        }
    }

    /// The wire action string of the command that started this operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadingModel => "load_model",
            Self::UnloadingModel => "unload_model",
            Self::Generating => "generate_image",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable view of the session at one instant.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Link lifecycle phase.
    pub phase: ConnectionPhase,
    /// Whether the service reports a loaded checkpoint.
    pub is_model_loaded: bool,
    /// Architecture family of the loaded checkpoint. Kept after unload so
    /// the last family remains visible until the next load replaces it.
    pub model_family: Option<ModelFamily>,
    /// Last status line pushed by the service.
    pub status_message: Option<String>,
    /// Default generation width announced with the current checkpoint.
    pub default_width: Option<u32>,
    /// Default generation height announced with the current checkpoint.
    pub default_height: Option<u32>,
    /// Command occupying the operation slot, if any.
    pub operation: Option<OperationKind>,
    /// Cumulative redials attempted over the life of the session.
    pub reconnect_attempts: u64,
}

/// Mutable state owned by the session task.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) phase: ConnectionPhase,
    pub(crate) is_model_loaded: bool,
    pub(crate) model_family: Option<ModelFamily>,
    pub(crate) status_message: Option<String>,
    pub(crate) default_width: Option<u32>,
    pub(crate) default_height: Option<u32>,
    pub(crate) reconnect_attempts: u64,
}

impl SessionState {
    /// Copy out a snapshot, attaching the gate's current occupant.
    pub(crate) fn snapshot(&self, operation: Option<OperationKind>) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            is_model_loaded: self.is_model_loaded,
            model_family: self.model_family.clone(),
            status_message: self.status_message.clone(),
            default_width: self.default_width,
            default_height: self.default_height,
            operation,
            reconnect_attempts: self.reconnect_attempts,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use arttic_protocol::{GenerateParams, LoadModelParams, UnloadModelParams};

    use super::*;

    #[test]
    fn initial_phase_is_connecting() {
        assert_eq!(ConnectionPhase::default(), ConnectionPhase::Connecting);
        assert!(!ConnectionPhase::default().is_connected());
        assert!(ConnectionPhase::Connected.is_connected());
    }

    #[test]
    fn phase_names() {
        assert_eq!(ConnectionPhase::Connecting.as_str(), "connecting");
        assert_eq!(ConnectionPhase::Connected.as_str(), "connected");
        assert_eq!(ConnectionPhase::Reconnecting.as_str(), "reconnecting");
        assert_eq!(ConnectionPhase::Errored.as_str(), "errored");
    }

    #[test]
    fn operation_kind_matches_command_action() {
        let commands = [
            ClientCommand::LoadModel(LoadModelParams::new("m", "Euler")),
            ClientCommand::UnloadModel(UnloadModelParams {}),
            ClientCommand::GenerateImage(GenerateParams::default()),
        ];
        for command in &commands {
            assert_eq!(OperationKind::of(command).as_str(), command.action());
        }
    }

    #[test]
    fn operation_kind_serializes_as_action() {
        let val = serde_json::to_value(OperationKind::Generating).unwrap();
        assert_eq!(val, "generate_image");
    }

    #[test]
    fn default_snapshot_is_empty() {
        let snapshot = SessionSnapshot::default();
        assert_eq!(snapshot.phase, ConnectionPhase::Connecting);
        assert!(!snapshot.is_model_loaded);
        assert!(snapshot.model_family.is_none());
        assert!(snapshot.operation.is_none());
        assert_eq!(snapshot.reconnect_attempts, 0);
    }

    #[test]
    fn snapshot_serializes_snake_case() {
        let state = SessionState {
            phase: ConnectionPhase::Connected,
            is_model_loaded: true,
            model_family: Some(ModelFamily::Sdxl),
            status_message: Some("Ready: m (SDXL) ".to_string()),
            default_width: Some(1024),
            default_height: Some(1024),
            reconnect_attempts: 2,
        };
        let val = serde_json::to_value(state.snapshot(Some(OperationKind::Generating))).unwrap();
        assert_eq!(val["phase"], "connected");
        assert_eq!(val["is_model_loaded"], true);
        assert_eq!(val["model_family"], "SDXL");
        assert_eq!(val["operation"], "generate_image");
        assert_eq!(val["reconnect_attempts"], 2);
    }
}
