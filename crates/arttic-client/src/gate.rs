//! Single-slot operation gate.
//!
//! The service processes one command at a time, so the client enforces the
//! same discipline locally: at most one operation may be in flight. A claim
//! is only confirmed once the command is actually on the wire; see
//! [`OperationPermit`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ClientError;
use crate::state::OperationKind;

/// Gate over the single in-flight operation slot.
///
/// Claiming and releasing go through [`OperationGate::try_begin`] and
/// [`OperationGate::release`]; the slot itself is shared behind an [`Arc`]
/// so clones of the gate observe the same occupancy.
#[derive(Clone, Debug, Default)]
pub struct OperationGate {
    slot: Arc<Mutex<Option<OperationKind>>>,
}

impl OperationGate {
    /// An empty gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Busy`] naming the current occupant when the
    /// slot is already taken.
    pub fn try_begin(&self, kind: OperationKind) -> Result<OperationPermit, ClientError> {
        let mut slot = self.slot.lock();
        if let Some(occupant) = *slot {
            return Err(ClientError::Busy(occupant));
        }
        *slot = Some(kind);
        Ok(OperationPermit {
            slot: Arc::clone(&self.slot),
            kind,
            committed: false,
        })
    }

    /// The current occupant, if any.
    pub fn current(&self) -> Option<OperationKind> {
        *self.slot.lock()
    }

    /// Clear the slot, returning what occupied it.
    pub fn release(&self) -> Option<OperationKind> {
        self.slot.lock().take()
    }
}

/// A claimed but not yet confirmed slot.
///
/// Dropping the permit releases the slot again; this keeps a failed or
/// refused transmit from leaving the session stuck busy. Once the command
/// is on the wire the caller calls [`OperationPermit::commit`] and the slot
/// stays occupied until a terminal event, a timeout, or an explicit
/// [`OperationGate::release`].
#[derive(Debug)]
pub struct OperationPermit {
    slot: Arc<Mutex<Option<OperationKind>>>,
    kind: OperationKind,
    committed: bool,
}

impl OperationPermit {
    /// The operation this permit holds the slot for.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Confirm the claim; the slot stays occupied after the permit drops.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for OperationPermit {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut slot = self.slot.lock();
        if *slot == Some(self.kind) {
            *slot = None;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_gate_grants() {
        let gate = OperationGate::new();
        assert_eq!(gate.current(), None);
        let permit = gate.try_begin(OperationKind::LoadingModel).unwrap();
        assert_eq!(permit.kind(), OperationKind::LoadingModel);
        assert_eq!(gate.current(), Some(OperationKind::LoadingModel));
    }

    #[test]
    fn occupied_gate_rejects_with_occupant() {
        let gate = OperationGate::new();
        let permit = gate.try_begin(OperationKind::Generating).unwrap();
        let err = gate.try_begin(OperationKind::LoadingModel).unwrap_err();
        assert_matches!(err, ClientError::Busy(OperationKind::Generating));
        drop(permit);
    }

    #[test]
    fn same_kind_is_still_rejected() {
        let gate = OperationGate::new();
        gate.try_begin(OperationKind::Generating).unwrap().commit();
        let err = gate.try_begin(OperationKind::Generating).unwrap_err();
        assert_matches!(err, ClientError::Busy(OperationKind::Generating));
    }

    #[test]
    fn dropped_permit_frees_the_slot() {
        let gate = OperationGate::new();
        let permit = gate.try_begin(OperationKind::UnloadingModel).unwrap();
        drop(permit);
        assert_eq!(gate.current(), None);
        assert!(gate.try_begin(OperationKind::Generating).is_ok());
    }

    #[test]
    fn committed_permit_keeps_the_slot() {
        let gate = OperationGate::new();
        gate.try_begin(OperationKind::Generating).unwrap().commit();
        assert_eq!(gate.current(), Some(OperationKind::Generating));
    }

    #[test]
    fn release_clears_a_committed_slot() {
        let gate = OperationGate::new();
        gate.try_begin(OperationKind::Generating).unwrap().commit();
        assert_eq!(gate.release(), Some(OperationKind::Generating));
        assert_eq!(gate.current(), None);
        assert_eq!(gate.release(), None);
    }

    #[test]
    fn clones_share_the_slot() {
        let gate = OperationGate::new();
        let other = gate.clone();
        gate.try_begin(OperationKind::LoadingModel).unwrap().commit();
        assert_eq!(other.current(), Some(OperationKind::LoadingModel));
        let _ = other.release();
        assert_eq!(gate.current(), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn kind_for(index: u8) -> OperationKind {
            OperationKind::ALL[usize::from(index) % OperationKind::ALL.len()]
        }

        proptest! {
            // Model check: after any sequence of claims, commits, drops and
            // releases, occupancy matches a single Option<OperationKind>.
            #[test]
            fn occupancy_matches_model(ops in proptest::collection::vec(any::<(u8, bool, bool)>(), 0..64)) {
                let gate = OperationGate::new();
                let mut model: Option<OperationKind> = None;
                for (selector, commit, release) in ops {
                    if release {
                        let _ = gate.release();
                        model = None;
                    } else {
                        let kind = kind_for(selector);
                        match gate.try_begin(kind) {
                            Ok(permit) => {
                                prop_assert!(model.is_none());
                                if commit {
                                    permit.commit();
                                    model = Some(kind);
                                } else {
                                    drop(permit);
                                }
                            }
                            Err(ClientError::Busy(occupant)) => {
                                prop_assert_eq!(Some(occupant), model);
                            }
                            Err(other) => return Err(TestCaseError::fail(other.to_string())),
                        }
                    }
                    prop_assert_eq!(gate.current(), model);
                }
            }
        }
    }
}
