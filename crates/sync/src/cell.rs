//! Shared core of a session: current snapshot, lifecycle state, scope epoch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

use entitle_engine::AuthorizationSnapshot;

use crate::state::{SyncError, SyncState};

const STATE_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug)]
struct Slot {
    snapshot: Arc<AuthorizationSnapshot>,
    state: SyncState,
}

/// Snapshot and lifecycle state behind one epoch-guarded lock.
///
/// Readers clone the snapshot `Arc` under a read lock and evaluate against
/// that one complete snapshot; writers replace the whole `Arc` in a single
/// step. A decision never mixes rows from two fetch rounds.
///
/// The epoch names the scope generation. Worker writes carry the generation
/// they were produced for and are refused once it is stale; the check runs
/// under the write lock, so a write racing [`SnapshotCell::advance`] cannot
/// land after the generation moved on. State transitions are guarded the
/// same way, which keeps a superseded worker from repainting the state of
/// its successor.
#[derive(Debug)]
pub struct SnapshotCell {
    slot: RwLock<Slot>,
    epoch: AtomicU64,
    state_tx: broadcast::Sender<SyncState>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Self {
            slot: RwLock::new(Slot {
                snapshot: Arc::new(AuthorizationSnapshot::empty()),
                state: SyncState::Uninitialized,
            }),
            epoch: AtomicU64::new(0),
            state_tx,
        }
    }

    /// The snapshot to evaluate decisions against right now.
    ///
    /// A poisoned slot degrades to the empty snapshot, which denies
    /// everything.
    pub fn load(&self) -> Arc<AuthorizationSnapshot> {
        let Ok(slot) = self.slot.read() else {
            return Arc::new(AuthorizationSnapshot::empty());
        };
        Arc::clone(&slot.snapshot)
    }

    /// Current lifecycle state. A poisoned slot reads as `Error`.
    pub fn state(&self) -> SyncState {
        let Ok(slot) = self.slot.read() else {
            return SyncState::Error;
        };
        slot.state
    }

    /// Register an observer for state transitions. Consecutive duplicates
    /// are collapsed before sending.
    pub fn watch(&self) -> broadcast::Receiver<SyncState> {
        self.state_tx.subscribe()
    }

    /// The current scope generation.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Open a new scope generation, invalidating writes for older ones.
    /// Returns the new generation.
    pub fn advance(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Swap in a freshly indexed snapshot and move to `Ready`, provided
    /// `epoch` is still the current generation.
    pub fn publish(&self, epoch: u64, snapshot: AuthorizationSnapshot) -> Result<(), SyncError> {
        // A poisoned slot is unusable; discard the result like a stale one.
        let Ok(mut slot) = self.slot.write() else {
            return Err(SyncError::Superseded);
        };
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return Err(SyncError::Superseded);
        }
        slot.snapshot = Arc::new(snapshot);
        self.transition(&mut slot, SyncState::Ready);
        Ok(())
    }

    /// Record a state transition for generation `epoch`, keeping the
    /// snapshot as is.
    pub fn mark(&self, epoch: u64, state: SyncState) -> Result<(), SyncError> {
        let Ok(mut slot) = self.slot.write() else {
            return Err(SyncError::Superseded);
        };
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return Err(SyncError::Superseded);
        }
        self.transition(&mut slot, state);
        Ok(())
    }

    /// Drop back to the empty snapshot (denying everything) and force
    /// `state`, regardless of generation. For the lifecycle owner's use
    /// around [`SnapshotCell::advance`]; workers never call this.
    pub fn reset(&self, state: SyncState) {
        if let Ok(mut slot) = self.slot.write() {
            slot.snapshot = Arc::new(AuthorizationSnapshot::empty());
            self.transition(&mut slot, state);
        }
    }

    fn transition(&self, slot: &mut Slot, next: SyncState) {
        if slot.state == next {
            return;
        }
        slot.state = next;
        // Observers may lag or be gone; neither matters here.
        let _ = self.state_tx.send(next);
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
