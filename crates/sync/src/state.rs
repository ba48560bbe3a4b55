//! Session lifecycle states and errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use entitle_store::StoreError;

/// Lifecycle of an authorization session.
///
/// `Error` is advisory: the last good snapshot keeps serving decisions while
/// the session retries in the background. Only `Uninitialized` and a
/// never-loaded `Loading` imply that every check denies.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No scope is active; either never initialized or disposed.
    Uninitialized,
    /// A fetch for the current scope is in flight. Before the first load
    /// this denies everything; on a refetch the previous snapshot keeps
    /// serving.
    Loading,
    /// A snapshot for the current scope is loaded and kept fresh.
    Ready,
    /// The last fetch failed or the change feed dropped; retrying.
    Error,
}

impl SyncState {
    pub fn is_ready(self) -> bool {
        matches!(self, SyncState::Ready)
    }
}

impl core::fmt::Display for SyncState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            SyncState::Uninitialized => "uninitialized",
            SyncState::Loading => "loading",
            SyncState::Ready => "ready",
            SyncState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Session-level failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The session has no active scope.
    #[error("session not initialized")]
    NotInitialized,

    /// The grant store failed.
    #[error("grant store: {0}")]
    Store(#[from] StoreError),

    /// The scope changed while this work was in flight; its result was
    /// discarded.
    #[error("superseded by a newer scope")]
    Superseded,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
