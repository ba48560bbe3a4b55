//! `entitle-sync` — keeps a decision-ready snapshot fresh for one scope.
//!
//! [`AuthorizationSession`] owns the lifecycle: initialize a (tenant, user)
//! scope, let the background worker keep the snapshot synchronized with the
//! grant store, answer [`can`](AuthorizationSession::can) checks
//! synchronously, dispose when the scope ends.

pub mod cell;
pub mod options;
pub mod session;
pub mod state;

pub use cell::SnapshotCell;
pub use options::SyncOptions;
pub use session::AuthorizationSession;
pub use state::{SyncError, SyncState};
