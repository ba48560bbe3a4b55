//! `entitle-store` — the grant-store adapter seam.
//!
//! The sync layer talks to whatever holds grant records (a hosted database,
//! a local cache, a test double) exclusively through [`GrantStore`]. The
//! in-memory implementation backs tests and development.

pub mod adapter;
pub mod memory;

pub use adapter::{ChangeFeed, GrantStore, RecordSet, StoreError};
pub use memory::InMemoryGrantStore;
