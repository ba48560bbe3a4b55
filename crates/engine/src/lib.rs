//! `entitle-engine` — grant records, snapshot index, and decision functions.
//!
//! Everything in this crate is pure and synchronous: records come in,
//! decisions come out. Fetching, caching, and refresh live in the store and
//! sync crates.

pub mod decision;
pub mod records;
pub mod snapshot;

pub use decision::{DecisionExplanation, DecisionPolicy, DecisionVerdict, can, explain};
pub use records::{
    GrantSets, ModuleStatus, SharedAccessGrant, TenantModuleStatus, UserPermissionGrant,
};
pub use snapshot::AuthorizationSnapshot;
