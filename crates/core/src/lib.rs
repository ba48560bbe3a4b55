//! `entitle-core` — foundation types for the authorization engine.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the closed action vocabulary, and the core
//! error model.

pub mod action;
pub mod error;
pub mod id;

pub use action::{Action, ActionSet};
pub use error::{CoreError, CoreResult};
pub use id::{FeatureId, ModuleId, TenantId, UserId};
