//! `entitle-catalog` — the static registry of modules and features.
//!
//! The catalog answers "what can be gated": which modules exist and which
//! features belong to them. It carries no entitlement state; whether a tenant
//! or user may actually use an entry is decided by the engine against grant
//! records.

pub mod builtin;
pub mod catalog;

pub use builtin::builtin;
pub use catalog::{CatalogError, Feature, Module, PolicyCatalog};
