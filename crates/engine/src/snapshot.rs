//! Immutable decision-ready view of one (tenant, user) scope.

use std::collections::HashMap;

use entitle_core::{FeatureId, ModuleId};

use crate::records::{GrantSets, SharedAccessGrant, TenantModuleStatus, UserPermissionGrant};

/// All grant state for one (tenant, user) scope, indexed for O(1) lookups.
///
/// A snapshot is built once from a full fetch and never mutated afterwards;
/// refreshes produce a new snapshot that replaces the old one wholesale.
/// Decision functions only ever read it.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationSnapshot {
    module_status: HashMap<ModuleId, TenantModuleStatus>,
    user_grants: HashMap<FeatureId, UserPermissionGrant>,
    shared_grants: HashMap<FeatureId, Vec<SharedAccessGrant>>,
    loaded: bool,
}

impl AuthorizationSnapshot {
    /// The snapshot that exists before any load has succeeded.
    ///
    /// Denies everything: decisions against it short-circuit to `false`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index raw record sets into a decision-ready snapshot.
    ///
    /// Pure and synchronous. Duplicate keys are last-write-wins (the store
    /// owns the at-most-one-record invariant). Expired shares are kept:
    /// expiry is evaluated against the clock at decision time, not here.
    pub fn index(sets: GrantSets) -> Self {
        let mut module_status = HashMap::with_capacity(sets.module_status.len());
        for record in sets.module_status {
            module_status.insert(record.module_id.clone(), record);
        }

        let mut user_grants = HashMap::with_capacity(sets.user_grants.len());
        for record in sets.user_grants {
            user_grants.insert(record.feature_id.clone(), record);
        }

        let mut shared_grants: HashMap<FeatureId, Vec<SharedAccessGrant>> = HashMap::new();
        for record in sets.shared_grants {
            shared_grants
                .entry(record.feature_id.clone())
                .or_default()
                .push(record);
        }

        Self {
            module_status,
            user_grants,
            shared_grants,
            loaded: true,
        }
    }

    /// Whether a load has completed for this snapshot.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn module_status(&self, module_id: &ModuleId) -> Option<&TenantModuleStatus> {
        self.module_status.get(module_id)
    }

    /// Whether the tenant has `module_id` active (`included` or `extra`).
    ///
    /// A module with no record is inactive.
    pub fn is_module_active(&self, module_id: &ModuleId) -> bool {
        self.module_status
            .get(module_id)
            .map(|r| r.status.is_active())
            .unwrap_or(false)
    }

    pub fn user_grant(&self, feature_id: &FeatureId) -> Option<&UserPermissionGrant> {
        self.user_grants.get(feature_id)
    }

    /// Shares targeting this scope's user for `feature_id`.
    ///
    /// May contain expired entries; callers check [`SharedAccessGrant::is_active`].
    pub fn shared_grants_for(&self, feature_id: &FeatureId) -> &[SharedAccessGrant] {
        self.shared_grants
            .get(feature_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Raw module-status map (for rendering entitlement overviews).
    pub fn module_statuses(&self) -> &HashMap<ModuleId, TenantModuleStatus> {
        &self.module_status
    }

    /// Raw base-grant map (for rendering permission editors).
    pub fn user_grants(&self) -> &HashMap<FeatureId, UserPermissionGrant> {
        &self.user_grants
    }

    /// Raw shared-grant map (for rendering "shared with me" panels).
    pub fn shared_grants(&self) -> &HashMap<FeatureId, Vec<SharedAccessGrant>> {
        &self.shared_grants
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
