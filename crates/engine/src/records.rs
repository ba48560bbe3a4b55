//! Grant records as fetched from the backing store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use entitle_core::{ActionSet, FeatureId, ModuleId, TenantId, UserId};

/// Tenant-level module entitlement status.
///
/// `Included` and `Extra` both activate a module; the distinction is a
/// billing concern (plan bundle vs paid add-on), not an authorization one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Included,
    Extra,
    Disabled,
}

impl ModuleStatus {
    /// Whether this status activates the module for the tenant.
    pub fn is_active(self) -> bool {
        matches!(self, ModuleStatus::Included | ModuleStatus::Extra)
    }
}

impl core::fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            ModuleStatus::Included => "included",
            ModuleStatus::Extra => "extra",
            ModuleStatus::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

/// One tenant's entitlement record for one module.
///
/// At most one record exists per (tenant, module); a missing record means the
/// module is off for that tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantModuleStatus {
    pub tenant_id: TenantId,
    pub module_id: ModuleId,
    pub status: ModuleStatus,
}

/// A user's base grant on one feature.
///
/// At most one record exists per (tenant, user, feature).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermissionGrant {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub feature_id: FeatureId,
    pub actions: ActionSet,
}

/// A time-bound grant delegated to a user by another party.
///
/// Multiple shares may target the same (user, feature); their grants are
/// unioned. Records are never edited in place, only superseded by new rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedAccessGrant {
    pub tenant_id: TenantId,
    /// The delegating party.
    pub owner_id: UserId,
    /// The user this share was granted to.
    pub target_user_id: UserId,
    pub feature_id: FeatureId,
    pub actions: ActionSet,
    pub expires_at: DateTime<Utc>,
}

impl SharedAccessGrant {
    /// Whether this share is active at `now`.
    ///
    /// Strict comparison: a share expiring exactly at `now` is already
    /// inactive.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// The three record sets a full fetch returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSets {
    pub module_status: Vec<TenantModuleStatus>,
    pub user_grants: Vec<UserPermissionGrant>,
    pub shared_grants: Vec<SharedAccessGrant>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use entitle_core::Action;

    #[test]
    fn module_status_activation() {
        assert!(ModuleStatus::Included.is_active());
        assert!(ModuleStatus::Extra.is_active());
        assert!(!ModuleStatus::Disabled.is_active());
    }

    #[test]
    fn module_status_uses_snake_case_wire_names() {
        let json = serde_json::to_string(&ModuleStatus::Included).unwrap();
        assert_eq!(json, r#""included""#);

        let status: ModuleStatus = serde_json::from_str(r#""extra""#).unwrap();
        assert_eq!(status, ModuleStatus::Extra);
    }

    #[test]
    fn share_expiring_exactly_now_is_inactive() {
        let now = Utc::now();
        let share = SharedAccessGrant {
            tenant_id: TenantId::new(),
            owner_id: UserId::new(),
            target_user_id: UserId::new(),
            feature_id: FeatureId::new("finance_cards"),
            actions: ActionSet::only(Action::View),
            expires_at: now,
        };

        assert!(share.is_active(now - Duration::seconds(1)));
        assert!(!share.is_active(now));
        assert!(!share.is_active(now + Duration::seconds(1)));
    }
}
