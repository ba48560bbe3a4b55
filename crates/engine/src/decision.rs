//! Pure decision functions over a snapshot.
//!
//! - No IO
//! - No panics
//! - No clock access: callers pass `now`

use chrono::{DateTime, Utc};
use serde::Serialize;

use entitle_core::{Action, FeatureId, ModuleId};

use crate::records::ModuleStatus;
use crate::snapshot::AuthorizationSnapshot;

/// Named policy rules applied on top of the layered grant resolution.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DecisionPolicy {
    /// When enabled, a mutation (`create`/`edit`/`delete`) is only allowed if
    /// `view` also resolves allowed for the same feature. Off by default:
    /// grants are taken literally, which is how the product has always
    /// behaved (grant editors nudge toward `view`, the engine does not).
    pub require_view_for_mutations: bool,
}

/// Why a decision came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DecisionVerdict {
    /// No loaded snapshot: nothing is known, everything is denied.
    SnapshotNotLoaded,
    /// The module is disabled for the tenant, or has no status record at all.
    ModuleNotEntitled { status: Option<ModuleStatus> },
    /// Allowed by the user's base grant.
    GrantedByBase,
    /// Allowed by a share active at the time of the check.
    GrantedByShare { expires_at: DateTime<Utc> },
    /// A policy rule requires `view` for mutations and `view` did not resolve.
    ViewRequired,
    /// No layer granted the action.
    NoMatchingGrant,
}

impl DecisionVerdict {
    pub fn granted(&self) -> bool {
        matches!(
            self,
            DecisionVerdict::GrantedByBase | DecisionVerdict::GrantedByShare { .. }
        )
    }
}

/// A decision together with its inputs, for audit trails and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionExplanation {
    pub module_id: ModuleId,
    pub feature_id: FeatureId,
    pub action: Action,
    pub granted: bool,
    pub verdict: DecisionVerdict,
    pub checked_at: DateTime<Utc>,
}

impl core::fmt::Display for DecisionExplanation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let outcome = if self.granted { "allowed" } else { "denied" };
        write!(
            f,
            "{} {} on {}/{}: ",
            outcome, self.action, self.module_id, self.feature_id
        )?;
        match &self.verdict {
            DecisionVerdict::SnapshotNotLoaded => write!(f, "grants not loaded"),
            DecisionVerdict::ModuleNotEntitled { status: Some(s) } => {
                write!(f, "module status is '{s}'")
            }
            DecisionVerdict::ModuleNotEntitled { status: None } => {
                write!(f, "module has no status record")
            }
            DecisionVerdict::GrantedByBase => write!(f, "granted by base permission"),
            DecisionVerdict::GrantedByShare { expires_at } => {
                write!(f, "granted by a share expiring {expires_at}")
            }
            DecisionVerdict::ViewRequired => {
                write!(f, "mutation requires view and view is not granted")
            }
            DecisionVerdict::NoMatchingGrant => write!(f, "no grant covers this action"),
        }
    }
}

/// Resolve `action` on `feature_id` within `module_id` against `snapshot`.
///
/// Layering, first match wins:
/// 1. tenant module gate — a disabled or missing module is a hard stop;
/// 2. the user's base grant for the feature;
/// 3. any share targeting the user that grants the action and is active at
///    `now` (strictly before its expiry).
///
/// Denies by default, including against an unloaded snapshot. Total: safe to
/// call from render-hot paths with any identifiers.
pub fn can(
    snapshot: &AuthorizationSnapshot,
    policy: DecisionPolicy,
    module_id: &ModuleId,
    feature_id: &FeatureId,
    action: Action,
    now: DateTime<Utc>,
) -> bool {
    resolve(snapshot, policy, module_id, feature_id, action, now).granted()
}

/// Like [`can`], but returns the full verdict with inputs.
pub fn explain(
    snapshot: &AuthorizationSnapshot,
    policy: DecisionPolicy,
    module_id: &ModuleId,
    feature_id: &FeatureId,
    action: Action,
    now: DateTime<Utc>,
) -> DecisionExplanation {
    let verdict = resolve(snapshot, policy, module_id, feature_id, action, now);
    DecisionExplanation {
        module_id: module_id.clone(),
        feature_id: feature_id.clone(),
        action,
        granted: verdict.granted(),
        verdict,
        checked_at: now,
    }
}

fn resolve(
    snapshot: &AuthorizationSnapshot,
    policy: DecisionPolicy,
    module_id: &ModuleId,
    feature_id: &FeatureId,
    action: Action,
    now: DateTime<Utc>,
) -> DecisionVerdict {
    if !snapshot.is_loaded() {
        return DecisionVerdict::SnapshotNotLoaded;
    }

    // Layer 1: tenant module gate. A missing record means off.
    let status = snapshot.module_status(module_id).map(|r| r.status);
    if !status.map(ModuleStatus::is_active).unwrap_or(false) {
        return DecisionVerdict::ModuleNotEntitled { status };
    }

    let verdict = resolve_grant(snapshot, feature_id, action, now);

    // "No create without view": the mutation must itself be granted and the
    // feature must also be viewable through some layer.
    if policy.require_view_for_mutations
        && action.is_mutation()
        && verdict.granted()
        && !resolve_grant(snapshot, feature_id, Action::View, now).granted()
    {
        return DecisionVerdict::ViewRequired;
    }

    verdict
}

/// Layers 2 and 3 (base grant, then shares), without the module gate.
fn resolve_grant(
    snapshot: &AuthorizationSnapshot,
    feature_id: &FeatureId,
    action: Action,
    now: DateTime<Utc>,
) -> DecisionVerdict {
    // Layer 2: the user's own grant.
    if let Some(grant) = snapshot.user_grant(feature_id) {
        if grant.actions.contains(action) {
            return DecisionVerdict::GrantedByBase;
        }
    }

    // Layer 3: shares union; the first active share granting the action
    // decides. Expiry is evaluated here, not at fetch time, so a snapshot
    // that outlives a deadline stops honoring the share by itself.
    for share in snapshot.shared_grants_for(feature_id) {
        if share.is_active(now) && share.actions.contains(action) {
            return DecisionVerdict::GrantedByShare {
                expires_at: share.expires_at,
            };
        }
    }

    DecisionVerdict::NoMatchingGrant
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
