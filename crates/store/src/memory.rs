//! In-memory [`GrantStore`] with change notices, for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use entitle_core::{FeatureId, ModuleId, TenantId, UserId};
use entitle_engine::{
    GrantSets, ModuleStatus, SharedAccessGrant, TenantModuleStatus, UserPermissionGrant,
};

use crate::adapter::{ChangeFeed, GrantStore, RecordSet, StoreError};

#[derive(Debug)]
struct Watcher {
    tenant_id: TenantId,
    user_id: UserId,
    sender: mpsc::UnboundedSender<RecordSet>,
}

/// Grant store backed by process-local maps.
///
/// Mutations publish scoped change notices to live subscriptions, so the
/// full fetch-subscribe-refetch loop can run against it. Failure injection
/// and fetch delays are built in for exercising retry and race paths.
#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
    module_status: RwLock<HashMap<(TenantId, ModuleId), TenantModuleStatus>>,
    user_grants: RwLock<HashMap<(TenantId, UserId, FeatureId), UserPermissionGrant>>,
    shared_grants: RwLock<Vec<SharedAccessGrant>>,
    watchers: Mutex<Vec<Watcher>>,
    fetch_rounds: AtomicU64,
    failures_to_inject: AtomicU32,
    fetch_delay_ms: AtomicU64,
}

impl InMemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mutators (each publishes a change notice to matching subscriptions)
    // ─────────────────────────────────────────────────────────────────────

    /// Set a tenant's entitlement status for a module.
    pub fn set_module_status(&self, tenant_id: TenantId, module_id: ModuleId, status: ModuleStatus) {
        if let Ok(mut rows) = self.module_status.write() {
            rows.insert(
                (tenant_id, module_id.clone()),
                TenantModuleStatus {
                    tenant_id,
                    module_id,
                    status,
                },
            );
        }
        self.notify(RecordSet::ModuleStatus, |w| w.tenant_id == tenant_id);
    }

    /// Drop a tenant's entitlement record for a module entirely.
    pub fn remove_module_status(&self, tenant_id: TenantId, module_id: &ModuleId) {
        if let Ok(mut rows) = self.module_status.write() {
            rows.remove(&(tenant_id, module_id.clone()));
        }
        self.notify(RecordSet::ModuleStatus, |w| w.tenant_id == tenant_id);
    }

    /// Insert or replace a user's base grant on a feature.
    pub fn upsert_user_grant(&self, grant: UserPermissionGrant) {
        let (tenant_id, user_id) = (grant.tenant_id, grant.user_id);
        if let Ok(mut rows) = self.user_grants.write() {
            rows.insert((tenant_id, user_id, grant.feature_id.clone()), grant);
        }
        self.notify(RecordSet::UserGrants, |w| {
            w.tenant_id == tenant_id && w.user_id == user_id
        });
    }

    /// Remove a user's base grant on a feature.
    pub fn remove_user_grant(&self, tenant_id: TenantId, user_id: UserId, feature_id: &FeatureId) {
        if let Ok(mut rows) = self.user_grants.write() {
            rows.remove(&(tenant_id, user_id, feature_id.clone()));
        }
        self.notify(RecordSet::UserGrants, |w| {
            w.tenant_id == tenant_id && w.user_id == user_id
        });
    }

    /// Record a share. Shares are append-only; stacking ones for the same
    /// (user, feature) is allowed.
    pub fn grant_shared_access(&self, share: SharedAccessGrant) {
        let (tenant_id, target) = (share.tenant_id, share.target_user_id);
        if let Ok(mut rows) = self.shared_grants.write() {
            rows.push(share);
        }
        self.notify(RecordSet::SharedGrants, |w| {
            w.tenant_id == tenant_id && w.user_id == target
        });
    }

    /// Drop every share targeting a user within a tenant.
    pub fn clear_shared_access(&self, tenant_id: TenantId, target_user_id: UserId) {
        if let Ok(mut rows) = self.shared_grants.write() {
            rows.retain(|s| !(s.tenant_id == tenant_id && s.target_user_id == target_user_id));
        }
        self.notify(RecordSet::SharedGrants, |w| {
            w.tenant_id == tenant_id && w.user_id == target_user_id
        });
    }

    fn notify(&self, set: RecordSet, matches: impl Fn(&Watcher) -> bool) {
        let Ok(mut watchers) = self.watchers.lock() else {
            return;
        };
        // Prune watchers whose receiver is gone.
        watchers.retain(|w| !matches(w) || w.sender.send(set).is_ok());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Instrumentation
    // ─────────────────────────────────────────────────────────────────────

    /// Number of full-fetch rounds attempted so far, failed ones included.
    pub fn fetch_rounds(&self) -> u64 {
        self.fetch_rounds.load(Ordering::SeqCst)
    }

    /// Make the next `n` full-fetch rounds fail with [`StoreError::Unavailable`].
    pub fn fail_fetches(&self, n: u32) {
        self.failures_to_inject.store(n, Ordering::SeqCst);
    }

    /// Delay every full-fetch round by `delay` before it reads anything.
    pub fn set_fetch_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.fetch_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Tear down every live subscription, as a dropped backend link would.
    pub fn disconnect_feeds(&self) {
        let Ok(mut watchers) = self.watchers.lock() else {
            return;
        };
        watchers.clear();
    }

    async fn simulate_backend(&self) -> Result<(), StoreError> {
        let delay = self.fetch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let inject = self
            .failures_to_inject
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if inject {
            return Err(StoreError::unavailable("injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn fetch_module_status(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<TenantModuleStatus>, StoreError> {
        let Ok(rows) = self.module_status.read() else {
            return Err(StoreError::query("module status lock poisoned"));
        };
        Ok(rows
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn fetch_user_grants(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Vec<UserPermissionGrant>, StoreError> {
        let Ok(rows) = self.user_grants.read() else {
            return Err(StoreError::query("user grant lock poisoned"));
        };
        Ok(rows
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn fetch_shared_grants(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SharedAccessGrant>, StoreError> {
        let Ok(rows) = self.shared_grants.read() else {
            return Err(StoreError::query("shared grant lock poisoned"));
        };
        Ok(rows
            .iter()
            .filter(|s| {
                s.tenant_id == tenant_id && s.target_user_id == user_id && s.is_active(now)
            })
            .cloned()
            .collect())
    }

    async fn fetch_all(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<GrantSets, StoreError> {
        // Attempts are counted before the outcome is known.
        self.fetch_rounds.fetch_add(1, Ordering::SeqCst);
        self.simulate_backend().await?;

        let module_status = self.fetch_module_status(tenant_id).await?;
        let user_grants = self.fetch_user_grants(tenant_id, user_id).await?;
        let shared_grants = self.fetch_shared_grants(tenant_id, user_id, now).await?;
        Ok(GrantSets {
            module_status,
            user_grants,
            shared_grants,
        })
    }

    async fn subscribe(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<ChangeFeed, StoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let Ok(mut watchers) = self.watchers.lock() else {
            return Err(StoreError::subscription("watcher lock poisoned"));
        };
        watchers.push(Watcher {
            tenant_id,
            user_id,
            sender,
        });
        Ok(ChangeFeed::new(receiver))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use entitle_core::{Action, ActionSet};

    fn grant(tenant_id: TenantId, user_id: UserId, feature: &str) -> UserPermissionGrant {
        UserPermissionGrant {
            tenant_id,
            user_id,
            feature_id: FeatureId::new(feature.to_owned()),
            actions: ActionSet::only(Action::View),
        }
    }

    fn share(
        tenant_id: TenantId,
        target_user_id: UserId,
        feature: &str,
        expires_at: DateTime<Utc>,
    ) -> SharedAccessGrant {
        SharedAccessGrant {
            tenant_id,
            owner_id: UserId::new(),
            target_user_id,
            feature_id: FeatureId::new(feature.to_owned()),
            actions: ActionSet::only(Action::View),
            expires_at,
        }
    }

    #[tokio::test]
    async fn fetch_scopes_rows_to_tenant_and_user() {
        let store = InMemoryGrantStore::new();
        let (tenant_a, tenant_b) = (TenantId::new(), TenantId::new());
        let (alice, bob) = (UserId::new(), UserId::new());
        let now = Utc::now();

        store.set_module_status(tenant_a, ModuleId::new("mod_finance"), ModuleStatus::Included);
        store.set_module_status(tenant_b, ModuleId::new("mod_finance"), ModuleStatus::Disabled);
        store.upsert_user_grant(grant(tenant_a, alice, "finance_cards"));
        store.upsert_user_grant(grant(tenant_a, bob, "finance_cards"));
        store.upsert_user_grant(grant(tenant_b, alice, "finance_cards"));
        store.grant_shared_access(share(
            tenant_a,
            alice,
            "crm_budgets",
            now + ChronoDuration::hours(1),
        ));
        store.grant_shared_access(share(
            tenant_a,
            bob,
            "crm_budgets",
            now + ChronoDuration::hours(1),
        ));

        let sets = store.fetch_all(tenant_a, alice, now).await.unwrap();
        assert_eq!(sets.module_status.len(), 1);
        assert_eq!(sets.module_status[0].tenant_id, tenant_a);
        assert_eq!(sets.user_grants.len(), 1);
        assert_eq!(sets.user_grants[0].user_id, alice);
        assert_eq!(sets.shared_grants.len(), 1);
        assert_eq!(sets.shared_grants[0].target_user_id, alice);
    }

    #[tokio::test]
    async fn expired_shares_are_filtered_at_fetch() {
        let store = InMemoryGrantStore::new();
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let now = Utc::now();

        store.grant_shared_access(share(
            tenant_id,
            user_id,
            "crm_budgets",
            now - ChronoDuration::minutes(5),
        ));
        store.grant_shared_access(share(
            tenant_id,
            user_id,
            "crm_clients",
            now + ChronoDuration::minutes(5),
        ));

        let shares = store
            .fetch_shared_grants(tenant_id, user_id, now)
            .await
            .unwrap();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].feature_id.as_str(), "crm_clients");
    }

    #[tokio::test]
    async fn change_notices_reach_only_matching_scopes() {
        let store = InMemoryGrantStore::new();
        let (tenant_a, tenant_b) = (TenantId::new(), TenantId::new());
        let (alice, bob) = (UserId::new(), UserId::new());

        let mut alice_feed = store.subscribe(tenant_a, alice).await.unwrap();
        let mut bob_feed = store.subscribe(tenant_a, bob).await.unwrap();
        let mut other_feed = store.subscribe(tenant_b, alice).await.unwrap();

        store.set_module_status(tenant_a, ModuleId::new("mod_api"), ModuleStatus::Extra);
        assert_eq!(alice_feed.next().await, Some(RecordSet::ModuleStatus));
        assert_eq!(bob_feed.next().await, Some(RecordSet::ModuleStatus));
        assert_eq!(other_feed.try_next(), None);

        store.upsert_user_grant(grant(tenant_a, alice, "finance_cards"));
        assert_eq!(alice_feed.next().await, Some(RecordSet::UserGrants));
        assert_eq!(bob_feed.try_next(), None);
        assert_eq!(other_feed.try_next(), None);

        store.grant_shared_access(share(
            tenant_a,
            bob,
            "crm_budgets",
            Utc::now() + ChronoDuration::hours(1),
        ));
        assert_eq!(bob_feed.next().await, Some(RecordSet::SharedGrants));
        assert_eq!(alice_feed.try_next(), None);
    }

    #[tokio::test]
    async fn removals_publish_notices_too() {
        let store = InMemoryGrantStore::new();
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let feature = FeatureId::new("finance_cards");

        store.upsert_user_grant(grant(tenant_id, user_id, "finance_cards"));
        let mut feed = store.subscribe(tenant_id, user_id).await.unwrap();

        store.remove_user_grant(tenant_id, user_id, &feature);
        assert_eq!(feed.next().await, Some(RecordSet::UserGrants));

        let grants = store.fetch_user_grants(tenant_id, user_id).await.unwrap();
        assert!(grants.is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_then_recover() {
        let store = InMemoryGrantStore::new();
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let now = Utc::now();

        store.fail_fetches(2);
        assert!(matches!(
            store.fetch_all(tenant_id, user_id, now).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.fetch_all(tenant_id, user_id, now).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.fetch_all(tenant_id, user_id, now).await.is_ok());

        // Failed rounds still count as attempts.
        assert_eq!(store.fetch_rounds(), 3);
    }

    #[tokio::test]
    async fn fetch_delay_holds_back_the_round() {
        let store = InMemoryGrantStore::new();
        store.set_fetch_delay(Duration::from_millis(50));

        let started = tokio::time::Instant::now();
        store
            .fetch_all(TenantId::new(), UserId::new(), Utc::now())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn disconnect_ends_live_feeds() {
        let store = InMemoryGrantStore::new();
        let tenant_id = TenantId::new();
        let user_id = UserId::new();

        let mut feed = store.subscribe(tenant_id, user_id).await.unwrap();
        store.disconnect_feeds();
        assert_eq!(feed.next().await, None);

        // Mutations after the disconnect go nowhere but still apply.
        store.set_module_status(tenant_id, ModuleId::new("mod_tasks"), ModuleStatus::Included);
        let rows = store.fetch_module_status(tenant_id).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned_on_notify() {
        let store = InMemoryGrantStore::new();
        let tenant_id = TenantId::new();
        let user_id = UserId::new();

        let feed = store.subscribe(tenant_id, user_id).await.unwrap();
        drop(feed);

        // Must not error or wedge; the watcher list self-cleans.
        store.set_module_status(tenant_id, ModuleId::new("mod_tasks"), ModuleStatus::Included);
        let watchers = store.watchers.lock().unwrap();
        assert!(watchers.is_empty());
    }
}
