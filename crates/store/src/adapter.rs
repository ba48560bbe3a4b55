//! Grant-store contract: scoped fetches plus a change subscription.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use entitle_core::{TenantId, UserId};
use entitle_engine::{GrantSets, SharedAccessGrant, TenantModuleStatus, UserPermissionGrant};

/// Grant-store failure.
///
/// A failed fetch must surface as an error, never as an empty result set:
/// empty means "deny everything", and a flaky backend must not read as a
/// revocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but the query failed.
    #[error("query failed: {0}")]
    Query(String),

    /// The change subscription could not be established.
    #[error("subscription failed: {0}")]
    Subscription(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn subscription(msg: impl Into<String>) -> Self {
        Self::Subscription(msg.into())
    }
}

/// Which of the three record sets a change notice refers to.
///
/// Notices carry no row data. The sync layer refetches the whole scope on
/// any notice; the tag exists for logging.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSet {
    ModuleStatus,
    UserGrants,
    SharedGrants,
}

impl core::fmt::Display for RecordSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            RecordSet::ModuleStatus => "module_status",
            RecordSet::UserGrants => "user_grants",
            RecordSet::SharedGrants => "shared_grants",
        };
        f.write_str(s)
    }
}

/// A stream of change notices for one subscribed (tenant, user) scope.
///
/// `None` from [`ChangeFeed::next`] means the subscription is gone; callers
/// fall back to polling.
#[derive(Debug)]
pub struct ChangeFeed {
    receiver: mpsc::UnboundedReceiver<RecordSet>,
}

impl ChangeFeed {
    pub fn new(receiver: mpsc::UnboundedReceiver<RecordSet>) -> Self {
        Self { receiver }
    }

    /// Wait for the next change notice. `None` when disconnected.
    pub async fn next(&mut self) -> Option<RecordSet> {
        self.receiver.recv().await
    }

    /// Drain a pending notice without waiting.
    ///
    /// Returns `None` both when the feed is empty and when it is
    /// disconnected; disconnection is observed through [`ChangeFeed::next`].
    pub fn try_next(&mut self) -> Option<RecordSet> {
        self.receiver.try_recv().ok()
    }
}

/// Read access to grant records for one (tenant, user) scope.
///
/// Implementations translate these calls into their backend's queries. All
/// fetches are scoped at the source: a store never returns another tenant's
/// or user's rows. Handles are injected where they are needed; there is no
/// process-wide store singleton.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Module entitlement records for the tenant.
    async fn fetch_module_status(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<TenantModuleStatus>, StoreError>;

    /// The user's base grants within the tenant.
    async fn fetch_user_grants(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Vec<UserPermissionGrant>, StoreError>;

    /// Shares targeting the user within the tenant.
    ///
    /// Coarse filter: only shares with `expires_at > now` are returned.
    /// Decision time re-checks expiry regardless, so a slightly stale `now`
    /// here costs bandwidth, not correctness.
    async fn fetch_shared_grants(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SharedAccessGrant>, StoreError>;

    /// Fetch all three record sets for the scope.
    async fn fetch_all(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<GrantSets, StoreError> {
        let module_status = self.fetch_module_status(tenant_id).await?;
        let user_grants = self.fetch_user_grants(tenant_id, user_id).await?;
        let shared_grants = self.fetch_shared_grants(tenant_id, user_id, now).await?;
        Ok(GrantSets {
            module_status,
            user_grants,
            shared_grants,
        })
    }

    /// Open a change-notice stream for the scope.
    async fn subscribe(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<ChangeFeed, StoreError>;
}

#[async_trait]
impl<S> GrantStore for Arc<S>
where
    S: GrantStore + ?Sized,
{
    async fn fetch_module_status(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<TenantModuleStatus>, StoreError> {
        (**self).fetch_module_status(tenant_id).await
    }

    async fn fetch_user_grants(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Vec<UserPermissionGrant>, StoreError> {
        (**self).fetch_user_grants(tenant_id, user_id).await
    }

    async fn fetch_shared_grants(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SharedAccessGrant>, StoreError> {
        (**self).fetch_shared_grants(tenant_id, user_id, now).await
    }

    async fn fetch_all(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<GrantSets, StoreError> {
        (**self).fetch_all(tenant_id, user_id, now).await
    }

    async fn subscribe(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<ChangeFeed, StoreError> {
        (**self).subscribe(tenant_id, user_id).await
    }
}
