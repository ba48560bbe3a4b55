//! The session facade: scope lifecycle, background sync, synchronous checks.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use entitle_catalog::PolicyCatalog;
use entitle_core::{Action, FeatureId, ModuleId, TenantId, UserId};
use entitle_engine::{AuthorizationSnapshot, DecisionExplanation, DecisionPolicy};
use entitle_store::GrantStore;

use crate::cell::SnapshotCell;
use crate::options::SyncOptions;
use crate::state::{SyncError, SyncState};

/// The (tenant, user) pair a session synchronizes for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Scope {
    tenant_id: TenantId,
    user_id: UserId,
}

#[derive(Debug)]
struct Worker {
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

/// Keeps one (tenant, user) scope authorized against the grant store.
///
/// The session owns a background worker that loads the scope's grant
/// records, indexes them into an [`AuthorizationSnapshot`], and swaps the
/// snapshot in wholesale on every change. [`AuthorizationSession::can`]
/// reads whatever snapshot is current, synchronously, so it is safe to call
/// from render-hot paths.
///
/// Checks gate UI affordances only. The backend remains the security
/// boundary and re-validates every operation it receives.
pub struct AuthorizationSession {
    store: Arc<dyn GrantStore>,
    catalog: Arc<PolicyCatalog>,
    policy: DecisionPolicy,
    options: SyncOptions,
    cell: Arc<SnapshotCell>,
    scope: Mutex<Option<Scope>>,
    worker: Mutex<Option<Worker>>,
}

impl AuthorizationSession {
    pub fn new(store: Arc<dyn GrantStore>, catalog: Arc<PolicyCatalog>) -> Self {
        Self::with_config(store, catalog, DecisionPolicy::default(), SyncOptions::default())
    }

    pub fn with_config(
        store: Arc<dyn GrantStore>,
        catalog: Arc<PolicyCatalog>,
        policy: DecisionPolicy,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            catalog,
            policy,
            options,
            cell: Arc::new(SnapshotCell::new()),
            scope: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Start (or restart) synchronization for a scope.
    ///
    /// Any previous scope is torn down first: its snapshot stops serving
    /// immediately and results of its in-flight fetches are discarded.
    /// Checks deny until the new scope's first load lands.
    ///
    /// Must be called from within a tokio runtime; the background worker is
    /// spawned onto it.
    pub fn initialize(&self, tenant_id: TenantId, user_id: UserId) {
        self.stop_worker();
        let epoch = self.cell.advance();
        self.cell.reset(SyncState::Loading);

        let scope = Scope { tenant_id, user_id };
        if let Ok(mut current) = self.scope.lock() {
            *current = Some(scope);
        }

        let shutdown = Arc::new(Notify::new());
        let join = tokio::spawn(run_worker(
            Arc::clone(&self.store),
            Arc::clone(&self.cell),
            self.options,
            scope,
            epoch,
            Arc::clone(&shutdown),
        ));
        if let Ok(mut worker) = self.worker.lock() {
            *worker = Some(Worker { shutdown, join });
        }
    }

    /// Resolve whether `action` on `feature_id` within `module_id` is
    /// allowed for the synchronized scope, as of now.
    ///
    /// Synchronous and total: never suspends, never blocks on IO, and denies
    /// whenever no snapshot is loaded. Identifiers the catalog does not know
    /// are logged at debug level; the decision itself is driven by the
    /// stored grant rows, so an identifier with no rows denies.
    pub fn can(&self, module_id: &ModuleId, feature_id: &FeatureId, action: Action) -> bool {
        self.log_unknown_ids(module_id, feature_id);
        let snapshot = self.cell.load();
        entitle_engine::can(&snapshot, self.policy, module_id, feature_id, action, Utc::now())
    }

    /// Like [`AuthorizationSession::can`], with the full verdict for audit
    /// trails and debugging.
    pub fn explain(
        &self,
        module_id: &ModuleId,
        feature_id: &FeatureId,
        action: Action,
    ) -> DecisionExplanation {
        self.log_unknown_ids(module_id, feature_id);
        let snapshot = self.cell.load();
        entitle_engine::explain(&snapshot, self.policy, module_id, feature_id, action, Utc::now())
    }

    /// The snapshot currently serving decisions.
    ///
    /// Read-only; refreshes replace it wholesale rather than mutating it, so
    /// a held `Arc` stays internally consistent for as long as the caller
    /// keeps it.
    pub fn snapshot(&self) -> Arc<AuthorizationSnapshot> {
        self.cell.load()
    }

    pub fn state(&self) -> SyncState {
        self.cell.state()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Register an observer for state transitions. Consecutive duplicate
    /// states are collapsed.
    pub fn watch_state(&self) -> broadcast::Receiver<SyncState> {
        self.cell.watch()
    }

    /// The scope the session is currently synchronizing, if any.
    pub fn scope(&self) -> Option<(TenantId, UserId)> {
        let Ok(scope) = self.scope.lock() else {
            return None;
        };
        scope.map(|s| (s.tenant_id, s.user_id))
    }

    /// Fetch and apply a fresh snapshot for the active scope right now.
    ///
    /// The background worker refreshes on its own; this exists for explicit
    /// "pull to refresh" paths. The session re-enters `Loading` while the
    /// fetch is in flight (previous snapshot retained); the result is
    /// discarded if the scope changes meanwhile.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let Some((scope, epoch)) = self.current_scope() else {
            return Err(SyncError::NotInitialized);
        };

        self.cell.mark(epoch, SyncState::Loading)?;
        match refresh_once(self.store.as_ref(), &self.cell, scope, epoch).await {
            Ok(()) => Ok(()),
            Err(SyncError::Store(e)) => {
                let _ = self.cell.mark(epoch, SyncState::Error);
                Err(SyncError::Store(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Tear the session down: stop the worker, drop the snapshot, deny all.
    ///
    /// Idempotent; disposing a never-initialized session is a no-op. Runs on
    /// drop as well.
    pub fn dispose(&self) {
        self.cell.advance();
        self.stop_worker();
        if let Ok(mut scope) = self.scope.lock() {
            *scope = None;
        }
        self.cell.reset(SyncState::Uninitialized);
    }

    fn current_scope(&self) -> Option<(Scope, u64)> {
        let Ok(scope) = self.scope.lock() else {
            return None;
        };
        scope.map(|s| (s, self.cell.epoch()))
    }

    fn stop_worker(&self) {
        let Ok(mut worker) = self.worker.lock() else {
            return;
        };
        if let Some(worker) = worker.take() {
            worker.shutdown.notify_one();
            worker.join.abort();
        }
    }

    fn log_unknown_ids(&self, module_id: &ModuleId, feature_id: &FeatureId) {
        if !self.catalog.contains_module(module_id) {
            tracing::debug!("Authorization check for unknown module {}", module_id);
        }
        if !self.catalog.contains_feature(feature_id) {
            tracing::debug!("Authorization check for unknown feature {}", feature_id);
        }
    }
}

impl Drop for AuthorizationSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Background worker
// ─────────────────────────────────────────────────────────────────────────────

async fn run_worker(
    store: Arc<dyn GrantStore>,
    cell: Arc<SnapshotCell>,
    options: SyncOptions,
    scope: Scope,
    epoch: u64,
    shutdown: Arc<Notify>,
) {
    tracing::debug!(
        "Sync worker started for tenant {} user {}",
        scope.tenant_id,
        scope.user_id
    );

    // Subscribe before the first fetch so no change slips between them.
    let mut feed = match store.subscribe(scope.tenant_id, scope.user_id).await {
        Ok(feed) => Some(feed),
        Err(e) => {
            tracing::warn!("Change subscription failed, polling instead: {}", e);
            let _ = cell.mark(epoch, SyncState::Error);
            None
        }
    };

    // Initial load, retried until it lands.
    if retry_refresh(store.as_ref(), &cell, scope, epoch, options, &shutdown)
        .await
        .is_break()
    {
        return;
    }

    let mut poll = tokio::time::interval(options.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    poll.tick().await; // the first tick completes immediately

    loop {
        // Taken before the notice future borrows `feed` below.
        let feed_dead = feed.is_none();
        let notice = async {
            match feed.as_mut() {
                Some(feed) => feed.next().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = shutdown.notified() => break,
            notice = notice => match notice {
                Some(set) => {
                    tracing::debug!("Grant records changed ({}), scheduling refresh", set);
                    // Sit out the debounce window, drain whatever else
                    // queued up, then do one refresh for the whole burst.
                    tokio::select! {
                        _ = shutdown.notified() => break,
                        _ = tokio::time::sleep(options.debounce_window) => {}
                    }
                    if let Some(feed) = feed.as_mut() {
                        while feed.try_next().is_some() {}
                    }
                    if retry_refresh(store.as_ref(), &cell, scope, epoch, options, &shutdown)
                        .await
                        .is_break()
                    {
                        return;
                    }
                }
                None => {
                    tracing::warn!(
                        "Change feed for tenant {} dropped, falling back to polling",
                        scope.tenant_id
                    );
                    if cell.mark(epoch, SyncState::Error).is_err() {
                        break;
                    }
                    feed = None;
                }
            },
            _ = poll.tick(), if feed_dead => {
                match refresh_once(store.as_ref(), &cell, scope, epoch).await {
                    Ok(()) => {}
                    Err(SyncError::Store(e)) => {
                        tracing::warn!("Poll refresh failed: {}", e);
                        let _ = cell.mark(epoch, SyncState::Error);
                    }
                    Err(_) => break,
                }
            }
        }
    }

    tracing::debug!("Sync worker stopped for tenant {}", scope.tenant_id);
}

/// One guarded fetch-and-swap round for `scope`.
///
/// On success the snapshot is swapped in and the state is `Ready`. Fails
/// with `Superseded` when `epoch` is no longer current, before or after the
/// fetch.
async fn refresh_once(
    store: &dyn GrantStore,
    cell: &SnapshotCell,
    scope: Scope,
    epoch: u64,
) -> Result<(), SyncError> {
    if cell.epoch() != epoch {
        return Err(SyncError::Superseded);
    }
    let sets = store
        .fetch_all(scope.tenant_id, scope.user_id, Utc::now())
        .await?;
    cell.publish(epoch, AuthorizationSnapshot::index(sets))
}

/// Refresh until it lands, doubling the delay between failed rounds.
///
/// Each round re-enters `Loading` first, so observers can tell a refetch is
/// in flight; the previous snapshot keeps serving decisions throughout.
/// `Break` means the worker must exit: shutdown was requested or the scope
/// was superseded.
async fn retry_refresh(
    store: &dyn GrantStore,
    cell: &SnapshotCell,
    scope: Scope,
    epoch: u64,
    options: SyncOptions,
    shutdown: &Notify,
) -> ControlFlow<()> {
    let mut delay = options.initial_backoff;
    loop {
        if cell.mark(epoch, SyncState::Loading).is_err() {
            return ControlFlow::Break(());
        }
        match refresh_once(store, cell, scope, epoch).await {
            Ok(()) => return ControlFlow::Continue(()),
            Err(SyncError::Store(e)) => {
                tracing::warn!("Grant fetch failed, retrying in {:?}: {}", delay, e);
                if cell.mark(epoch, SyncState::Error).is_err() {
                    return ControlFlow::Break(());
                }
                tokio::select! {
                    _ = shutdown.notified() => return ControlFlow::Break(()),
                    _ = tokio::time::sleep(delay) => {}
                }
                delay = std::cmp::min(delay * 2, options.max_backoff);
            }
            Err(_) => return ControlFlow::Break(()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
