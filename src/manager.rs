//! Tenant Connection Manager
//!
//! Keyed cache of live backend connections: lazy creation with single-flight
//! deduplication, idle-timer eviction, an advisory connection bound, and a
//! draining shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use crate::config::ManagerConfig;
use crate::connector::{BackendConnector, ConnectOptions};
use crate::directory::TenantDirectory;
use crate::error::{TenancyError, TenancyResult};
use crate::tenant::{Tenant, TenantContext, TenantId};

/// Outcome a pending creation broadcasts to every caller waiting on it.
type ConnectOutcome<H> = Option<Result<Arc<H>, TenancyError>>;

/// A live cached connection and its idle bookkeeping. The permit is held
/// only so dropping the entry returns its capacity.
struct CacheEntry<H> {
    handle: Arc<H>,
    timer: JoinHandle<()>,
    epoch: u64,
    last_access: Instant,
    _permit: Option<OwnedSemaphorePermit>,
}

/// State of a tenant's slot in the cache map.
enum Slot<H> {
    /// Live cached connection.
    Ready(CacheEntry<H>),
    /// Creation in flight; the receiver yields the shared outcome.
    Connecting(watch::Receiver<ConnectOutcome<H>>),
}

/// What an acquire decided to do after inspecting the slot map.
enum Plan<H> {
    Wait(watch::Receiver<ConnectOutcome<H>>),
    Create(watch::Sender<ConnectOutcome<H>>),
}

struct Inner<C: BackendConnector> {
    directory: Arc<dyn TenantDirectory>,
    connector: Arc<C>,
    config: ManagerConfig,
    slots: Mutex<HashMap<TenantId, Slot<C::Handle>>>,
    limiter: Option<Arc<Semaphore>>,
    closed: AtomicBool,
    epochs: AtomicU64,
}

/// Clears a pending creation slot if the creating future is dropped before
/// it publishes an outcome, so waiters retry instead of hanging.
struct CreationGuard<'a, C: BackendConnector> {
    inner: &'a Inner<C>,
    id: &'a TenantId,
    armed: bool,
}

impl<C: BackendConnector> CreationGuard<'_, C> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<C: BackendConnector> Drop for CreationGuard<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            let mut slots = self.inner.slots.lock();
            if matches!(slots.get(self.id), Some(Slot::Connecting(_))) {
                slots.remove(self.id);
            }
        }
    }
}

/// Point-in-time snapshot of the cached connections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManagerStats {
    /// Number of live cached connections.
    pub count: usize,

    /// Tenant keys with a live connection, sorted.
    pub keys: Vec<TenantId>,
}

/// Lifecycle manager for per-tenant backend connections.
///
/// The manager resolves tenant metadata through an injected
/// [`TenantDirectory`], opens connections through an injected
/// [`BackendConnector`], caches one live handle per tenant, closes handles
/// after a configurable idle period, and drains everything on shutdown. At
/// most one connection exists per tenant key at any instant, even under
/// concurrent access: concurrent cache misses for the same key share a
/// single connection attempt.
///
/// Cloning is cheap and all clones share the same cache.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tenfold::{DriverKind, ManagerConfig, TenantConnectionManager};
///
/// let manager = TenantConnectionManager::new(
///     Arc::new(registry),
///     Arc::new(PgConnector::new()),
///     ManagerConfig::new(DriverKind::Postgres),
/// )?;
///
/// let pool = manager.acquire("acme").await?;
/// ```
pub struct TenantConnectionManager<C: BackendConnector> {
    inner: Arc<Inner<C>>,
}

impl<C: BackendConnector> Clone for TenantConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: BackendConnector> TenantConnectionManager<C> {
    /// Create a manager with injected collaborators.
    ///
    /// Fails fast with [`TenancyError::Config`] on an invalid configuration
    /// or [`TenancyError::UnsupportedDriver`] if the connector does not
    /// serve the configured driver.
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        connector: Arc<C>,
        config: ManagerConfig,
    ) -> TenancyResult<Self> {
        config.validate()?;
        if !connector.supports(config.driver) {
            return Err(TenancyError::UnsupportedDriver(config.driver));
        }
        let limiter = config
            .max_connections
            .map(|max| Arc::new(Semaphore::new(max)));
        Ok(Self {
            inner: Arc::new(Inner {
                directory,
                connector,
                config,
                slots: Mutex::new(HashMap::new()),
                limiter,
                closed: AtomicBool::new(false),
                epochs: AtomicU64::new(0),
            }),
        })
    }

    /// Get the live connection for a tenant, opening one on first use.
    ///
    /// A cached hit refreshes the idle timer and returns immediately.
    /// Concurrent calls for the same tenant during a miss share one
    /// connection attempt and receive the same handle or the same error.
    /// Failed attempts are never cached, so a later call retries cleanly.
    pub async fn acquire(&self, key: &str) -> TenancyResult<Arc<C::Handle>> {
        let id = TenantId::new(key)?;
        self.acquire_inner(&id, None).await
    }

    /// Get tenant metadata together with its live connection.
    ///
    /// The directory is consulted on every call, so metadata errors (unknown
    /// or deactivated tenants) surface even when a connection is cached, and
    /// take precedence over connection errors. One call makes at most one
    /// directory lookup.
    pub async fn acquire_context(&self, key: &str) -> TenancyResult<TenantContext<C::Handle>> {
        let id = TenantId::new(key)?;
        self.ensure_open()?;
        let tenant = self.lookup(&id).await?;
        let handle = self.acquire_inner(&id, Some(&tenant)).await?;
        Ok(TenantContext::new(tenant, handle))
    }

    /// Remove and close a tenant's cached connection.
    ///
    /// Idempotent: unknown tenants, invalid keys and repeat calls are
    /// no-ops. An in-flight creation for the key is left untouched; the
    /// connection it produces stays cached.
    pub async fn evict(&self, key: &str) {
        let Ok(id) = TenantId::new(key) else {
            return;
        };
        if let Some(entry) = self.inner.take_ready(&id, None) {
            entry.timer.abort();
            debug!(tenant = %id, "evicted connection");
            self.inner.close_entry(&id, entry).await;
        }
    }

    /// Shut the manager down, closing every cached connection.
    ///
    /// Terminal and idempotent: subsequent acquires fail with
    /// [`TenancyError::Closed`], and creations queued on the connection
    /// bound are woken with the same error. Close calls run concurrently,
    /// each bounded by the configured grace period.
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(limiter) = &self.inner.limiter {
            limiter.close();
        }

        let drained: Vec<(TenantId, CacheEntry<C::Handle>)> = {
            let mut slots = self.inner.slots.lock();
            let all = std::mem::take(&mut *slots);
            let mut drained = Vec::new();
            for (id, slot) in all {
                match slot {
                    Slot::Ready(entry) => {
                        entry.timer.abort();
                        drained.push((id, entry));
                    }
                    // In-flight creations observe the closed flag and clean
                    // up after themselves.
                    connecting @ Slot::Connecting(_) => {
                        slots.insert(id, connecting);
                    }
                }
            }
            drained
        };

        let connections = drained.len();
        let grace = self.inner.config.shutdown_grace;
        let closes = drained.into_iter().map(|(id, entry)| {
            let inner = Arc::clone(&self.inner);
            async move {
                match timeout(grace, inner.connector.close(&entry.handle)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        warn!(tenant = %id, error = %err, "failed to close connection during shutdown");
                    }
                    Err(_) => {
                        warn!(tenant = %id, "close timed out during shutdown");
                    }
                }
            }
        });
        join_all(closes).await;
        info!(connections, "connection manager shut down");
    }

    /// Snapshot of live cached connections. In-flight creations are not
    /// counted.
    pub fn stats(&self) -> ManagerStats {
        let slots = self.inner.slots.lock();
        let mut keys: Vec<TenantId> = slots
            .iter()
            .filter_map(|(id, slot)| match slot {
                Slot::Ready(_) => Some(id.clone()),
                Slot::Connecting(_) => None,
            })
            .collect();
        keys.sort();
        ManagerStats {
            count: keys.len(),
            keys,
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// The manager's configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    fn ensure_open(&self) -> TenancyResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(TenancyError::Closed);
        }
        Ok(())
    }

    async fn acquire_inner(
        &self,
        id: &TenantId,
        hint: Option<&Tenant>,
    ) -> TenancyResult<Arc<C::Handle>> {
        self.ensure_open()?;

        if !self.inner.config.caching_enabled {
            return self.open_uncached(id, hint).await;
        }

        loop {
            // Decide under the lock; all waiting happens outside it.
            let plan = {
                let mut slots = self.inner.slots.lock();
                match slots.get_mut(id) {
                    Some(Slot::Ready(entry)) => {
                        Inner::rearm(&self.inner, id, entry);
                        debug!(tenant = %id, "connection cache hit");
                        return Ok(Arc::clone(&entry.handle));
                    }
                    Some(Slot::Connecting(rx)) => Plan::Wait(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        slots.insert(id.clone(), Slot::Connecting(rx));
                        Plan::Create(tx)
                    }
                }
            };

            match plan {
                Plan::Create(tx) => return self.create_entry(id, hint, tx).await,
                Plan::Wait(mut rx) => match Self::wait_for_outcome(&mut rx).await {
                    Some(outcome) => return outcome,
                    None => {
                        // The creator was dropped before publishing. Clear
                        // the dead slot so the next pass can start over.
                        let mut slots = self.inner.slots.lock();
                        let dead = matches!(
                            slots.get(id),
                            Some(Slot::Connecting(cur)) if cur.same_channel(&rx)
                        );
                        if dead {
                            slots.remove(id);
                        }
                    }
                },
            }
        }
    }

    async fn wait_for_outcome(
        rx: &mut watch::Receiver<ConnectOutcome<C::Handle>>,
    ) -> Option<TenancyResult<Arc<C::Handle>>> {
        match rx.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        }
    }

    /// Run the miss path as the single creator for `id` and broadcast the
    /// outcome to every waiter.
    async fn create_entry(
        &self,
        id: &TenantId,
        hint: Option<&Tenant>,
        tx: watch::Sender<ConnectOutcome<C::Handle>>,
    ) -> TenancyResult<Arc<C::Handle>> {
        // `tx` is a parameter, so it outlives the guard: waiters cannot see
        // the channel close before the slot is removed.
        let mut guard = CreationGuard {
            inner: &self.inner,
            id,
            armed: true,
        };

        let outcome = match self.connect(id, hint).await {
            Ok((handle, permit)) => {
                let handle = Arc::new(handle);
                let installed = {
                    let mut slots = self.inner.slots.lock();
                    if self.inner.closed.load(Ordering::SeqCst) {
                        slots.remove(id);
                        false
                    } else {
                        let epoch = self.inner.next_epoch();
                        let timer = Inner::spawn_idle_timer(&self.inner, id.clone(), epoch);
                        slots.insert(
                            id.clone(),
                            Slot::Ready(CacheEntry {
                                handle: Arc::clone(&handle),
                                timer,
                                epoch,
                                last_access: Instant::now(),
                                _permit: permit,
                            }),
                        );
                        true
                    }
                };
                if installed {
                    info!(tenant = %id, "connection established");
                    Ok(handle)
                } else {
                    // Shutdown swept the cache while we were connecting.
                    if let Err(err) = self.inner.connector.close(&handle).await {
                        warn!(
                            tenant = %id,
                            error = %err,
                            "failed to close connection opened during shutdown"
                        );
                    }
                    Err(TenancyError::Closed)
                }
            }
            Err(err) => {
                // Failed attempts are never cached.
                self.inner.slots.lock().remove(id);
                Err(err)
            }
        };

        guard.disarm();
        let _ = tx.send(Some(outcome.clone()));
        outcome
    }

    /// Resolve metadata, reserve capacity, open the connection.
    async fn connect(
        &self,
        id: &TenantId,
        hint: Option<&Tenant>,
    ) -> TenancyResult<(C::Handle, Option<OwnedSemaphorePermit>)> {
        let tenant = match hint {
            Some(tenant) => tenant.clone(),
            None => self.lookup(id).await?,
        };

        let permit = match &self.inner.limiter {
            Some(limiter) => match Arc::clone(limiter).acquire_owned().await {
                Ok(permit) => Some(permit),
                // The semaphore is only ever closed by shutdown.
                Err(_) => return Err(TenancyError::Closed),
            },
            None => None,
        };

        // Shutdown may have raced the capacity wait.
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(TenancyError::Closed);
        }

        let handle = self.open_handle(id, &tenant).await?;
        Ok((handle, permit))
    }

    /// Caching disabled: open a fresh connection for every call.
    async fn open_uncached(
        &self,
        id: &TenantId,
        hint: Option<&Tenant>,
    ) -> TenancyResult<Arc<C::Handle>> {
        let tenant = match hint {
            Some(tenant) => tenant.clone(),
            None => self.lookup(id).await?,
        };
        let handle = self.open_handle(id, &tenant).await?;
        debug!(tenant = %id, "opened uncached connection");
        Ok(Arc::new(handle))
    }

    /// Resolve tenant metadata, surfacing directory failures distinctly
    /// from a missing or deactivated record.
    async fn lookup(&self, id: &TenantId) -> TenancyResult<Tenant> {
        let found = self
            .inner
            .directory
            .find_tenant(id)
            .await
            .map_err(|err| match err {
                TenancyError::NotFound(_)
                | TenancyError::Inactive(_)
                | TenancyError::Directory { .. } => err,
                other => TenancyError::Directory {
                    source: Arc::new(other),
                },
            })?;
        let tenant = found.ok_or_else(|| TenancyError::NotFound(id.clone()))?;
        if !tenant.active {
            return Err(TenancyError::Inactive(id.clone()));
        }
        Ok(tenant)
    }

    async fn open_handle(&self, id: &TenantId, tenant: &Tenant) -> TenancyResult<C::Handle> {
        let options = ConnectOptions {
            driver: self.inner.config.driver,
            connect_timeout: self.inner.config.connect_timeout,
        };
        debug!(tenant = %id, driver = %options.driver, "opening connection");
        self.inner
            .connector
            .open(tenant, &options)
            .await
            .map_err(|err| match err {
                TenancyError::UnsupportedDriver(_) | TenancyError::ConnectionFailed { .. } => err,
                other => TenancyError::ConnectionFailed {
                    tenant: id.clone(),
                    source: Arc::new(other),
                },
            })
    }
}

impl<C: BackendConnector> Inner<C> {
    fn next_epoch(&self) -> u64 {
        self.epochs.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Replace the entry's idle countdown with a fresh one. The caller
    /// holds the slot lock, which is what makes cancel-and-rearm atomic.
    fn rearm(inner: &Arc<Self>, id: &TenantId, entry: &mut CacheEntry<C::Handle>) {
        entry.timer.abort();
        entry.epoch = inner.next_epoch();
        entry.last_access = Instant::now();
        entry.timer = Self::spawn_idle_timer(inner, id.clone(), entry.epoch);
    }

    fn spawn_idle_timer(inner: &Arc<Self>, id: TenantId, epoch: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(inner);
        let idle = inner.config.idle_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            if let Some(inner) = weak.upgrade() {
                inner.evict_idle(&id, epoch).await;
            }
        })
    }

    /// Idle timer body: evict only if the entry still carries the epoch
    /// this timer was armed with, so a countdown the cache already replaced
    /// can never fire.
    async fn evict_idle(&self, id: &TenantId, epoch: u64) {
        if let Some(entry) = self.take_ready(id, Some(epoch)) {
            debug!(
                tenant = %id,
                idle_ms = entry.last_access.elapsed().as_millis() as u64,
                "closing idle connection"
            );
            self.close_entry(id, entry).await;
        }
    }

    /// Remove the live entry for `id`, optionally only when it still
    /// carries `epoch`. In-flight creations are never touched.
    fn take_ready(&self, id: &TenantId, epoch: Option<u64>) -> Option<CacheEntry<C::Handle>> {
        let mut slots = self.slots.lock();
        let should_take = match slots.get(id) {
            Some(Slot::Ready(entry)) => epoch.is_none_or(|e| entry.epoch == e),
            _ => false,
        };
        if !should_take {
            return None;
        }
        match slots.remove(id) {
            Some(Slot::Ready(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Close a removed entry's handle. Close failures are logged, never
    /// propagated. The capacity permit releases when the entry drops.
    async fn close_entry(&self, id: &TenantId, entry: CacheEntry<C::Handle>) {
        if let Err(err) = self.connector.close(&entry.handle).await {
            warn!(tenant = %id, error = %err, "failed to close connection");
        }
    }
}
