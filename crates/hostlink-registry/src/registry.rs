//! Provider registry.
//!
//! Owns every live registration record plus the pending table of identities
//! that were `require`d before anyone registered them. A single mutex guards
//! both tables so moving a pending entry into a new record is atomic with
//! respect to concurrent `require` and `register_api` calls.
//!
//! Provider callbacks, listener attachment and factories always run after the
//! lock is released. The only foreign code called under the lock is
//! [`ExecutionHost::is_active`]. A condition variable paired with the lock
//! wakes `init_api` callers waiting on another thread's `load`.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::error::{BrokerError, BrokerResult};
use crate::host::{EventListener, ExecutionHost, HostHandle, validate_host};
use crate::id::{HostId, ProviderId, RegistrationId};
use crate::provider::{Provider, ProviderFactory, ProviderState, default_factory};
use crate::record::{InitTicket, ProviderSnapshot, RegisteredProvider};

/// Tunables for a [`ProviderRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Whether hosts that are inactive at the moment a pending entry is
    /// drained still join the new record as standing fallbacks.
    ///
    /// When `false` they are dropped at drain time. Activity is checked again
    /// at every selection either way.
    pub drain_inactive_hosts: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            drain_inactive_hosts: true,
        }
    }
}

impl RegistryOptions {
    /// Set [`drain_inactive_hosts`](Self::drain_inactive_hosts).
    #[must_use]
    pub fn with_drain_inactive_hosts(mut self, drain: bool) -> Self {
        self.drain_inactive_hosts = drain;
        self
    }
}

#[cfg(feature = "config")]
impl From<&hostlink_config::RegistrySection> for RegistryOptions {
    fn from(section: &hostlink_config::RegistrySection) -> Self {
        Self {
            drain_inactive_hosts: section.drain_inactive_hosts,
        }
    }
}

/// Hosts waiting on a provider nobody has registered yet.
#[derive(Default)]
struct PendingEntry {
    hosts: IndexMap<HostId, HostHandle>,
    factory: Option<ProviderFactory>,
}

#[derive(Default)]
struct Tables {
    live: HashMap<ProviderId, RegisteredProvider>,
    pending: HashMap<ProviderId, PendingEntry>,
}

/// Process-wide broker between capability providers and execution hosts.
///
/// Construct one and share it (typically behind an `Arc`) with every module
/// that registers or consumes providers. There is no hidden global instance.
pub struct ProviderRegistry {
    tables: Mutex<Tables>,
    /// Signalled whenever a `load` phase finishes, successfully or not.
    load_finished: Condvar,
    options: RegistryOptions,
}

/// Outcome of trying to claim the `init` call for a live record.
enum InitClaim {
    Ticket(InitTicket),
    AlreadyInitialized,
    /// The record went away while we waited for its `load`.
    Vanished,
}

impl ProviderRegistry {
    /// Create an empty registry with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(RegistryOptions::default())
    }

    /// Create an empty registry with the given options.
    #[must_use]
    pub fn with_options(options: RegistryOptions) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            load_finished: Condvar::new(),
            options,
        }
    }

    /// The options this registry was built with.
    #[must_use]
    pub fn options(&self) -> RegistryOptions {
        self.options
    }

    fn lock(&self) -> BrokerResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| BrokerError::LockPoisoned(e.to_string()))
    }

    /// Run a read-only query, yielding `None` if the lock is poisoned.
    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Option<T> {
        self.tables.lock().ok().map(|tables| f(&tables))
    }

    // -----------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------

    /// Register a provider and run its `load` phase.
    ///
    /// Hosts that `require`d this identity before it existed are moved into
    /// the new record under the same lock that creates it.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::AlreadyRegistered`] if the identity has a live
    /// record, or whatever `load` returned (the record is removed again).
    pub fn register_api(&self, provider: Arc<dyn Provider>) -> BrokerResult<RegistrationId> {
        self.register_inner(provider, None, None)
    }

    /// Register a provider together with the module that bundles it.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::InvalidHostRole`] if `host` is itself a
    /// provider, otherwise as [`register_api`](Self::register_api).
    pub fn register_api_with_host(
        &self,
        provider: Arc<dyn Provider>,
        host: HostHandle,
    ) -> BrokerResult<RegistrationId> {
        validate_host(host.as_ref())?;
        self.register_inner(provider, None, Some(host))
    }

    /// Register a provider that is also its own execution host.
    ///
    /// The instance becomes the record's preferred host: host selection
    /// returns it whenever it reports itself active.
    ///
    /// # Errors
    ///
    /// As [`register_api`](Self::register_api).
    pub fn register_self_hosted<P>(&self, provider: Arc<P>) -> BrokerResult<RegistrationId>
    where
        P: Provider + ExecutionHost + 'static,
    {
        let host: HostHandle = Arc::clone(&provider) as HostHandle;
        self.register_inner(provider, Some(host), None)
    }

    fn register_inner(
        &self,
        provider: Arc<dyn Provider>,
        preferred_host: Option<HostHandle>,
        host: Option<HostHandle>,
    ) -> BrokerResult<RegistrationId> {
        let id = provider.id().clone();
        let bundled = host.as_ref().map(|host| host.id().clone());
        let (registration_id, drained) = {
            let mut tables = self.lock()?;
            if tables.live.contains_key(&id) {
                return Err(BrokerError::AlreadyRegistered(id));
            }

            let mut record = RegisteredProvider::new(Arc::clone(&provider), preferred_host);
            let drained = tables.pending.remove(&id);
            if let Some(pending) = &drained {
                self.drain_pending(&mut record, pending);
            }
            if let Some(host) = host {
                attach_once(&mut record, host);
            }

            let registration_id = record.registration_id();
            tables.live.insert(id.clone(), record);
            (registration_id, drained)
        };
        info!(provider_id = %id, registration_id = %registration_id, "Registered provider");

        if let Err(e) = provider.load(self) {
            warn!(provider_id = %id, error = %e, "Provider load failed, rolling back registration");
            self.rollback_registration(&id, registration_id, drained, bundled.as_ref());
            self.load_finished.notify_all();
            return Err(e);
        }

        let loaded = self.lock().map(|mut tables| {
            if let Some(record) = tables.live.get_mut(&id)
                && record.registration_id() == registration_id
            {
                record.mark_loaded();
            }
        });
        self.load_finished.notify_all();
        loaded?;
        Ok(registration_id)
    }

    fn drain_pending(&self, record: &mut RegisteredProvider, pending: &PendingEntry) {
        for (host_id, host) in &pending.hosts {
            if !self.options.drain_inactive_hosts && !host.is_active() {
                debug!(provider_id = %record.id(), host_id = %host_id, "Dropping inactive pending host");
                continue;
            }
            if attach_once(record, Arc::clone(host)) {
                debug!(provider_id = %record.id(), host_id = %host_id, "Moved pending host into registration");
            }
        }
    }

    /// Remove a record whose `load` failed and restore the pending entry it
    /// drained, factory included.
    ///
    /// Hosts that `require`d the provider while it was loading are kept as
    /// well. The host passed to `register_api_with_host` is not.
    fn rollback_registration(
        &self,
        id: &ProviderId,
        registration_id: RegistrationId,
        drained: Option<PendingEntry>,
        bundled: Option<&HostId>,
    ) {
        let Ok(mut tables) = self.lock() else {
            return;
        };
        let is_same_epoch = tables
            .live
            .get(id)
            .is_some_and(|record| record.registration_id() == registration_id);
        if !is_same_epoch {
            return;
        }
        let Some(mut record) = tables.live.remove(id) else {
            return;
        };

        let was_pending = drained.is_some();
        let mut restored = drained.unwrap_or_default();
        for host in record.take_hosts() {
            let host_id = host.id().clone();
            if bundled == Some(&host_id) && !restored.hosts.contains_key(&host_id) {
                continue;
            }
            restored.hosts.entry(host_id).or_insert(host);
        }
        if !was_pending && restored.hosts.is_empty() {
            return;
        }
        tables.pending.insert(id.clone(), restored);
        debug!(provider_id = %id, "Restored pending entry after failed load");
    }

    /// Attach `host` as an additional fallback host of a registered provider.
    ///
    /// # Errors
    ///
    /// [`BrokerError::InvalidHostRole`], [`BrokerError::NotRegistered`] or
    /// [`BrokerError::AlreadyRegisteredHost`].
    pub fn register_api_host(&self, id: &ProviderId, host: HostHandle) -> BrokerResult<()> {
        validate_host(host.as_ref())?;
        let host_id = host.id().clone();
        let mut tables = self.lock()?;
        let record = tables
            .live
            .get_mut(id)
            .ok_or_else(|| BrokerError::NotRegistered(id.clone()))?;
        record.register_host(host)?;
        debug!(provider_id = %id, host_id = %host_id, "Registered host for provider");
        Ok(())
    }

    /// Attach `listener` on behalf of the provider, at most once per record.
    ///
    /// The listener goes to the host selected right now. Later calls are
    /// no-ops even if a different host would be selected.
    ///
    /// # Errors
    ///
    /// [`BrokerError::NotRegistered`] or any host selection error.
    pub fn register_events(
        &self,
        id: &ProviderId,
        listener: Arc<dyn EventListener>,
    ) -> BrokerResult<()> {
        let host = {
            let mut tables = self.lock()?;
            let record = tables
                .live
                .get_mut(id)
                .ok_or_else(|| BrokerError::NotRegistered(id.clone()))?;
            match record.begin_events()? {
                Some(host) => host,
                None => {
                    debug!(provider_id = %id, "Events already registered, skipping");
                    return Ok(());
                },
            }
        };
        host.attach_listener(id, listener);
        debug!(provider_id = %id, host_id = %host.id(), "Attached provider listener");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Dependencies
    // -----------------------------------------------------------------

    /// Declare that `host` depends on the provider `id`.
    ///
    /// If the provider is live, `host` joins its host set right away (a host
    /// that is already a member is left alone). Otherwise `host` is queued
    /// until the provider registers. Pass `None` from inside
    /// [`Provider::load`] to declare a dependency without a host of your own.
    ///
    /// # Errors
    ///
    /// Only [`BrokerError::InvalidHostRole`] (and lock poisoning). A missing
    /// registration is never an error here.
    pub fn require(&self, id: &ProviderId, host: Option<HostHandle>) -> BrokerResult<()> {
        self.require_inner(id, host, None)
    }

    /// Like [`require`](Self::require), also supplying a way to build the
    /// provider if nobody registers it before `init_api`.
    ///
    /// The first factory supplied for an identity wins.
    ///
    /// # Errors
    ///
    /// As [`require`](Self::require).
    pub fn require_with_factory(
        &self,
        id: &ProviderId,
        host: Option<HostHandle>,
        factory: ProviderFactory,
    ) -> BrokerResult<()> {
        self.require_inner(id, host, Some(factory))
    }

    /// Like [`require_with_factory`](Self::require_with_factory), building the
    /// provider from `P::default()`.
    ///
    /// # Errors
    ///
    /// As [`require`](Self::require).
    pub fn require_default<P>(&self, id: &ProviderId, host: Option<HostHandle>) -> BrokerResult<()>
    where
        P: Provider + Default + 'static,
    {
        self.require_inner(id, host, Some(default_factory::<P>()))
    }

    fn require_inner(
        &self,
        id: &ProviderId,
        host: Option<HostHandle>,
        factory: Option<ProviderFactory>,
    ) -> BrokerResult<()> {
        if let Some(host) = &host {
            validate_host(host.as_ref())?;
        }

        let mut tables = self.lock()?;
        if let Some(record) = tables.live.get_mut(id) {
            if let Some(host) = host {
                let host_id = host.id().clone();
                if attach_once(record, host) {
                    debug!(provider_id = %id, host_id = %host_id, "Required provider is live, attached host");
                } else {
                    debug!(provider_id = %id, host_id = %host_id, "Host already attached to provider");
                }
            }
            return Ok(());
        }

        let entry = tables.pending.entry(id.clone()).or_default();
        if let Some(host) = host {
            debug!(provider_id = %id, host_id = %host.id(), "Queued pending host");
            entry.hosts.entry(host.id().clone()).or_insert(host);
        } else {
            debug!(provider_id = %id, "Queued pending dependency without host");
        }
        if entry.factory.is_none() {
            entry.factory = factory;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Run the provider's `init` phase once.
    ///
    /// A pending identity is first built through its factory and registered,
    /// which moves every queued host into the new record. If another thread
    /// is still running the provider's `load`, this waits for it to finish.
    /// Calling this on an initialized provider does nothing.
    ///
    /// # Errors
    ///
    /// [`BrokerError::NotRegistered`] if the identity is neither live nor
    /// pending, [`BrokerError::ConstructionFailed`] if it is pending without a
    /// working factory, [`BrokerError::NotReady`] when called from inside the
    /// provider's own `load`, any host selection error, or whatever `load`
    /// or `init` returned.
    pub fn init_api(&self, id: &ProviderId) -> BrokerResult<()> {
        let ticket = loop {
            self.ensure_live(id)?;
            match self.claim_init(id)? {
                InitClaim::Ticket(ticket) => break ticket,
                InitClaim::AlreadyInitialized => {
                    debug!(provider_id = %id, "Provider already initialized");
                    return Ok(());
                },
                InitClaim::Vanished => {
                    debug!(provider_id = %id, "Provider left the registry during load, retrying");
                },
            }
        };

        info!(
            provider_id = %id,
            host_id = %ticket.host.id(),
            registration_id = %ticket.registration_id,
            "Initializing provider"
        );
        if let Err(e) = ticket.provider.init(self, &ticket.host) {
            warn!(provider_id = %id, error = %e, "Provider init failed");
            if let Ok(mut tables) = self.lock()
                && let Some(record) = tables.live.get_mut(id)
                && record.registration_id() == ticket.registration_id
            {
                record.abort_init();
            }
            return Err(e);
        }
        Ok(())
    }

    /// Claim the `init` call, waiting out a `load` running on another thread.
    fn claim_init(&self, id: &ProviderId) -> BrokerResult<InitClaim> {
        let mut tables = self.lock()?;
        loop {
            let Some(record) = tables.live.get_mut(id) else {
                return Ok(InitClaim::Vanished);
            };
            if record.is_loading_elsewhere() {
                debug!(provider_id = %id, "Waiting for provider load to finish");
                tables = self
                    .load_finished
                    .wait(tables)
                    .map_err(|e| BrokerError::LockPoisoned(e.to_string()))?;
                continue;
            }
            return Ok(match record.begin_init()? {
                Some(ticket) => InitClaim::Ticket(ticket),
                None => InitClaim::AlreadyInitialized,
            });
        }
    }

    /// Make sure `id` has a live record, building it from its pending entry
    /// if needed.
    fn ensure_live(&self, id: &ProviderId) -> BrokerResult<()> {
        let factory = {
            let tables = self.lock()?;
            if tables.live.contains_key(id) {
                return Ok(());
            }
            let Some(entry) = tables.pending.get(id) else {
                return Err(BrokerError::NotRegistered(id.clone()));
            };
            let Some(factory) = entry.factory.clone() else {
                warn!(provider_id = %id, "Pending provider has no factory");
                return Err(BrokerError::ConstructionFailed {
                    provider: id.clone(),
                    message: "no factory was supplied by any pending require".to_string(),
                });
            };
            factory
        };

        let provider = factory().map_err(|e| BrokerError::ConstructionFailed {
            provider: id.clone(),
            message: e.to_string(),
        })?;
        if provider.id() != id {
            return Err(BrokerError::ConstructionFailed {
                provider: id.clone(),
                message: format!("factory built provider {} instead", provider.id()),
            });
        }

        debug!(provider_id = %id, "Constructed pending provider");
        match self.register_inner(provider, None, None) {
            // Lost a race with another registration, which drained the
            // pending hosts itself and may still be loading.
            Ok(_) | Err(BrokerError::AlreadyRegistered(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Run the provider's `disable` phase and drop its record.
    ///
    /// `disable` receives the host `init` ran against, not a freshly selected
    /// one, and is skipped if `init` never ran. Unknown identities are
    /// ignored. Afterwards the identity can be registered again.
    ///
    /// # Errors
    ///
    /// Only lock poisoning. A failing `disable` is logged.
    pub fn disable_api(&self, id: &ProviderId) -> BrokerResult<()> {
        let removed = self.lock()?.live.remove(id);
        let Some(record) = removed else {
            debug!(provider_id = %id, "Disable requested for unregistered provider, ignoring");
            return Ok(());
        };
        disable_record(record);
        Ok(())
    }

    /// Disable and drop every live record.
    ///
    /// Meant for host-process shutdown. Failures are logged without
    /// short-circuiting. Pending entries are kept.
    ///
    /// # Errors
    ///
    /// Only lock poisoning.
    pub fn disable_all(&self) -> BrokerResult<usize> {
        let records: Vec<RegisteredProvider> = {
            let mut tables = self.lock()?;
            tables.live.drain().map(|(_, record)| record).collect()
        };
        let count = records.len();
        for record in records {
            disable_record(record);
        }
        Ok(count)
    }

    /// The host that should run the provider's code right now.
    ///
    /// # Errors
    ///
    /// [`BrokerError::NotRegistered`], [`BrokerError::NoHostAvailable`] or
    /// [`BrokerError::AllHostsInactive`].
    pub fn get_api_host(&self, id: &ProviderId) -> BrokerResult<HostHandle> {
        let tables = self.lock()?;
        tables
            .live
            .get(id)
            .ok_or_else(|| BrokerError::NotRegistered(id.clone()))?
            .next_host()
    }

    // -----------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------

    /// Whether `id` has a live record.
    #[must_use]
    pub fn is_registered(&self, id: &ProviderId) -> bool {
        self.read(|t| t.live.contains_key(id)).unwrap_or(false)
    }

    /// Whether `id` is waiting in the pending table.
    #[must_use]
    pub fn is_pending(&self, id: &ProviderId) -> bool {
        self.read(|t| t.pending.contains_key(id)).unwrap_or(false)
    }

    /// Lifecycle state of a live record.
    #[must_use]
    pub fn state(&self, id: &ProviderId) -> Option<ProviderState> {
        self.read(|t| t.live.get(id).map(RegisteredProvider::state))
            .flatten()
    }

    /// Fallback hosts of a live record, in selection order.
    #[must_use]
    pub fn hosts(&self, id: &ProviderId) -> Option<Vec<HostId>> {
        self.read(|t| t.live.get(id).map(RegisteredProvider::host_ids))
            .flatten()
    }

    /// Hosts queued for a pending identity.
    #[must_use]
    pub fn pending_hosts(&self, id: &ProviderId) -> Option<Vec<HostId>> {
        self.read(|t| {
            t.pending
                .get(id)
                .map(|entry| entry.hosts.keys().cloned().collect())
        })
        .flatten()
    }

    /// Snapshot of a live record.
    #[must_use]
    pub fn snapshot(&self, id: &ProviderId) -> Option<ProviderSnapshot> {
        self.read(|t| t.live.get(id).map(RegisteredProvider::snapshot))
            .flatten()
    }

    /// Snapshots of every live record, sorted by identity.
    #[must_use]
    pub fn snapshots(&self) -> Vec<ProviderSnapshot> {
        let mut snapshots: Vec<ProviderSnapshot> = self
            .read(|t| t.live.values().map(RegisteredProvider::snapshot).collect())
            .unwrap_or_default();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    /// Identities with a live record, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<ProviderId> {
        let mut ids: Vec<ProviderId> = self
            .read(|t| t.live.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Identities waiting in the pending table, sorted.
    #[must_use]
    pub fn pending(&self) -> Vec<ProviderId> {
        let mut ids: Vec<ProviderId> = self
            .read(|t| t.pending.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read(|t| t.live.len()).unwrap_or(0)
    }

    /// Whether there are no live records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Add `host` unless a host with the same id is already present.
///
/// Returns whether the host was added.
fn attach_once(record: &mut RegisteredProvider, host: HostHandle) -> bool {
    if record.contains_host(host.id()) {
        return false;
    }
    record.register_host(host).is_ok()
}

/// Run `disable` for a record that has already left the live table.
fn disable_record(mut record: RegisteredProvider) {
    let id = record.id().clone();
    if let Some(host) = record.begin_disable() {
        if let Err(e) = record.provider().disable(&host) {
            warn!(provider_id = %id, host_id = %host.id(), error = %e, "Provider disable failed");
        }
        info!(provider_id = %id, host_id = %host.id(), "Disabled provider");
    } else {
        info!(provider_id = %id, "Removed provider that was never initialized");
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("provider_count", &self.len())
            .field("provider_ids", &self.list())
            .field("pending_ids", &self.pending())
            .field("options", &self.options)
            .finish()
    }
}
