//! Registration record and host selection.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, BrokerResult};
use crate::host::HostHandle;
use crate::id::{HostId, ProviderId, RegistrationId};
use crate::provider::{Provider, ProviderState};

/// Point-in-time view of one registration, safe to hand out of the lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    /// Provider identity.
    pub id: ProviderId,
    /// Registration epoch.
    pub registration_id: RegistrationId,
    /// Lifecycle state.
    pub state: ProviderState,
    /// The provider's own host when it hosts itself.
    pub preferred_host: Option<HostId>,
    /// Fallback hosts in selection order.
    pub hosts: Vec<HostId>,
    /// Host that `init` ran against, if initialized.
    pub initializing_host: Option<HostId>,
    /// Whether the provider's listener has been attached.
    pub events_registered: bool,
    /// When the record was created.
    pub registered_at: DateTime<Utc>,
}

/// Everything `init` needs once the lock is released.
pub(crate) struct InitTicket {
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) host: HostHandle,
    pub(crate) registration_id: RegistrationId,
}

/// One provider's live registration.
pub(crate) struct RegisteredProvider {
    registration_id: RegistrationId,
    provider: Arc<dyn Provider>,
    preferred_host: Option<HostHandle>,
    hosts: IndexMap<HostId, HostHandle>,
    state: ProviderState,
    initializing_host: Option<HostHandle>,
    events_registered: bool,
    registered_at: DateTime<Utc>,
    loader: ThreadId,
}

impl RegisteredProvider {
    /// Create a record in the [`ProviderState::Loading`] state, owned by the
    /// calling thread until `load` finishes.
    pub(crate) fn new(provider: Arc<dyn Provider>, preferred_host: Option<HostHandle>) -> Self {
        Self {
            registration_id: RegistrationId::new(),
            provider,
            preferred_host,
            hosts: IndexMap::new(),
            state: ProviderState::Loading,
            initializing_host: None,
            events_registered: false,
            registered_at: Utc::now(),
            loader: thread::current().id(),
        }
    }

    pub(crate) fn id(&self) -> &ProviderId {
        self.provider.id()
    }

    pub(crate) fn registration_id(&self) -> RegistrationId {
        self.registration_id
    }

    pub(crate) fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub(crate) fn state(&self) -> ProviderState {
        self.state
    }

    /// Whether `load` is still running on some other thread.
    pub(crate) fn is_loading_elsewhere(&self) -> bool {
        self.state == ProviderState::Loading && self.loader != thread::current().id()
    }

    pub(crate) fn mark_loaded(&mut self) {
        if self.state == ProviderState::Loading {
            self.state = ProviderState::Loaded;
        }
    }

    pub(crate) fn contains_host(&self, host: &HostId) -> bool {
        self.hosts.contains_key(host)
    }

    pub(crate) fn host_ids(&self) -> Vec<HostId> {
        self.hosts.keys().cloned().collect()
    }

    /// Move the fallback hosts out, leaving the set empty.
    pub(crate) fn take_hosts(&mut self) -> Vec<HostHandle> {
        self.hosts.drain(..).map(|(_, host)| host).collect()
    }

    /// Add a fallback host.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::AlreadyRegisteredHost`] if the host is already a member.
    pub(crate) fn register_host(&mut self, host: HostHandle) -> BrokerResult<()> {
        let host_id = host.id().clone();
        if self.hosts.contains_key(&host_id) {
            return Err(BrokerError::AlreadyRegisteredHost {
                provider: self.id().clone(),
                host: host_id,
            });
        }
        self.hosts.insert(host_id, host);
        Ok(())
    }

    /// Select the host that should run the provider's code right now.
    ///
    /// The provider's own host wins whenever it is active. Otherwise the first
    /// active fallback host in insertion order is used. Recomputed on every
    /// call because host activity changes between calls.
    ///
    /// # Errors
    ///
    /// [`BrokerError::NoHostAvailable`] when no fallback host was ever added,
    /// [`BrokerError::AllHostsInactive`] when fallbacks exist but none is active.
    pub(crate) fn next_host(&self) -> BrokerResult<HostHandle> {
        if let Some(own) = &self.preferred_host
            && own.is_active()
        {
            return Ok(Arc::clone(own));
        }
        if self.hosts.is_empty() {
            return Err(BrokerError::NoHostAvailable(self.id().clone()));
        }
        self.hosts
            .values()
            .find(|host| host.is_active())
            .map(Arc::clone)
            .ok_or_else(|| BrokerError::AllHostsInactive(self.id().clone()))
    }

    /// Claim the `init` call for this epoch.
    ///
    /// Returns `Ok(None)` if the provider is already initialized. On success
    /// the record is marked initialized before `init` actually runs, which
    /// keeps concurrent `init_api` calls from running `init` twice.
    ///
    /// # Errors
    ///
    /// [`BrokerError::NotReady`] while loading, or any host selection error.
    pub(crate) fn begin_init(&mut self) -> BrokerResult<Option<InitTicket>> {
        match self.state {
            ProviderState::Initialized => Ok(None),
            ProviderState::Loading => Err(BrokerError::NotReady(self.id().clone())),
            ProviderState::Loaded => {
                let host = self.next_host()?;
                self.state = ProviderState::Initialized;
                self.initializing_host = Some(Arc::clone(&host));
                Ok(Some(InitTicket {
                    provider: Arc::clone(&self.provider),
                    host,
                    registration_id: self.registration_id,
                }))
            },
        }
    }

    /// Undo [`begin_init`](Self::begin_init) after `init` failed.
    pub(crate) fn abort_init(&mut self) {
        if self.state == ProviderState::Initialized {
            self.state = ProviderState::Loaded;
            self.initializing_host = None;
        }
    }

    /// Claim the `disable` call, returning the host `init` ran against.
    ///
    /// Returns `None` if `init` never ran in this epoch.
    pub(crate) fn begin_disable(&mut self) -> Option<HostHandle> {
        if self.state != ProviderState::Initialized {
            return None;
        }
        self.state = ProviderState::Loaded;
        self.initializing_host.take()
    }

    /// Claim the one-time listener attachment.
    ///
    /// Returns `Ok(None)` if a listener was already attached.
    ///
    /// # Errors
    ///
    /// Any host selection error; the flag stays unset in that case.
    pub(crate) fn begin_events(&mut self) -> BrokerResult<Option<HostHandle>> {
        if self.events_registered {
            return Ok(None);
        }
        let host = self.next_host()?;
        self.events_registered = true;
        Ok(Some(host))
    }

    pub(crate) fn snapshot(&self) -> ProviderSnapshot {
        ProviderSnapshot {
            id: self.id().clone(),
            registration_id: self.registration_id,
            state: self.state,
            preferred_host: self.preferred_host.as_ref().map(|h| h.id().clone()),
            hosts: self.host_ids(),
            initializing_host: self.initializing_host.as_ref().map(|h| h.id().clone()),
            events_registered: self.events_registered,
            registered_at: self.registered_at,
        }
    }
}
