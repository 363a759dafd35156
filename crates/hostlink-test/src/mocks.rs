//! Mock implementations for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hostlink_registry::{
    BrokerError, BrokerResult, EventListener, ExecutionHost, HostEvent, HostHandle, HostId, Phase,
    Provider, ProviderId, ProviderRegistry,
};

/// Lock a mock's mutex, recovering the data if a test thread panicked.
fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock execution host.
///
/// Active by default. Records every listener attached to it and can
/// dispatch events to them.
pub struct MockHost {
    id: HostId,
    active: AtomicBool,
    provider_role: Option<ProviderId>,
    listeners: Mutex<Vec<(ProviderId, Arc<dyn EventListener>)>>,
}

impl MockHost {
    /// Create an active host.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            id: HostId::from_static(id),
            active: AtomicBool::new(true),
            provider_role: None,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Start out inactive.
    #[must_use]
    pub fn inactive(self) -> Self {
        self.active.store(false, Ordering::SeqCst);
        self
    }

    /// Make the host claim it also implements the given provider.
    #[must_use]
    pub fn with_provider_role(mut self, provider: &str) -> Self {
        self.provider_role = Some(ProviderId::from_static(provider));
        self
    }

    /// Enable or disable the host.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Number of listeners attached so far.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        guard(&self.listeners).len()
    }

    /// Owners of the attached listeners, in attachment order.
    #[must_use]
    pub fn listener_owners(&self) -> Vec<ProviderId> {
        guard(&self.listeners)
            .iter()
            .map(|(owner, _)| owner.clone())
            .collect()
    }

    /// Deliver `event` to every attached listener.
    ///
    /// Inactive hosts deliver nothing. Returns the number of listeners called.
    pub fn dispatch(&self, event: &HostEvent) -> usize {
        if !self.is_active() {
            return 0;
        }
        let listeners: Vec<Arc<dyn EventListener>> = guard(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &listeners {
            listener.on_event(event);
        }
        listeners.len()
    }
}

impl ExecutionHost for MockHost {
    fn id(&self) -> &HostId {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn attach_listener(&self, owner: &ProviderId, listener: Arc<dyn EventListener>) {
        guard(&self.listeners).push((owner.clone(), listener));
    }

    fn provider_role(&self) -> Option<&ProviderId> {
        self.provider_role.as_ref()
    }
}

impl std::fmt::Debug for MockHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHost")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("listener_count", &self.listener_count())
            .finish_non_exhaustive()
    }
}

/// A lifecycle callback observed by a [`MockProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCall {
    /// `load` ran.
    Load,
    /// `init` ran against this host.
    Init(HostId),
    /// `disable` ran against this host.
    Disable(HostId),
}

type LoadHook = Box<dyn Fn(&ProviderRegistry) -> BrokerResult<()> + Send + Sync>;
type InitHook =
    Box<dyn Fn(&ProviderRegistry, &ProviderId, &HostHandle) -> BrokerResult<()> + Send + Sync>;

/// Mock capability provider that records its lifecycle.
pub struct MockProvider {
    id: ProviderId,
    calls: Mutex<Vec<LifecycleCall>>,
    load_hook: Option<LoadHook>,
    init_hook: Option<InitHook>,
    fail_init: AtomicBool,
    fail_disable: AtomicBool,
}

impl MockProvider {
    /// Create a provider with no hooks.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            id: ProviderId::from_static(id),
            calls: Mutex::new(Vec::new()),
            load_hook: None,
            init_hook: None,
            fail_init: AtomicBool::new(false),
            fail_disable: AtomicBool::new(false),
        }
    }

    /// Run `hook` from `load`, e.g. to `require` dependencies.
    #[must_use]
    pub fn with_load_hook(
        mut self,
        hook: impl Fn(&ProviderRegistry) -> BrokerResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.load_hook = Some(Box::new(hook));
        self
    }

    /// Run `hook` from `init`, e.g. to register events.
    #[must_use]
    pub fn with_init_hook(
        mut self,
        hook: impl Fn(&ProviderRegistry, &ProviderId, &HostHandle) -> BrokerResult<()>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.init_hook = Some(Box::new(hook));
        self
    }

    /// Make `init` fail until [`set_fail_init`](Self::set_fail_init) clears it.
    #[must_use]
    pub fn failing_init(self) -> Self {
        self.set_fail_init(true);
        self
    }

    /// Toggle `init` failure.
    pub fn set_fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::SeqCst);
    }

    /// Make `disable` report failure.
    #[must_use]
    pub fn failing_disable(self) -> Self {
        self.fail_disable.store(true, Ordering::SeqCst);
        self
    }

    /// The provider's identity.
    #[must_use]
    pub fn provider_id(&self) -> &ProviderId {
        &self.id
    }

    /// Every lifecycle call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<LifecycleCall> {
        guard(&self.calls).clone()
    }

    /// Number of `load` calls.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, LifecycleCall::Load))
            .count()
    }

    /// Hosts `init` ran against.
    #[must_use]
    pub fn init_hosts(&self) -> Vec<HostId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                LifecycleCall::Init(host) => Some(host),
                _ => None,
            })
            .collect()
    }

    /// Hosts `disable` ran against.
    #[must_use]
    pub fn disable_hosts(&self) -> Vec<HostId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                LifecycleCall::Disable(host) => Some(host),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: LifecycleCall) {
        guard(&self.calls).push(call);
    }
}

impl Provider for MockProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn load(&self, registry: &ProviderRegistry) -> BrokerResult<()> {
        self.record(LifecycleCall::Load);
        match &self.load_hook {
            Some(hook) => hook(registry),
            None => Ok(()),
        }
    }

    fn init(&self, registry: &ProviderRegistry, host: &HostHandle) -> BrokerResult<()> {
        self.record(LifecycleCall::Init(host.id().clone()));
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(BrokerError::provider_failed(&self.id, Phase::Init, "mock init failure"));
        }
        match &self.init_hook {
            Some(hook) => hook(registry, &self.id, host),
            None => Ok(()),
        }
    }

    fn disable(&self, host: &HostHandle) -> BrokerResult<()> {
        self.record(LifecycleCall::Disable(host.id().clone()));
        if self.fail_disable.load(Ordering::SeqCst) {
            return Err(BrokerError::provider_failed(
                &self.id,
                Phase::Disable,
                "mock disable failure",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("id", &self.id)
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

/// A provider bundled in a module that can host it directly.
///
/// Implements both [`Provider`] and [`ExecutionHost`]; register it with
/// [`ProviderRegistry::register_self_hosted`].
pub struct MockSelfHosted {
    provider: MockProvider,
    host: MockHost,
}

impl MockSelfHosted {
    /// Create an active self-hosting provider; `id` names both roles.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            provider: MockProvider::new(id),
            host: MockHost::new(id).with_provider_role(id),
        }
    }

    /// The provider half.
    #[must_use]
    pub fn provider(&self) -> &MockProvider {
        &self.provider
    }

    /// The host half.
    #[must_use]
    pub fn host(&self) -> &MockHost {
        &self.host
    }

    /// Enable or disable the bundling module.
    pub fn set_active(&self, active: bool) {
        self.host.set_active(active);
    }
}

impl Provider for MockSelfHosted {
    fn id(&self) -> &ProviderId {
        self.provider.provider_id()
    }

    fn load(&self, registry: &ProviderRegistry) -> BrokerResult<()> {
        self.provider.load(registry)
    }

    fn init(&self, registry: &ProviderRegistry, host: &HostHandle) -> BrokerResult<()> {
        self.provider.init(registry, host)
    }

    fn disable(&self, host: &HostHandle) -> BrokerResult<()> {
        self.provider.disable(host)
    }
}

impl ExecutionHost for MockSelfHosted {
    fn id(&self) -> &HostId {
        ExecutionHost::id(&self.host)
    }

    fn is_active(&self) -> bool {
        self.host.is_active()
    }

    fn attach_listener(&self, owner: &ProviderId, listener: Arc<dyn EventListener>) {
        self.host.attach_listener(owner, listener);
    }

    fn provider_role(&self) -> Option<&ProviderId> {
        self.host.provider_role()
    }
}

/// Listener that records the names of the events it received.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    /// Create an empty listener.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of received events, in order.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        guard(&self.events).clone()
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &HostEvent) {
        guard(&self.events).push(event.name.clone());
    }
}
