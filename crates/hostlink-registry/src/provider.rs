//! Provider trait and core types.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::BrokerResult;
use crate::host::HostHandle;
use crate::id::ProviderId;
use crate::registry::ProviderRegistry;

/// The lifecycle state of a registered provider.
///
/// `Unregistered` and `Disabled` have no record and therefore no state; an
/// identity in either of them simply has no entry in the live table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderState {
    /// The record exists and `load` is running.
    Loading,
    /// `load` finished; `init` has not run in this epoch.
    Loaded,
    /// `init` ran; `disable` has not.
    Initialized,
}

/// An optional shared capability bundled inside some module.
///
/// The registry drives the three phases:
///
/// 1. [`load`](Self::load) once, synchronously, inside
///    [`ProviderRegistry::register_api`]. Declare dependencies here with
///    [`ProviderRegistry::require`] (passing `None` as host). No host is
///    available yet.
/// 2. [`init`](Self::init) at most once per registration, with the host
///    chosen by host selection when [`ProviderRegistry::init_api`] runs.
/// 3. [`disable`](Self::disable) at most once, with the same host `init`
///    received. Best effort: the host process may drop a module without ever
///    calling [`ProviderRegistry::disable_api`].
///
/// Callbacks are never invoked while the registry lock is held, so they may
/// call back into the registry freely.
pub trait Provider: Send + Sync {
    /// Stable identity of this provider.
    fn id(&self) -> &ProviderId;

    /// First phase, similar to a module's own load hook.
    ///
    /// # Errors
    ///
    /// A failure aborts the registration: the record is removed again.
    fn load(&self, _registry: &ProviderRegistry) -> BrokerResult<()> {
        Ok(())
    }

    /// Second phase. Attach listeners and schedule work against `host`.
    ///
    /// # Errors
    ///
    /// A failure reverts the record to [`ProviderState::Loaded`] so a later
    /// `init_api` can try again.
    fn init(&self, registry: &ProviderRegistry, host: &HostHandle) -> BrokerResult<()>;

    /// Last phase. Release whatever `init` created on `host`.
    ///
    /// # Errors
    ///
    /// Failures are logged; the record is removed regardless.
    fn disable(&self, _host: &HostHandle) -> BrokerResult<()> {
        Ok(())
    }
}

impl fmt::Debug for dyn Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("id", self.id())
            .finish_non_exhaustive()
    }
}

/// Builds a provider on demand for a pending dependency.
///
/// Supplied together with a `require` so that `init_api` can instantiate a
/// provider whose own module never registered it.
pub type ProviderFactory = Arc<dyn Fn() -> BrokerResult<Arc<dyn Provider>> + Send + Sync>;

/// Factory for providers that can be built from their `Default`.
#[must_use]
pub fn default_factory<P>() -> ProviderFactory
where
    P: Provider + Default + 'static,
{
    Arc::new(|| -> BrokerResult<Arc<dyn Provider>> { Ok(Arc::new(P::default())) })
}
