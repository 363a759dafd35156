//! Execution host contract and event listener attachment.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, BrokerResult};
use crate::id::{HostId, ProviderId};

/// An event delivered by a host to the listeners attached to it.
///
/// The registry never dispatches events itself; this type only gives hosts
/// and listeners a common vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEvent {
    /// Event name, e.g. `player.join`.
    pub name: String,
    /// Event payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl HostEvent {
    /// Create an event with an empty payload.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: serde_json::Value::Null,
        }
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Receives events from the host it was attached to.
pub trait EventListener: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &HostEvent);
}

/// A module instance able to run code on behalf of a provider.
///
/// The host process owns hosts and decides when they stop running. The
/// registry only keeps shared handles, asks [`is_active`](Self::is_active)
/// at selection time and hands the selected host back to the provider.
pub trait ExecutionHost: Send + Sync {
    /// Identity used for host-set membership.
    fn id(&self) -> &HostId;

    /// Whether the host is currently able to run code.
    ///
    /// Called while the registry lock is held. Implementations must be cheap
    /// and must not call back into the registry.
    fn is_active(&self) -> bool;

    /// Attach an event listener owned by `owner` to this host.
    fn attach_listener(&self, owner: &ProviderId, listener: Arc<dyn EventListener>);

    /// The provider identity this host also implements, if any.
    ///
    /// A host that is itself a provider may only be registered through
    /// [`ProviderRegistry::register_self_hosted`](crate::ProviderRegistry::register_self_hosted).
    /// Every other registration path rejects it.
    fn provider_role(&self) -> Option<&ProviderId> {
        None
    }
}

impl fmt::Debug for dyn ExecutionHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionHost")
            .field("id", self.id())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Shared handle to an execution host.
pub type HostHandle = Arc<dyn ExecutionHost>;

/// Reject hosts that also act as providers.
pub(crate) fn validate_host(host: &dyn ExecutionHost) -> BrokerResult<()> {
    match host.provider_role() {
        Some(role) => Err(BrokerError::InvalidHostRole {
            host: host.id().clone(),
            role: role.clone(),
        }),
        None => Ok(()),
    }
}
