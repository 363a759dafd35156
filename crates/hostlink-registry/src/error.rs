//! Registry error types.

use std::fmt;

use crate::id::{HostId, ProviderId};

/// Provider lifecycle phase, carried by [`BrokerError::ProviderFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// [`Provider::load`](crate::Provider::load).
    Load,
    /// [`Provider::init`](crate::Provider::init).
    Init,
    /// [`Provider::disable`](crate::Provider::disable).
    Disable,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Init => "init",
            Self::Disable => "disable",
        })
    }
}

/// Errors from registry operations.
///
/// Every variant is a contract violation by a collaborating module. Nothing in
/// the registry retries.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// A provider with this id already has a live record.
    #[error("provider already registered: {0}")]
    AlreadyRegistered(ProviderId),

    /// The provider has no live record (and, where applicable, no pending entry).
    #[error("provider not registered: {0}")]
    NotRegistered(ProviderId),

    /// The host is already a member of the provider's host set.
    #[error("host {host} already registered for provider {provider}")]
    AlreadyRegisteredHost {
        /// The provider whose host set was targeted.
        provider: ProviderId,
        /// The duplicate host.
        host: HostId,
    },

    /// Host selection found no fallback hosts at all.
    #[error("provider {0} is not hosting itself and no other hosts have been registered")]
    NoHostAvailable(ProviderId),

    /// Host selection found fallback hosts, but none of them is active.
    #[error("provider {0} is not hosting itself and all registered hosts are inactive")]
    AllHostsInactive(ProviderId),

    /// A pending provider could not be constructed on demand.
    #[error("failed to construct provider {provider}: {message}")]
    ConstructionFailed {
        /// The provider that could not be constructed.
        provider: ProviderId,
        /// Failure reason.
        message: String,
    },

    /// The host also acts as a capability provider.
    #[error("host {host} must not act as a provider (it reports role {role})")]
    InvalidHostRole {
        /// The rejected host.
        host: HostId,
        /// The provider identity the host claims.
        role: ProviderId,
    },

    /// The identity string is malformed.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// The record exists but its `load` phase has not finished.
    #[error("provider {0} is still loading")]
    NotReady(ProviderId),

    /// A provider callback reported failure.
    #[error("provider {provider} failed during {phase}: {message}")]
    ProviderFailed {
        /// The failing provider.
        provider: ProviderId,
        /// The lifecycle phase that failed.
        phase: Phase,
        /// Failure reason.
        message: String,
    },

    /// The registry lock was poisoned by a panicking thread.
    #[error("registry lock poisoned: {0}")]
    LockPoisoned(String),
}

impl BrokerError {
    /// Build a [`BrokerError::ProviderFailed`] from any displayable error.
    pub fn provider_failed(
        provider: &ProviderId,
        phase: Phase,
        message: impl fmt::Display,
    ) -> Self {
        Self::ProviderFailed {
            provider: provider.clone(),
            phase,
            message: message.to_string(),
        }
    }
}

/// Result type for registry operations.
pub type BrokerResult<T> = Result<T, BrokerError>;
