//! Prelude module - commonly used types for convenient import.
//!
//! Use `use hostlink_registry::prelude::*;` to import all essential types.

// Errors
pub use crate::{BrokerError, BrokerResult, Phase};

// Identities
pub use crate::{HostId, ProviderId, RegistrationId};

// Contracts
pub use crate::{EventListener, ExecutionHost, HostEvent, HostHandle};
pub use crate::{Provider, ProviderFactory, ProviderState, default_factory};

// Registry
pub use crate::{ProviderRegistry, ProviderSnapshot, RegistryOptions};
