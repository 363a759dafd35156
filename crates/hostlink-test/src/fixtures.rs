//! Test fixtures for common types.

use std::sync::Arc;

use hostlink_registry::{HostId, ProviderId};

use crate::mocks::MockHost;

/// Create a provider id without validation.
#[must_use]
pub fn test_provider_id(id: &str) -> ProviderId {
    ProviderId::from_static(id)
}

/// Create a host id without validation.
#[must_use]
pub fn test_host_id(id: &str) -> HostId {
    HostId::from_static(id)
}

/// Create an active mock host behind an `Arc`.
#[must_use]
pub fn test_host(id: &str) -> Arc<MockHost> {
    Arc::new(MockHost::new(id))
}

/// Create an inactive mock host behind an `Arc`.
#[must_use]
pub fn test_inactive_host(id: &str) -> Arc<MockHost> {
    Arc::new(MockHost::new(id).inactive())
}
