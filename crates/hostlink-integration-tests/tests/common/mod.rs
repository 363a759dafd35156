//! Shared module shapes for integration tests.
//!
//! Each helper plays one kind of module against a shared registry, in the
//! two hooks a host process calls: `on_load` then `on_enable`.

use std::sync::Arc;

use hostlink_registry::{BrokerResult, ProviderId, ProviderRegistry};
use hostlink_test::{MockHost, MockProvider, RecordingListener};

pub const MY_API: &str = "my-api";
pub const ANOTHER_API: &str = "another-api";

pub fn my_api_id() -> ProviderId {
    ProviderId::from_static(MY_API)
}

pub fn another_api_id() -> ProviderId {
    ProviderId::from_static(ANOTHER_API)
}

/// The module that bundles `my-api` and registers it with itself as host.
#[allow(dead_code)]
pub struct Bundler {
    pub host: Arc<MockHost>,
    pub api: Arc<MockProvider>,
}

#[allow(dead_code)]
impl Bundler {
    pub fn new() -> Self {
        Self {
            host: Arc::new(MockHost::new("api-module")),
            api: Arc::new(MockProvider::new(MY_API)),
        }
    }

    pub fn on_load(&self, registry: &ProviderRegistry) -> BrokerResult<()> {
        registry
            .register_api_with_host(self.api.clone(), self.host.clone())
            .map(|_| ())
    }

    pub fn on_enable(&self, registry: &ProviderRegistry) -> BrokerResult<()> {
        registry.init_api(&my_api_id())
    }

    pub fn on_disable(&self, registry: &ProviderRegistry) -> BrokerResult<()> {
        self.host.set_active(false);
        registry.disable_api(&my_api_id())
    }
}

/// A module that only consumes `my-api`.
#[allow(dead_code)]
pub struct Consumer {
    pub host: Arc<MockHost>,
}

#[allow(dead_code)]
impl Consumer {
    pub fn new(name: &str) -> Self {
        Self {
            host: Arc::new(MockHost::new(name)),
        }
    }

    pub fn on_load(&self, registry: &ProviderRegistry) -> BrokerResult<()> {
        registry.require(&my_api_id(), Some(self.host.clone()))
    }

    pub fn on_enable(&self, registry: &ProviderRegistry) -> BrokerResult<()> {
        registry.init_api(&my_api_id())
    }
}

/// A module bundling `another-api`, whose provider depends on `my-api` from
/// inside its own `load` and attaches a listener from `init`.
#[allow(dead_code)]
pub struct Layered {
    pub host: Arc<MockHost>,
    pub api: Arc<MockProvider>,
    pub listener: Arc<RecordingListener>,
}

#[allow(dead_code)]
impl Layered {
    pub fn new() -> Self {
        let listener = Arc::new(RecordingListener::new());
        let for_init = Arc::clone(&listener);
        let api = MockProvider::new(ANOTHER_API)
            .with_load_hook(|registry| registry.require(&my_api_id(), None))
            .with_init_hook(move |registry, id, _host| {
                registry.register_events(id, for_init.clone())
            });
        Self {
            host: Arc::new(MockHost::new("another-module")),
            api: Arc::new(api),
            listener,
        }
    }

    pub fn on_load(&self, registry: &ProviderRegistry) -> BrokerResult<()> {
        registry
            .register_api_with_host(self.api.clone(), self.host.clone())
            .map(|_| ())
    }

    pub fn on_enable(&self, registry: &ProviderRegistry) -> BrokerResult<()> {
        registry.init_api(&my_api_id())?;
        registry.init_api(&another_api_id())
    }
}
