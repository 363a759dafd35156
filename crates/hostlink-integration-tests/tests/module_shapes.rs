//! Load-order independence across the three module shapes.
//!
//! A bundling module, a consumer and a module whose provider depends on the
//! first provider are loaded and enabled in different orders. Every order
//! must end with `my-api` initialized exactly once on an active host.

mod common;

use common::{Bundler, Consumer, Layered, another_api_id, my_api_id};
use hostlink_registry::{HostEvent, HostId, ProviderRegistry, ProviderState};
use hostlink_test::init_test_logging;

#[test]
fn test_consumer_loads_before_bundler() {
    init_test_logging();
    let registry = ProviderRegistry::new();
    let consumer = Consumer::new("consumer");
    let bundler = Bundler::new();

    consumer.on_load(&registry).unwrap();
    assert!(registry.is_pending(&my_api_id()));

    bundler.on_load(&registry).unwrap();
    assert!(!registry.is_pending(&my_api_id()));
    assert_eq!(
        registry.hosts(&my_api_id()).unwrap(),
        vec![HostId::from_static("consumer"), HostId::from_static("api-module")]
    );

    consumer.on_enable(&registry).unwrap();
    bundler.on_enable(&registry).unwrap();
    assert_eq!(bundler.api.init_hosts().len(), 1);
    assert_eq!(
        registry.state(&my_api_id()),
        Some(ProviderState::Initialized)
    );
}

#[test]
fn test_bundler_loads_before_consumer() {
    init_test_logging();
    let registry = ProviderRegistry::new();
    let consumer = Consumer::new("consumer");
    let bundler = Bundler::new();

    bundler.on_load(&registry).unwrap();
    consumer.on_load(&registry).unwrap();
    assert!(!registry.is_pending(&my_api_id()));

    bundler.on_enable(&registry).unwrap();
    consumer.on_enable(&registry).unwrap();
    assert_eq!(
        bundler.api.init_hosts(),
        vec![HostId::from_static("api-module")]
    );
}

#[test]
fn test_bundler_disabled_consumer_keeps_running_code() {
    init_test_logging();
    let registry = ProviderRegistry::new();
    let consumer = Consumer::new("consumer");
    let bundler = Bundler::new();

    bundler.on_load(&registry).unwrap();
    consumer.on_load(&registry).unwrap();
    bundler.host.set_active(false);

    consumer.on_enable(&registry).unwrap();
    assert_eq!(bundler.api.init_hosts(), vec![HostId::from_static("consumer")]);
    assert_eq!(
        registry.get_api_host(&my_api_id()).unwrap().id(),
        &HostId::from_static("consumer")
    );
}

#[test]
fn test_layered_dependency_any_order() {
    init_test_logging();
    let registry = ProviderRegistry::new();
    let layered = Layered::new();
    let bundler = Bundler::new();

    // another-api's load requires my-api before the bundler exists.
    layered.on_load(&registry).unwrap();
    assert!(registry.is_pending(&my_api_id()));
    assert!(registry.pending_hosts(&my_api_id()).unwrap().is_empty());

    bundler.on_load(&registry).unwrap();
    bundler.on_enable(&registry).unwrap();
    layered.on_enable(&registry).unwrap();

    assert_eq!(bundler.api.init_hosts().len(), 1);
    assert_eq!(
        layered.api.init_hosts(),
        vec![HostId::from_static("another-module")]
    );
    assert_eq!(
        registry.state(&another_api_id()),
        Some(ProviderState::Initialized)
    );

    // The init hook attached a listener to another-api's host.
    assert_eq!(layered.host.listener_owners(), vec![another_api_id()]);
    layered.host.dispatch(&HostEvent::new("module.enable"));
    assert_eq!(layered.listener.events(), vec!["module.enable".to_string()]);
}

#[test]
fn test_full_shutdown_and_reload() {
    init_test_logging();
    let registry = ProviderRegistry::new();
    let bundler = Bundler::new();

    bundler.on_load(&registry).unwrap();
    bundler.on_enable(&registry).unwrap();
    bundler.on_disable(&registry).unwrap();
    assert!(!registry.is_registered(&my_api_id()));
    assert_eq!(
        bundler.api.disable_hosts(),
        vec![HostId::from_static("api-module")]
    );

    // The host process reloads the module.
    let reloaded = Bundler::new();
    reloaded.on_load(&registry).unwrap();
    reloaded.on_enable(&registry).unwrap();
    assert_eq!(reloaded.api.init_hosts().len(), 1);
}
