//! Registry lifecycle properties, end to end against the shared mocks.

use std::sync::Arc;

use hostlink_registry::{
    BrokerError, BrokerResult, Provider, ProviderFactory, ProviderRegistry, ProviderState,
};
use hostlink_test::{
    LifecycleCall, MockHost, MockProvider, RecordingListener, init_test_logging, test_host,
    test_host_id, test_inactive_host, test_provider_id,
};

#[test]
fn test_unregistered_identity_fails_everywhere() {
    let registry = ProviderRegistry::new();
    for name in ["my-api", "other-api", "third.api"] {
        let id = test_provider_id(name);
        assert!(matches!(
            registry.init_api(&id),
            Err(BrokerError::NotRegistered(_))
        ));
        assert!(matches!(
            registry.get_api_host(&id),
            Err(BrokerError::NotRegistered(_))
        ));
    }
}

#[test]
fn test_duplicate_registration_leaves_first_intact() {
    let registry = ProviderRegistry::new();
    let first = Arc::new(MockProvider::new("my-api"));
    registry
        .register_api_with_host(first.clone(), test_host("bundler"))
        .unwrap();

    let err = registry.register_api(first.clone()).unwrap_err();
    assert!(matches!(err, BrokerError::AlreadyRegistered(ref id) if id.as_str() == "my-api"));

    assert_eq!(first.load_count(), 1);
    assert_eq!(
        registry.hosts(&test_provider_id("my-api")).unwrap(),
        vec![test_host_id("bundler")]
    );
}

#[test]
fn test_require_before_register_then_init() {
    init_test_logging();
    let registry = ProviderRegistry::new();
    let id = test_provider_id("my-api");
    let host_a = test_host("host-a");

    registry.require(&id, Some(host_a)).unwrap();
    let api = Arc::new(MockProvider::new("my-api"));
    registry.register_api(api.clone()).unwrap();
    registry.init_api(&id).unwrap();

    assert!(registry.hosts(&id).unwrap().contains(&test_host_id("host-a")));
    assert_eq!(api.init_hosts(), vec![test_host_id("host-a")]);
}

#[test]
fn test_register_events_attaches_once() {
    let registry = ProviderRegistry::new();
    let id = test_provider_id("my-api");
    let host = test_host("bundler");
    registry
        .register_api_with_host(Arc::new(MockProvider::new("my-api")), host.clone())
        .unwrap();

    let listener = Arc::new(RecordingListener::new());
    registry.register_events(&id, listener.clone()).unwrap();
    registry.register_events(&id, listener.clone()).unwrap();

    assert_eq!(host.listener_count(), 1);
    assert!(registry.snapshot(&id).unwrap().events_registered);
}

#[test]
fn test_register_events_without_host_can_retry() {
    let registry = ProviderRegistry::new();
    let id = test_provider_id("my-api");
    registry
        .register_api(Arc::new(MockProvider::new("my-api")))
        .unwrap();

    let listener = Arc::new(RecordingListener::new());
    assert!(matches!(
        registry.register_events(&id, listener.clone()),
        Err(BrokerError::NoHostAvailable(_))
    ));

    let host = test_host("late");
    registry.register_api_host(&id, host.clone()).unwrap();
    registry.register_events(&id, listener).unwrap();
    assert_eq!(host.listener_count(), 1);
}

#[test]
fn test_all_hosts_inactive_vs_no_host() {
    let registry = ProviderRegistry::new();
    let id = test_provider_id("my-api");
    registry
        .register_api(Arc::new(MockProvider::new("my-api")))
        .unwrap();
    assert!(matches!(
        registry.init_api(&id),
        Err(BrokerError::NoHostAvailable(_))
    ));

    registry
        .register_api_host(&id, test_inactive_host("sleeping"))
        .unwrap();
    assert!(matches!(
        registry.init_api(&id),
        Err(BrokerError::AllHostsInactive(_))
    ));
    assert_eq!(registry.state(&id), Some(ProviderState::Loaded));
}

#[test]
fn test_disable_unknown_is_silent() {
    let registry = ProviderRegistry::new();
    registry.disable_api(&test_provider_id("ghost")).unwrap();
    assert!(registry.is_empty());
}

#[test]
fn test_disable_uses_init_host_after_selection_changes() {
    let registry = ProviderRegistry::new();
    let id = test_provider_id("my-api");
    let first = test_host("first");
    let second = test_host("second");
    let api = Arc::new(MockProvider::new("my-api"));
    registry.register_api_with_host(api.clone(), first.clone()).unwrap();
    registry.register_api_host(&id, second).unwrap();

    registry.init_api(&id).unwrap();
    first.set_active(false);
    assert_eq!(registry.get_api_host(&id).unwrap().id(), &test_host_id("second"));

    registry.disable_api(&id).unwrap();
    assert_eq!(
        api.calls(),
        vec![
            LifecycleCall::Load,
            LifecycleCall::Init(test_host_id("first")),
            LifecycleCall::Disable(test_host_id("first")),
        ]
    );
}

#[test]
fn test_register_disable_register_round_trip() {
    let registry = ProviderRegistry::new();
    let id = test_provider_id("my-api");

    let first = registry
        .register_api(Arc::new(MockProvider::new("my-api")))
        .unwrap();
    registry.disable_api(&id).unwrap();
    let second = registry
        .register_api(Arc::new(MockProvider::new("my-api")))
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(registry.snapshot(&id).unwrap().registration_id, second);
}

#[test]
fn test_failed_init_can_be_retried() {
    let registry = ProviderRegistry::new();
    let id = test_provider_id("my-api");
    let api = Arc::new(MockProvider::new("my-api").failing_init());
    registry
        .register_api_with_host(api.clone(), test_host("bundler"))
        .unwrap();

    let err = registry.init_api(&id).unwrap_err();
    assert!(matches!(err, BrokerError::ProviderFailed { .. }));
    assert_eq!(registry.state(&id), Some(ProviderState::Loaded));

    api.set_fail_init(false);
    registry.init_api(&id).unwrap();
    assert_eq!(api.init_hosts().len(), 2);
    assert_eq!(registry.state(&id), Some(ProviderState::Initialized));
}

#[test]
fn test_failing_disable_still_removes_record() {
    let registry = ProviderRegistry::new();
    let id = test_provider_id("my-api");
    let api = Arc::new(MockProvider::new("my-api").failing_disable());
    registry
        .register_api_with_host(api.clone(), test_host("bundler"))
        .unwrap();
    registry.init_api(&id).unwrap();

    registry.disable_api(&id).unwrap();
    assert!(!registry.is_registered(&id));
    assert_eq!(api.disable_hosts(), vec![test_host_id("bundler")]);
}

#[test]
fn test_lazy_construction_from_factory() {
    init_test_logging();
    let registry = ProviderRegistry::new();
    let id = test_provider_id("my-api");
    let built = Arc::new(MockProvider::new("my-api"));
    let handed_out = Arc::clone(&built);
    let factory: ProviderFactory = Arc::new(move || -> BrokerResult<Arc<dyn Provider>> {
        Ok(handed_out.clone())
    });

    registry
        .require_with_factory(&id, Some(test_host("consumer")), factory)
        .unwrap();
    registry.require(&id, Some(test_host("second-consumer"))).unwrap();
    assert!(!registry.is_registered(&id));

    registry.init_api(&id).unwrap();
    assert!(!registry.is_pending(&id));
    assert_eq!(
        registry.hosts(&id).unwrap(),
        vec![test_host_id("consumer"), test_host_id("second-consumer")]
    );
    assert_eq!(
        built.calls(),
        vec![LifecycleCall::Load, LifecycleCall::Init(test_host_id("consumer"))]
    );
}

#[test]
fn test_load_can_require_its_own_dependencies() {
    let registry = ProviderRegistry::new();
    let dependency = test_provider_id("base-api");
    let api = MockProvider::new("top-api").with_load_hook(|registry| {
        registry.require(&test_provider_id("base-api"), None)
    });
    registry
        .register_api_with_host(Arc::new(api), test_host("top-module"))
        .unwrap();

    assert!(registry.is_pending(&dependency));
    assert_eq!(registry.pending(), vec![dependency]);
}

#[test]
fn test_snapshot_serializes() {
    let registry = ProviderRegistry::new();
    let id = test_provider_id("my-api");
    registry
        .register_api_with_host(
            Arc::new(MockProvider::new("my-api")),
            Arc::new(MockHost::new("bundler")),
        )
        .unwrap();
    registry.init_api(&id).unwrap();

    let json = serde_json::to_value(registry.snapshot(&id).unwrap()).unwrap();
    assert_eq!(json["id"], "my-api");
    assert_eq!(json["state"], "initialized");
    assert_eq!(json["initializing_host"], "bundler");
    assert_eq!(json["hosts"], serde_json::json!(["bundler"]));
}
