//! Service locator + capability synchronisation against scripted mDNS and
//! HTTP mocks.

use espcontrol::config::RemoteConfig;
use espcontrol::devices::{CommandBounds, InputKind, SensorRange};
use espcontrol::discovery::ServiceLocator;
use espcontrol::dispatch::{Registry, RemoteDevice};
use espcontrol::error::TransportError;

use crate::mock_hw::{RecordingSink, ScriptedDiscovery, ScriptedTransport, answer};

const CONFIG_BODY: &str = r#"{"name":"Controller1","rate":500,"devices":[
    {"name":"Stepper1","type":"stepper","command_min":-511,"command_max":512},
    {"name":"Led1","type":"led"}]}"#;

fn locator() -> ServiceLocator {
    ServiceLocator::new("ESPControl", "tcp")
}

fn pot_device(cfg: &RemoteConfig) -> RemoteDevice {
    RemoteDevice::new(
        "Pot1",
        "Controller1",
        "Stepper1",
        InputKind::Pot {
            range: SensorRange::new(0, 1024),
            directed: false,
        },
        cfg,
    )
    .unwrap()
}

#[test]
fn pass_resolves_and_configures() {
    let cfg = RemoteConfig::default();
    let mut registry = Registry::new();
    registry.add(pot_device(&cfg)).unwrap();

    let mut discovery =
        ScriptedDiscovery::new().with_pass(vec![answer("Controller1.local", [192, 168, 1, 42], 80)]);
    let mut transport = ScriptedTransport::new().with_ok(200, CONFIG_BODY);
    let mut sink = RecordingSink::new();
    let mut locator = locator();

    assert_eq!(
        locator.pass(&mut registry, &mut discovery, &mut transport, &mut sink),
        1
    );
    assert_eq!(discovery.queries, vec![("ESPControl".into(), "tcp".into())]);
    assert_eq!(
        transport.requests,
        vec!["http://192.168.1.42:80/api/config".to_string()]
    );

    let dev = registry.get("Pot1").unwrap();
    assert!(dev.channel.host_available);
    assert_eq!(dev.channel.bounds, CommandBounds::new(-511, 512));
    assert_eq!(dev.channel.host_rate_ms, 500);
    let endpoint = dev.channel.endpoint.unwrap();
    assert_eq!(endpoint.port, 80);
    assert_eq!(registry.pending_discovery_count(), 0);
}

#[test]
fn matching_is_exact_and_case_sensitive() {
    let cfg = RemoteConfig::default();
    let mut registry = Registry::new();
    registry.add(pot_device(&cfg)).unwrap();

    let mut discovery = ScriptedDiscovery::new().with_pass(vec![
        answer("controller1.local", [10, 0, 0, 1], 80),
        answer("Controller1", [10, 0, 0, 2], 80),
        answer("Controller10.local", [10, 0, 0, 3], 80),
    ]);
    let mut transport = ScriptedTransport::new();
    let mut sink = RecordingSink::new();

    assert_eq!(
        locator().pass(&mut registry, &mut discovery, &mut transport, &mut sink),
        0
    );
    // Nothing matched, so no capability fetch was attempted either.
    assert!(transport.requests.is_empty());
    assert!(!registry.get("Pot1").unwrap().channel.host_available);
}

#[test]
fn empty_pass_is_a_miss_not_an_error() {
    let cfg = RemoteConfig::default();
    let mut registry = Registry::new();
    registry.add(pot_device(&cfg)).unwrap();

    let mut discovery = ScriptedDiscovery::new().with_pass(vec![]);
    let mut transport = ScriptedTransport::new();
    let mut sink = RecordingSink::new();
    let mut locator = locator();

    assert_eq!(
        locator.pass(&mut registry, &mut discovery, &mut transport, &mut sink),
        0
    );
    assert_eq!(registry.pending_discovery_count(), 1);
    // The retry delay applies from the second pass on.
    assert_eq!(locator.pre_pass_delay_ms(3000), 3000);
}

#[test]
fn first_pass_of_an_episode_skips_the_delay() {
    let locator = locator();
    assert_eq!(locator.pre_pass_delay_ms(3000), 0);
}

#[test]
fn multiple_hosts_resolve_incrementally() {
    let cfg = RemoteConfig::default();
    let mut registry = Registry::new();
    registry.add(pot_device(&cfg)).unwrap();
    registry
        .add(RemoteDevice::new("Switch1", "Controller2", "Led1", InputKind::Toggle, &cfg).unwrap())
        .unwrap();

    // First pass only answers Controller1.
    let mut discovery =
        ScriptedDiscovery::new().with_pass(vec![answer("Controller1.local", [10, 0, 0, 1], 80)]);
    let mut transport = ScriptedTransport::new().with_ok(200, CONFIG_BODY);
    let mut sink = RecordingSink::new();
    let mut locator = locator();

    assert_eq!(
        locator.pass(&mut registry, &mut discovery, &mut transport, &mut sink),
        1
    );
    assert!(registry.get("Pot1").unwrap().channel.host_available);
    assert!(!registry.get("Switch1").unwrap().channel.host_available);
    assert_eq!(registry.pending_discovery_count(), 1);

    // Second pass answers Controller2; the already-resolved device is not
    // re-fetched.
    let mut discovery =
        ScriptedDiscovery::new().with_pass(vec![answer("Controller2.local", [10, 0, 0, 2], 80)]);
    let mut transport = ScriptedTransport::new().with_ok(200, CONFIG_BODY);

    assert_eq!(
        locator.pass(&mut registry, &mut discovery, &mut transport, &mut sink),
        1
    );
    assert_eq!(
        transport.requests,
        vec!["http://10.0.0.2:80/api/config".to_string()]
    );
    assert!(registry.get("Switch1").unwrap().channel.host_available);
    assert_eq!(registry.pending_discovery_count(), 0);
}

#[test]
fn one_pass_resolves_several_distinct_hosts() {
    let cfg = RemoteConfig::default();
    let mut registry = Registry::new();
    registry.add(pot_device(&cfg)).unwrap();
    registry
        .add(RemoteDevice::new("Switch1", "Controller2", "Led1", InputKind::Toggle, &cfg).unwrap())
        .unwrap();

    let mut discovery = ScriptedDiscovery::new().with_pass(vec![
        answer("Controller1.local", [10, 0, 0, 1], 80),
        answer("Controller2.local", [10, 0, 0, 2], 8080),
    ]);
    let mut transport = ScriptedTransport::new()
        .with_ok(200, CONFIG_BODY)
        .with_ok(200, CONFIG_BODY);
    let mut sink = RecordingSink::new();

    assert_eq!(
        locator().pass(&mut registry, &mut discovery, &mut transport, &mut sink),
        2
    );
    assert_eq!(discovery.queries.len(), 1);
    assert_eq!(
        transport.requests,
        vec![
            "http://10.0.0.1:80/api/config".to_string(),
            "http://10.0.0.2:8080/api/config".to_string(),
        ]
    );
    let ep = registry.get("Switch1").unwrap().channel.endpoint.unwrap();
    assert_eq!(ep.port, 8080);
}

#[test]
fn two_devices_on_one_host_share_one_fetch() {
    let cfg = RemoteConfig::default();
    let mut registry = Registry::new();
    registry.add(pot_device(&cfg)).unwrap();
    registry
        .add(RemoteDevice::new("Switch1", "Controller1", "Led1", InputKind::Toggle, &cfg).unwrap())
        .unwrap();

    let mut discovery =
        ScriptedDiscovery::new().with_pass(vec![answer("Controller1.local", [10, 0, 0, 1], 80)]);
    let mut transport = ScriptedTransport::new().with_ok(200, CONFIG_BODY);
    let mut sink = RecordingSink::new();

    assert_eq!(
        locator().pass(&mut registry, &mut discovery, &mut transport, &mut sink),
        2
    );
    assert_eq!(transport.requests.len(), 1);
    assert!(registry.get("Pot1").unwrap().channel.host_available);
    assert!(registry.get("Switch1").unwrap().channel.host_available);
}

#[test]
fn malformed_capability_leaves_device_unavailable() {
    let cfg = RemoteConfig::default();
    let mut registry = Registry::new();
    registry.add(pot_device(&cfg)).unwrap();

    let mut discovery =
        ScriptedDiscovery::new().with_pass(vec![answer("Controller1.local", [10, 0, 0, 1], 80)]);
    let mut transport = ScriptedTransport::new().with_ok(200, "{ not json");
    let mut sink = RecordingSink::new();
    let mut locator = locator();

    assert_eq!(
        locator.pass(&mut registry, &mut discovery, &mut transport, &mut sink),
        0
    );
    assert!(!registry.get("Pot1").unwrap().channel.host_available);
    assert_eq!(registry.pending_discovery_count(), 1);

    // The next pass retries and succeeds.
    let mut discovery =
        ScriptedDiscovery::new().with_pass(vec![answer("Controller1.local", [10, 0, 0, 1], 80)]);
    let mut transport = ScriptedTransport::new().with_ok(200, CONFIG_BODY);
    assert_eq!(
        locator.pass(&mut registry, &mut discovery, &mut transport, &mut sink),
        1
    );
    assert!(registry.get("Pot1").unwrap().channel.host_available);
}

#[test]
fn capability_fetch_error_leaves_device_unavailable() {
    let cfg = RemoteConfig::default();
    let mut registry = Registry::new();
    registry.add(pot_device(&cfg)).unwrap();

    for transport in [
        ScriptedTransport::new().with_ok(500, "boom"),
        ScriptedTransport::new().with_err(TransportError::Timeout),
    ] {
        let mut transport = transport;
        let mut discovery = ScriptedDiscovery::new()
            .with_pass(vec![answer("Controller1.local", [10, 0, 0, 1], 80)]);
        let mut sink = RecordingSink::new();
        assert_eq!(
            locator().pass(&mut registry, &mut discovery, &mut transport, &mut sink),
            0
        );
        assert!(!registry.get("Pot1").unwrap().channel.host_available);
    }
}

#[test]
fn capability_without_our_device_is_rejected() {
    let cfg = RemoteConfig::default();
    let mut registry = Registry::new();
    registry.add(pot_device(&cfg)).unwrap();

    let mut discovery =
        ScriptedDiscovery::new().with_pass(vec![answer("Controller1.local", [10, 0, 0, 1], 80)]);
    let mut transport = ScriptedTransport::new()
        .with_ok(200, r#"{"rate":500,"devices":[{"name":"SomethingElse"}]}"#);
    let mut sink = RecordingSink::new();

    assert_eq!(
        locator().pass(&mut registry, &mut discovery, &mut transport, &mut sink),
        0
    );
    assert!(!registry.get("Pot1").unwrap().channel.host_available);
}

#[test]
fn devices_without_a_host_are_never_queried() {
    let cfg = RemoteConfig::default();
    let mut registry = Registry::new();
    registry
        .add(RemoteDevice::new("Local1", "", "", InputKind::Toggle, &cfg).unwrap())
        .unwrap();

    let mut discovery = ScriptedDiscovery::new();
    let mut transport = ScriptedTransport::new();
    let mut sink = RecordingSink::new();

    assert_eq!(registry.pending_discovery_count(), 0);
    assert_eq!(
        locator().pass(&mut registry, &mut discovery, &mut transport, &mut sink),
        0
    );
    // No pending devices — the pass exits before even querying.
    assert!(discovery.queries.is_empty());
}
