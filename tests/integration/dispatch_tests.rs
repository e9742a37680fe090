//! Command dispatcher behaviour: dead-band, keep-alive, and the
//! failure-streak circuit breaker.

use std::net::Ipv4Addr;

use espcontrol::config::RemoteConfig;
use espcontrol::devices::{CommandBounds, InputFrame, InputKind, SensorRange};
use espcontrol::discovery::ServiceLocator;
use espcontrol::dispatch::{
    DispatchOutcome, DispatchPolicy, Dispatcher, Endpoint, Registry, RemoteDevice,
};
use espcontrol::error::TransportError;

use crate::mock_hw::{RecordingSink, ScriptedDiscovery, ScriptedTransport, answer};

const KEEP_ALIVE_MS: u64 = 1_800_000;

fn cfg() -> RemoteConfig {
    RemoteConfig::default()
}

/// A device already through its discovery+config cycle.
fn available_device(cfg: &RemoteConfig) -> RemoteDevice {
    let mut dev = RemoteDevice::new(
        "Pot1",
        "Controller1",
        "Stepper1",
        InputKind::Pot {
            range: SensorRange::new(0, 1024),
            directed: false,
        },
        cfg,
    )
    .unwrap();
    dev.channel.endpoint = Some(Endpoint {
        addr: Ipv4Addr::new(10, 0, 0, 1),
        port: 80,
    });
    dev.channel.bounds = CommandBounds::new(-100, 100);
    dev.channel.host_available = true;
    dev
}

#[test]
fn first_send_happens_regardless_of_diff() {
    let cfg = cfg();
    let mut dev = available_device(&cfg);
    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let mut transport = ScriptedTransport::new().with_ok(200, "command enable: 0");
    let mut sink = RecordingSink::new();

    // Mid-scale → command 0 == initial last_command, diff 0, but this is
    // the first-ever attempt.
    let outcome = dispatcher.tick(
        &mut dev,
        InputFrame::analog(512),
        &mut transport,
        &mut sink,
        1000,
    );
    assert_eq!(outcome, DispatchOutcome::Sent { command: 0 });
    assert_eq!(
        transport.requests,
        vec!["http://10.0.0.1:80/api/control?device=Stepper1&command=0".to_string()]
    );
    assert_eq!(dev.channel.last_send_ms, Some(1000));
}

#[test]
fn small_movement_is_held_until_keep_alive() {
    let cfg = cfg();
    let mut dev = available_device(&cfg);
    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let mut sink = RecordingSink::new();

    // Prime the channel with an acknowledged send at t=0.
    let mut transport = ScriptedTransport::new().with_ok(200, "ok");
    let outcome = dispatcher.tick(&mut dev, InputFrame::analog(512), &mut transport, &mut sink, 0);
    assert_eq!(outcome, DispatchOutcome::Sent { command: 0 });

    // Raw 518 → command 1 → diff 1 ≤ movement_min: held for the whole
    // keep-alive window...
    let mut transport = ScriptedTransport::new();
    for t in [1_000, 900_000, KEEP_ALIVE_MS - 1] {
        let outcome =
            dispatcher.tick(&mut dev, InputFrame::analog(518), &mut transport, &mut sink, t);
        assert_eq!(outcome, DispatchOutcome::Held { command: 1 });
    }
    assert!(transport.requests.is_empty());

    // ...then sent exactly once at elapse.
    let mut transport = ScriptedTransport::new().with_ok(200, "ok");
    let outcome = dispatcher.tick(
        &mut dev,
        InputFrame::analog(518),
        &mut transport,
        &mut sink,
        KEEP_ALIVE_MS,
    );
    assert_eq!(outcome, DispatchOutcome::Sent { command: 1 });

    // The keep-alive window restarts from the new send.
    let outcome = dispatcher.tick(
        &mut dev,
        InputFrame::analog(518),
        &mut transport,
        &mut sink,
        KEEP_ALIVE_MS + 1000,
    );
    assert_eq!(outcome, DispatchOutcome::Held { command: 1 });
}

#[test]
fn large_movement_dispatches_immediately() {
    let cfg = cfg();
    let mut dev = available_device(&cfg);
    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let mut transport = ScriptedTransport::new().with_ok_times(200, "ok", 2);
    let mut sink = RecordingSink::new();

    let _ = dispatcher.tick(&mut dev, InputFrame::analog(512), &mut transport, &mut sink, 0);
    let outcome = dispatcher.tick(
        &mut dev,
        InputFrame::analog(1024),
        &mut transport,
        &mut sink,
        1000,
    );
    assert_eq!(outcome, DispatchOutcome::Sent { command: 100 });
    assert_eq!(dev.channel.last_command, 100);
}

#[test]
fn unavailable_channel_is_a_no_op() {
    let cfg = cfg();
    let mut dev = available_device(&cfg);
    dev.channel.demote();
    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let mut transport = ScriptedTransport::new();
    let mut sink = RecordingSink::new();

    let outcome = dispatcher.tick(
        &mut dev,
        InputFrame::analog(1024),
        &mut transport,
        &mut sink,
        0,
    );
    assert_eq!(outcome, DispatchOutcome::Unavailable);
    assert!(transport.requests.is_empty());
}

#[test]
fn failure_streak_demotes_at_threshold() {
    let cfg = cfg();
    let mut dev = available_device(&cfg);
    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let mut sink = RecordingSink::new();

    // Five consecutive failures: four Failed, the fifth demotes.
    let mut transport = ScriptedTransport::new(); // everything fails to connect
    for expected_streak in 1..=4u8 {
        let outcome = dispatcher.tick(
            &mut dev,
            InputFrame::analog(1024),
            &mut transport,
            &mut sink,
            u64::from(expected_streak),
        );
        assert_eq!(
            outcome,
            DispatchOutcome::Failed {
                streak: expected_streak
            }
        );
        assert!(dev.channel.host_available);
    }
    let outcome = dispatcher.tick(&mut dev, InputFrame::analog(1024), &mut transport, &mut sink, 5);
    assert_eq!(outcome, DispatchOutcome::Demoted);
    assert!(!dev.channel.host_available);
    assert!(dev.channel.endpoint.is_none());
    assert_eq!(dev.channel.consecutive_failures, 0);
    assert_eq!(sink.count_lost(), 1);
    assert_eq!(transport.requests.len(), 5);

    // A sixth attempt is not made: the channel no-ops until re-discovery.
    let outcome = dispatcher.tick(&mut dev, InputFrame::analog(1024), &mut transport, &mut sink, 6);
    assert_eq!(outcome, DispatchOutcome::Unavailable);
    assert_eq!(transport.requests.len(), 5);
}

#[test]
fn non_success_status_counts_as_failure() {
    let cfg = cfg();
    let mut dev = available_device(&cfg);
    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let mut transport = ScriptedTransport::new().with_ok(500, "Device does not exist");
    let mut sink = RecordingSink::new();

    let outcome = dispatcher.tick(
        &mut dev,
        InputFrame::analog(1024),
        &mut transport,
        &mut sink,
        0,
    );
    assert_eq!(outcome, DispatchOutcome::Failed { streak: 1 });
}

#[test]
fn success_resets_the_streak() {
    let cfg = cfg();
    let mut dev = available_device(&cfg);
    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let mut sink = RecordingSink::new();

    let mut transport = ScriptedTransport::new()
        .with_err(TransportError::Timeout)
        .with_err(TransportError::Timeout)
        .with_ok(200, "ok")
        .with_err(TransportError::Timeout);

    let frames = [1024, 0, 1024, 0];
    let outcomes: Vec<_> = frames
        .iter()
        .enumerate()
        .map(|(t, &raw)| {
            dispatcher.tick(
                &mut dev,
                InputFrame::analog(raw),
                &mut transport,
                &mut sink,
                t as u64,
            )
        })
        .collect();

    assert_eq!(outcomes[0], DispatchOutcome::Failed { streak: 1 });
    assert_eq!(outcomes[1], DispatchOutcome::Failed { streak: 2 });
    assert_eq!(outcomes[2], DispatchOutcome::Sent { command: 100 });
    // The earlier failures no longer count toward the threshold.
    assert_eq!(outcomes[3], DispatchOutcome::Failed { streak: 1 });
    assert!(dev.channel.host_available);
}

#[test]
fn failed_send_does_not_update_last_command() {
    let cfg = cfg();
    let mut dev = available_device(&cfg);
    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let mut sink = RecordingSink::new();

    let before = dev.channel.last_command;
    let mut transport = ScriptedTransport::new().with_err(TransportError::ConnectFailed);
    let _ = dispatcher.tick(
        &mut dev,
        InputFrame::analog(1024),
        &mut transport,
        &mut sink,
        0,
    );
    assert_eq!(dev.channel.last_command, before);
    assert_eq!(dev.channel.last_send_ms, None);
}

#[test]
fn demoted_channel_recovers_through_rediscovery() {
    let cfg = cfg();
    let mut registry = Registry::new();
    registry.add(available_device(&cfg)).unwrap();
    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let mut sink = RecordingSink::new();

    // Burn through the failure streak.
    let mut transport = ScriptedTransport::new();
    for t in 0..5u64 {
        let dev = registry.get_mut("Pot1").unwrap();
        let _ = dispatcher.tick(dev, InputFrame::analog(1024), &mut transport, &mut sink, t);
    }
    assert!(registry.get("Pot1").unwrap().pending_discovery());

    // A fresh discovery+config cycle restores the channel...
    let mut locator = ServiceLocator::new("ESPControl", "tcp");
    let mut discovery =
        ScriptedDiscovery::new().with_pass(vec![answer("Controller1.local", [10, 0, 0, 9], 80)]);
    let mut transport = ScriptedTransport::new().with_ok(
        200,
        r#"{"rate":250,"devices":[{"name":"Stepper1","command_min":-511,"command_max":512}]}"#,
    );
    assert_eq!(
        locator.pass(&mut registry, &mut discovery, &mut transport, &mut sink),
        1
    );

    // ...with the re-resolved endpoint and freshly advertised parameters.
    let dev = registry.get_mut("Pot1").unwrap();
    assert_eq!(dev.channel.host_rate_ms, 250);
    let mut transport = ScriptedTransport::new().with_ok(200, "ok");
    let outcome = dispatcher.tick(dev, InputFrame::analog(1024), &mut transport, &mut sink, 100);
    assert_eq!(outcome, DispatchOutcome::Sent { command: 512 });
    assert_eq!(
        transport.requests,
        vec!["http://10.0.0.9:80/api/control?device=Stepper1&command=512".to_string()]
    );
}

#[test]
fn toggle_device_sends_max_or_neutral() {
    let cfg = cfg();
    let mut dev = available_device(&cfg);
    dev.kind = InputKind::Toggle;
    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let mut sink = RecordingSink::new();
    let mut transport = ScriptedTransport::new().with_ok_times(200, "ok", 2);

    let outcome = dispatcher.tick(&mut dev, InputFrame::level(true), &mut transport, &mut sink, 0);
    assert_eq!(outcome, DispatchOutcome::Sent { command: 100 });
    let outcome = dispatcher.tick(&mut dev, InputFrame::level(false), &mut transport, &mut sink, 1);
    assert_eq!(outcome, DispatchOutcome::Sent { command: 0 });
}
