//! Whole-channel tests: a real `ControlApi` behind a loopback transport,
//! driven by the locator and dispatcher exactly as the remote binary wires
//! them.

use std::sync::Arc;

use espcontrol::api::ControlApi;
use espcontrol::app::ports::{HttpReply, NullEventSink, Transport};
use espcontrol::config::{RemoteConfig, StepperConfig};
use espcontrol::control::{StepperController, StepperShared};
use espcontrol::devices::{CommandBounds, InputFrame, InputKind, SensorRange};
use espcontrol::discovery::ServiceLocator;
use espcontrol::dispatch::{DispatchOutcome, DispatchPolicy, Dispatcher, Registry, RemoteDevice};
use espcontrol::error::TransportError;
use espcontrol::watchdog::CommandWatchdog;

use crate::mock_hw::{RecordingSink, ScriptedDiscovery, answer};

/// Serves a live `ControlApi` the way the controller's HTTP server does:
/// route on the path, hand the query string to the API, relay the reply.
struct LoopbackTransport {
    api: Arc<ControlApi>,
    now_ms: u64,
    requests: Vec<String>,
}

impl LoopbackTransport {
    fn new(api: Arc<ControlApi>) -> Self {
        Self {
            api,
            now_ms: 0,
            requests: Vec::new(),
        }
    }
}

impl Transport for LoopbackTransport {
    fn get(&mut self, url: &str) -> Result<HttpReply, TransportError> {
        self.requests.push(url.into());
        let (path, query) = url
            .split_once("://")
            .and_then(|(_, rest)| rest.split_once('/'))
            .map(|(_, path_query)| match path_query.split_once('?') {
                Some((p, q)) => (p, q),
                None => (path_query, ""),
            })
            .ok_or(TransportError::Protocol)?;

        match path {
            "api/config" => {
                let json = self.api.config_json().map_err(|_| TransportError::Protocol)?;
                let mut body = heapless::String::new();
                body.push_str(&json).map_err(|()| TransportError::Protocol)?;
                Ok(HttpReply { status: 200, body })
            }
            "api/control" => {
                let reply = self
                    .api
                    .handle_control(query, &mut NullEventSink, self.now_ms);
                let mut body = heapless::String::new();
                body.push_str(&reply.body).ok();
                Ok(HttpReply {
                    status: reply.status,
                    body,
                })
            }
            _ => Ok(HttpReply {
                status: 404,
                body: heapless::String::new(),
            }),
        }
    }
}

fn controller_node() -> (Arc<ControlApi>, Arc<StepperShared>) {
    let mut api = ControlApi::new("Controller1", 500).unwrap();
    let stepper = api
        .add_stepper("Stepper1", CommandBounds::new(-511, 512))
        .unwrap();
    api.add_led("Led1", true).unwrap();
    (Arc::new(api), stepper)
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
fn discovery_config_dispatch_and_ramp() {
    let (api, stepper_shared) = controller_node();
    let cfg = RemoteConfig::default();

    let mut registry = Registry::new();
    registry.add(pot_device(&cfg)).unwrap();

    let mut transport = LoopbackTransport::new(Arc::clone(&api));
    let mut discovery =
        ScriptedDiscovery::new().with_pass(vec![answer("Controller1.local", [127, 0, 0, 1], 80)]);
    let mut sink = RecordingSink::new();

    // Discovery + capability: the remote adopts the controller's real
    // advertised bounds and rate.
    let mut locator = ServiceLocator::new("ESPControl", "tcp");
    assert_eq!(
        locator.pass(&mut registry, &mut discovery, &mut transport, &mut sink),
        1
    );
    let dev = registry.get("Pot1").unwrap();
    assert_eq!(dev.channel.bounds, CommandBounds::new(-511, 512));
    assert_eq!(dev.channel.host_rate_ms, 500);

    // Full-scale input dispatches command 512 into the controller.
    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let dev = registry.get_mut("Pot1").unwrap();
    let outcome = dispatcher.tick(dev, InputFrame::analog(1024), &mut transport, &mut sink, 0);
    assert_eq!(outcome, DispatchOutcome::Sent { command: 512 });
    assert_eq!(stepper_shared.set_point(), 512);
    assert_eq!(sink.count_sent(), 1);

    // The controller ramps instead of jumping.
    let mut controller = StepperController::new(StepperConfig::default());
    let mut cycles = 0;
    while controller.command() != 512 {
        let before = controller.command();
        let _ = controller.tick(&stepper_shared);
        assert!((controller.command() - before).abs() <= 10);
        cycles += 1;
        assert!(cycles <= 52);
    }
    assert_eq!(cycles, 52); // ceil(512 / 10)
}

#[test]
fn mid_scale_input_is_neutral_and_suppressed() {
    let (api, stepper_shared) = controller_node();
    let cfg = RemoteConfig::default();

    let mut registry = Registry::new();
    registry.add(pot_device(&cfg)).unwrap();

    let mut transport = LoopbackTransport::new(api);
    let mut discovery =
        ScriptedDiscovery::new().with_pass(vec![answer("Controller1.local", [127, 0, 0, 1], 80)]);
    let mut sink = RecordingSink::new();
    let mut locator = ServiceLocator::new("ESPControl", "tcp");
    locator.pass(&mut registry, &mut discovery, &mut transport, &mut sink);

    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let dev = registry.get_mut("Pot1").unwrap();

    // Raw mid-scale (512 of 0–1024) maps to the exact midpoint command 0.
    let outcome = dispatcher.tick(dev, InputFrame::analog(512), &mut transport, &mut sink, 0);
    assert_eq!(outcome, DispatchOutcome::Sent { command: 0 });
    assert_eq!(stepper_shared.set_point(), 0);

    // With last_command already 0, the same reading is suppressed.
    let requests_before = transport.requests.len();
    let outcome = dispatcher.tick(dev, InputFrame::analog(512), &mut transport, &mut sink, 1000);
    assert_eq!(outcome, DispatchOutcome::Held { command: 0 });
    assert_eq!(transport.requests.len(), requests_before);
}

#[test]
fn remote_silence_ends_in_watchdog_neutral() {
    let (api, stepper_shared) = controller_node();
    let cfg = RemoteConfig::default();

    let mut registry = Registry::new();
    registry.add(pot_device(&cfg)).unwrap();

    let mut transport = LoopbackTransport::new(api);
    let mut discovery =
        ScriptedDiscovery::new().with_pass(vec![answer("Controller1.local", [127, 0, 0, 1], 80)]);
    let mut sink = RecordingSink::new();
    let mut locator = ServiceLocator::new("ESPControl", "tcp");
    locator.pass(&mut registry, &mut discovery, &mut transport, &mut sink);

    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let dev = registry.get_mut("Pot1").unwrap();
    transport.now_ms = 0;
    let outcome = dispatcher.tick(dev, InputFrame::analog(900), &mut transport, &mut sink, 0);
    assert!(matches!(outcome, DispatchOutcome::Sent { .. }));
    let commanded = stepper_shared.set_point();
    assert!(commanded > 0);

    // The remote goes silent; 15 s later the controller's watchdog forces
    // neutral on its own.
    let watchdog = CommandWatchdog::new(15_000);
    assert!(!watchdog.check(&stepper_shared, &mut sink, 14_000));
    assert!(watchdog.check(&stepper_shared, &mut sink, 15_500));
    assert_eq!(stepper_shared.set_point(), 0);
}

#[test]
fn led_toggle_end_to_end() {
    let (api, _) = controller_node();
    let cfg = RemoteConfig::default();

    let mut registry = Registry::new();
    registry
        .add(RemoteDevice::new("Switch1", "Controller1", "Led1", InputKind::Toggle, &cfg).unwrap())
        .unwrap();

    let mut transport = LoopbackTransport::new(Arc::clone(&api));
    let mut discovery =
        ScriptedDiscovery::new().with_pass(vec![answer("Controller1.local", [127, 0, 0, 1], 80)]);
    let mut sink = RecordingSink::new();
    let mut locator = ServiceLocator::new("ESPControl", "tcp");
    assert_eq!(
        locator.pass(&mut registry, &mut discovery, &mut transport, &mut sink),
        1
    );

    // The Led entry advertises no bounds, so the fallback bounds stay.
    let dev = registry.get_mut("Switch1").unwrap();
    assert_eq!(dev.channel.bounds, cfg.fallback_bounds);

    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let outcome = dispatcher.tick(dev, InputFrame::level(true), &mut transport, &mut sink, 0);
    assert_eq!(outcome, DispatchOutcome::Sent { command: 100 });
    assert!(
        transport
            .requests
            .last()
            .unwrap()
            .ends_with("/api/control?device=Led1&command=100")
    );
}
