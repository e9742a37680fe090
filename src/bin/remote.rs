//! Remote (input node) entry point.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  PotAdc ─▶ PotSampler ─┐                                      │
//! │  Switch pins ──────────┤                                      │
//! │                        ▼                                      │
//! │  MdnsBrowser ─▶ ServiceLocator ─▶ Registry ─▶ Dispatcher      │
//! │                                        │                      │
//! │                                        ▼                      │
//! │                         EspTransport GET /api/control         │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! One cooperative main loop drives four scheduled tasks: analog sampling,
//! one dispatch per bound device, and the discovery pass that (re)resolves
//! unavailable hosts.

use anyhow::Result;
use log::info;

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{PinDriver, Pull};
use esp_idf_hal::peripherals::Peripherals;

use espcontrol::adapters::http::EspTransport;
use espcontrol::adapters::log_sink::LogEventSink;
use espcontrol::adapters::mdns::MdnsBrowser;
use espcontrol::adapters::time::UptimeClock;
use espcontrol::adapters::wifi;
use espcontrol::app::ports::{EventSink, ServiceDiscovery, Transport};
use espcontrol::config::{MDNS_PROTOCOL, MDNS_SERVICE, RemoteConfig};
use espcontrol::devices::{InputFrame, InputKind};
use espcontrol::discovery::ServiceLocator;
use espcontrol::dispatch::{DispatchOutcome, DispatchPolicy, Dispatcher, Registry, RemoteDevice};
use espcontrol::drivers::analog::PotAdc;
use espcontrol::drivers::gpio::EhSwitchInput;
use espcontrol::drivers::twdt::TaskWatchdog;
use espcontrol::scheduler::{TaskDelegate, TaskId, TaskScheduler};
use espcontrol::sensors::{PotSampler, SwitchInput};

/// This node's name (mDNS hostname and log tag).
const NODE_NAME: &str = "Remote1";
/// The controller we drive.
const HOST: &str = "Controller1";

const WIFI_SSID: &str = match option_env!("ESPCONTROL_SSID") {
    Some(s) => s,
    None => "espcontrol",
};
const WIFI_PASS: &str = match option_env!("ESPCONTROL_PASS") {
    Some(s) => s,
    None => "",
};

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("ESPControl remote v{} ({NODE_NAME})", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;
    let cfg = RemoteConfig::default();
    cfg.validate().map_err(anyhow::Error::msg)?;

    // ── Network bring-up (out of the command channel's scope) ──
    let _wifi = wifi::connect_station(peripherals.modem, WIFI_SSID, WIFI_PASS)?;

    // ── Ports (board wiring: pot wiper on GPIO5/ADC1, enable
    //    switch on GPIO6 against an internal pull-up) ───────────
    let mut adc = PotAdc::new(peripherals.adc1, peripherals.pins.gpio5)?;
    let mut enable_pin = PinDriver::input(peripherals.pins.gpio6)?;
    enable_pin.set_pull(Pull::Up)?;
    let mut enable_pin = EhSwitchInput(enable_pin);
    let enable_switch = SwitchInput::new(true); // active-low wiring

    let mut browser = MdnsBrowser::new().map_err(anyhow::Error::msg)?;
    let mut transport = EspTransport::new(5000);
    let mut sink = LogEventSink::new();
    let clock = UptimeClock::new();
    let twdt = TaskWatchdog::new();

    // ── Devices ───────────────────────────────────────────────
    let sampler = PotSampler::new(cfg.sampler);
    let mut registry = Registry::new();
    registry
        .add(
            RemoteDevice::new(
                "Pot1",
                HOST,
                "Stepper1",
                InputKind::Pot {
                    range: cfg.sampler.range,
                    directed: false,
                },
                &cfg,
            )
            .map_err(anyhow::Error::msg)?,
        )
        .map_err(anyhow::Error::msg)?;
    registry
        .add(
            RemoteDevice::new("Switch1", HOST, "Led1", InputKind::Toggle, &cfg)
                .map_err(anyhow::Error::msg)?,
        )
        .map_err(anyhow::Error::msg)?;

    let dispatcher = Dispatcher::new(DispatchPolicy::from(&cfg));
    let mut locator = ServiceLocator::new(MDNS_SERVICE, MDNS_PROTOCOL);

    // ── Task schedule ─────────────────────────────────────────
    let now = clock.uptime_ms();
    let mut scheduler = TaskScheduler::new();
    let sample_task = scheduler
        .add("sample", sampler.read_interval_ms(), now)
        .ok_or_else(|| anyhow::anyhow!("scheduler full"))?;
    let dispatch_pot = scheduler
        .add("dispatch:Pot1", cfg.fallback_rate_ms, now)
        .ok_or_else(|| anyhow::anyhow!("scheduler full"))?;
    let dispatch_switch = scheduler
        .add("dispatch:Switch1", cfg.fallback_rate_ms, now)
        .ok_or_else(|| anyhow::anyhow!("scheduler full"))?;
    let discovery_task = scheduler
        .add("discovery", cfg.discovery_retry_ms, now)
        .ok_or_else(|| anyhow::anyhow!("scheduler full"))?;

    info!("remote up, {} devices bound to {HOST}", registry.len());

    // ── Main loop ─────────────────────────────────────────────
    let mut pot_reading = cfg.sampler.range.mid();
    loop {
        twdt.feed();
        let now = clock.uptime_ms();

        let mut tasks = RemoteTasks {
            sample_task,
            dispatch_pot,
            dispatch_switch,
            discovery_task,
            sampler: &sampler,
            adc: &mut adc,
            enable_switch,
            enable_pin: &mut enable_pin,
            registry: &mut registry,
            dispatcher: &dispatcher,
            locator: &mut locator,
            browser: &mut browser,
            transport: &mut transport,
            sink: &mut sink,
            pot_reading: &mut pot_reading,
            demoted: false,
            now,
        };
        scheduler.poll(now, &mut tasks);
        let demoted = tasks.demoted;

        // Adopt host-advertised rates and react to a demotion with an
        // immediate re-discovery pass (the episode's first pass skips the
        // retry delay).
        if let Some(dev) = registry.get("Pot1") {
            scheduler.set_period(dispatch_pot, dev.channel.host_rate_ms);
        }
        if let Some(dev) = registry.get("Switch1") {
            scheduler.set_period(dispatch_switch, dev.channel.host_rate_ms);
        }
        if demoted {
            scheduler.defer(discovery_task, 0, now);
        }

        let deadline = scheduler.next_deadline(now).unwrap_or(now + 50);
        let sleep_ms = deadline.saturating_sub(now).clamp(1, 50) as u32;
        FreeRtos::delay_ms(sleep_ms);
    }
}

// ── Scheduled task bodies ─────────────────────────────────────

struct RemoteTasks<'a, A, D, B, T, S>
where
    A: espcontrol::app::ports::AnalogInput,
    D: espcontrol::app::ports::DigitalInput,
    B: ServiceDiscovery,
    T: Transport,
    S: EventSink,
{
    sample_task: TaskId,
    dispatch_pot: TaskId,
    dispatch_switch: TaskId,
    discovery_task: TaskId,
    sampler: &'a PotSampler,
    adc: &'a mut A,
    enable_switch: SwitchInput,
    enable_pin: &'a mut D,
    registry: &'a mut Registry,
    dispatcher: &'a Dispatcher,
    locator: &'a mut ServiceLocator,
    browser: &'a mut B,
    transport: &'a mut T,
    sink: &'a mut S,
    pot_reading: &'a mut i32,
    demoted: bool,
    now: u64,
}

impl<A, D, B, T, S> TaskDelegate for RemoteTasks<'_, A, D, B, T, S>
where
    A: espcontrol::app::ports::AnalogInput,
    D: espcontrol::app::ports::DigitalInput,
    B: ServiceDiscovery,
    T: Transport,
    S: EventSink,
{
    fn on_task_due(&mut self, task: TaskId, _label: &'static str) {
        if task == self.sample_task {
            if let Ok(reading) = self.sampler.sample(self.adc) {
                *self.pot_reading = reading;
            }
        } else if task == self.dispatch_pot {
            if let Some(dev) = self.registry.get_mut("Pot1") {
                let outcome = self.dispatcher.tick(
                    dev,
                    InputFrame::analog(*self.pot_reading),
                    self.transport,
                    self.sink,
                    self.now,
                );
                self.demoted |= outcome == DispatchOutcome::Demoted;
            }
        } else if task == self.dispatch_switch {
            let level = self.enable_switch.level(self.enable_pin);
            if let Some(dev) = self.registry.get_mut("Switch1") {
                let outcome = self.dispatcher.tick(
                    dev,
                    InputFrame::level(level),
                    self.transport,
                    self.sink,
                    self.now,
                );
                self.demoted |= outcome == DispatchOutcome::Demoted;
            }
        } else if task == self.discovery_task {
            let _ = self
                .locator
                .pass(self.registry, self.browser, self.transport, self.sink);
        }
    }
}
