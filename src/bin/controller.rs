//! Controller (actuator node) entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  EspHttpServer ─▶ ControlApi ─▶ StepperShared / LedShared    │
//! │  MdnsAdvertiser (hostname + _ESPControl._tcp)                │
//! │                                                              │
//! │  stepper threads: StepperController::tick ─▶ pulse train     │
//! │  main loop: LED refresh · staleness watchdog · TWDT feed     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field ownership: the HTTP handlers and the watchdog write the shared
//! setpoints, each stepper thread owns its ramped command and pulse timing.

use std::sync::Arc;
use std::thread;

use anyhow::Result;
use log::info;

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::http::server::{Configuration as ServerConfiguration, EspHttpServer};

use espcontrol::adapters::http::register_api;
use espcontrol::adapters::log_sink::LogEventSink;
use espcontrol::adapters::mdns::MdnsAdvertiser;
use espcontrol::adapters::time::UptimeClock;
use espcontrol::adapters::wifi;
use espcontrol::api::ControlApi;
use espcontrol::config::ControllerConfig;
use espcontrol::control::stepper::execute;
use espcontrol::control::{LedController, StepperController, StepperShared};
use espcontrol::drivers::gpio::{EhEnableLine, EhStepPins};
use espcontrol::drivers::twdt::TaskWatchdog;
use espcontrol::scheduler::{TaskDelegate, TaskId, TaskScheduler};
use espcontrol::watchdog::CommandWatchdog;

/// This node's name (mDNS hostname, capability document).
const NODE_NAME: &str = "Controller1";

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

    info!(
        "ESPControl controller v{} ({NODE_NAME})",
        env!("CARGO_PKG_VERSION")
    );

    let peripherals = Peripherals::take()?;
    let cfg = ControllerConfig::default();
    cfg.validate().map_err(anyhow::Error::msg)?;

    // ── Network bring-up ──────────────────────────────────────
    let _wifi = wifi::connect_station(peripherals.modem, WIFI_SSID, WIFI_PASS)?;

    // ── Hosted devices ────────────────────────────────────────
    let mut api = ControlApi::new(NODE_NAME, cfg.rate_ms).map_err(anyhow::Error::msg)?;
    let stepper1 = api
        .add_stepper("Stepper1", cfg.stepper.bounds)
        .map_err(anyhow::Error::msg)?;
    let stepper2 = api
        .add_stepper("Stepper2", cfg.stepper.bounds)
        .map_err(anyhow::Error::msg)?;
    let led1 = api.add_led("Led1", true).map_err(anyhow::Error::msg)?;
    let api = Arc::new(api);

    // ── API server + advertisement ────────────────────────────
    let clock = UptimeClock::new();
    let mut server = EspHttpServer::new(&ServerConfiguration {
        http_port: cfg.api_port,
        ..Default::default()
    })?;
    register_api(&mut server, Arc::clone(&api), clock)?;

    let mut mdns = MdnsAdvertiser::new(NODE_NAME, cfg.api_port).map_err(anyhow::Error::msg)?;
    mdns.start();

    // ── Stepper driver threads (board wiring: stepper 1 on
    //    GPIO1/2/3, stepper 2 on GPIO8/9/10 as enable/dir/step,
    //    indicator LED active-low on GPIO4) ──────────────────────
    let pins1 = EhStepPins::new(
        PinDriver::output(peripherals.pins.gpio1)?,
        PinDriver::output(peripherals.pins.gpio2)?,
        PinDriver::output(peripherals.pins.gpio3)?,
    );
    spawn_stepper("stepper1", cfg.stepper, Arc::clone(&stepper1), pins1)?;

    let pins2 = EhStepPins::new(
        PinDriver::output(peripherals.pins.gpio8)?,
        PinDriver::output(peripherals.pins.gpio9)?,
        PinDriver::output(peripherals.pins.gpio10)?,
    );
    spawn_stepper("stepper2", cfg.stepper, Arc::clone(&stepper2), pins2)?;

    // ── Main loop: LED refresh, staleness watchdog, TWDT ──────
    let mut led_line = EhEnableLine(PinDriver::output(peripherals.pins.gpio4)?);
    let watchdog = CommandWatchdog::new(cfg.watchdog_timeout_ms);
    let mut sink = LogEventSink::new();
    let twdt = TaskWatchdog::new();

    let now = clock.uptime_ms();
    let mut scheduler = TaskScheduler::new();
    let led_task = scheduler
        .add("led", 50, now)
        .ok_or_else(|| anyhow::anyhow!("scheduler full"))?;
    let watchdog_task = scheduler
        .add("watchdog", cfg.watchdog_poll_ms, now)
        .ok_or_else(|| anyhow::anyhow!("scheduler full"))?;

    info!("controller up on port {}", cfg.api_port);

    loop {
        twdt.feed();
        let now = clock.uptime_ms();
        let mut tasks = ControllerTasks {
            led_task,
            watchdog_task,
            led_shared: &led1,
            led_line: &mut led_line,
            watchdog: &watchdog,
            steppers: [&stepper1, &stepper2],
            sink: &mut sink,
            now,
        };
        scheduler.poll(now, &mut tasks);

        let deadline = scheduler.next_deadline(now).unwrap_or(now + 50);
        let sleep_ms = deadline.saturating_sub(now).clamp(1, 50) as u32;
        FreeRtos::delay_ms(sleep_ms);
    }
}

/// Run one stepper's control loop on its own thread: ease toward the
/// setpoint and execute the resulting pulse train.
fn spawn_stepper(
    name: &'static str,
    cfg: espcontrol::config::StepperConfig,
    shared: Arc<StepperShared>,
    mut pins: impl espcontrol::app::ports::StepPins + Send + 'static,
) -> Result<()> {
    thread::Builder::new()
        .name(name.into())
        .stack_size(4096)
        .spawn(move || {
            let mut controller = StepperController::new(cfg);
            loop {
                let drive = controller.tick(&shared);
                execute(drive, &mut pins, &mut FreeRtos::delay_ms);
            }
        })?;
    Ok(())
}

// ── Scheduled task bodies ─────────────────────────────────────

struct ControllerTasks<'a, L, S>
where
    L: espcontrol::app::ports::EnableLine,
    S: espcontrol::app::ports::EventSink,
{
    led_task: TaskId,
    watchdog_task: TaskId,
    led_shared: &'a espcontrol::control::LedShared,
    led_line: &'a mut L,
    watchdog: &'a CommandWatchdog,
    steppers: [&'a Arc<StepperShared>; 2],
    sink: &'a mut S,
    now: u64,
}

impl<L, S> TaskDelegate for ControllerTasks<'_, L, S>
where
    L: espcontrol::app::ports::EnableLine,
    S: espcontrol::app::ports::EventSink,
{
    fn on_task_due(&mut self, task: TaskId, _label: &'static str) {
        if task == self.led_task {
            LedController::tick(self.led_shared, self.led_line);
        } else if task == self.watchdog_task {
            for stepper in self.steppers {
                let _ = self.watchdog.check(stepper, self.sink, self.now);
            }
        }
    }
}
