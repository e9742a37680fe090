//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to the
//! logger (UART / USB-CDC in production). A telemetry uplink would
//! implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::HostResolved { device, addr, port } => {
                info!("DISC  | {device} host at {addr}:{port}");
            }
            AppEvent::HostConfigured {
                device,
                rate_ms,
                bounds,
            } => {
                info!(
                    "CONF  | {device} available: bounds [{}, {}], rate {rate_ms} ms",
                    bounds.min, bounds.max
                );
            }
            AppEvent::CommandSent { device, command } => {
                info!("SEND  | {device} command {command}");
            }
            AppEvent::DeliveryFailed {
                device,
                error,
                streak,
            } => {
                warn!("FAIL  | {device} {error} (streak {streak})");
            }
            AppEvent::HostLost { device } => {
                warn!("LOST  | {device} host unavailable, awaiting re-discovery");
            }
            AppEvent::ControlAccepted { device, command } => {
                info!("CTRL  | {device} command {command}");
            }
            AppEvent::WatchdogTripped { stale_set_point } => {
                warn!("WDOG  | stale setpoint {stale_set_point} forced to neutral");
            }
        }
    }
}
