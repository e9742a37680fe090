//! Outbound application events.
//!
//! The dispatcher and controller emit these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them — log to serial today, publish elsewhere
//! tomorrow.

use core::net::Ipv4Addr;

use crate::devices::{CommandBounds, DeviceName};
use crate::error::DeliveryError;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A discovery pass matched a host record for `device`.
    HostResolved {
        device: DeviceName,
        addr: Ipv4Addr,
        port: u16,
    },

    /// The host's capability document was applied; the channel is AVAILABLE.
    HostConfigured {
        device: DeviceName,
        rate_ms: u32,
        bounds: CommandBounds,
    },

    /// A command was delivered and acknowledged.
    CommandSent { device: DeviceName, command: i32 },

    /// A dispatch attempt failed; `streak` is the consecutive-failure count.
    DeliveryFailed {
        device: DeviceName,
        error: DeliveryError,
        streak: u8,
    },

    /// The failure streak crossed the threshold; the channel is UNAVAILABLE
    /// until a fresh discovery+config cycle succeeds.
    HostLost { device: DeviceName },

    /// A control request was accepted for a hosted device.
    ControlAccepted { device: DeviceName, command: i32 },

    /// The staleness watchdog forced the setpoint to neutral.
    WatchdogTripped { stale_set_point: i32 },
}
