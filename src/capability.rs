//! Capability document parsing and application.
//!
//! A controller publishes a small JSON document at `/api/config` describing
//! itself and its hosted devices:
//!
//! ```json
//! {
//!   "name": "Controller1",
//!   "rate": 500,
//!   "devices": [
//!     { "name": "Stepper1", "type": "stepper",
//!       "command_min": -511, "command_max": 512 }
//!   ]
//! }
//! ```
//!
//! Older controller generations serialise the bound fields as `commandMin`/
//! `commandMax`; both casings are accepted. Fields beyond the expected shape
//! are ignored. The whole document is bounded (it arrives through the
//! bounded [`HttpReply`](crate::app::ports::HttpReply) body and into
//! fixed-capacity collections).

use log::{info, warn};
use serde::Deserialize;

use crate::devices::MAX_DEVICES;
use crate::dispatch::RemoteDevice;
use crate::error::ConfigError;

/// Parsed capability document.
#[derive(Debug, Deserialize)]
pub struct CapabilityDoc {
    #[serde(default)]
    pub name: Option<heapless::String<32>>,
    /// Suggested poll period in milliseconds.
    #[serde(default)]
    pub rate: Option<i64>,
    #[serde(default)]
    pub devices: Option<heapless::Vec<DeviceEntry, MAX_DEVICES>>,
}

/// One hosted-device descriptor.
#[derive(Debug, Deserialize)]
pub struct DeviceEntry {
    pub name: heapless::String<32>,
    #[serde(rename = "type", default)]
    pub kind: Option<heapless::String<16>>,
    #[serde(default, alias = "commandMin")]
    pub command_min: Option<i32>,
    #[serde(default, alias = "commandMax")]
    pub command_max: Option<i32>,
}

/// Parse a capability document body.
pub fn parse(body: &str) -> Result<CapabilityDoc, ConfigError> {
    serde_json::from_str(body).map_err(|_| ConfigError::Malformed)
}

/// Apply a parsed document to one device's channel.
///
/// Bounds are taken from the descriptor whose name matches the device's
/// target (missing fields keep their current values), then repaired:
/// inverted bounds are swapped, and the range is forced to bracket zero —
/// every input kind here is neutral-at-zero, so a range that excludes 0
/// would make the target impossible to stop. The advertised rate is adopted
/// when present and positive.
///
/// On error the caller leaves the channel UNAVAILABLE; the next discovery
/// pass retries.
pub fn apply(doc: &CapabilityDoc, device: &mut RemoteDevice) -> Result<(), ConfigError> {
    let entries = doc.devices.as_ref().ok_or(ConfigError::NoMatchingDevice)?;
    let entry = entries
        .iter()
        .find(|e| e.name == device.host_device)
        .ok_or(ConfigError::NoMatchingDevice)?;

    let mut bounds = device.channel.bounds;
    if let Some(min) = entry.command_min {
        bounds.min = min;
    }
    if let Some(max) = entry.command_max {
        bounds.max = max;
    }
    let repaired = bounds.normalized().bracketing_zero();
    if repaired != bounds {
        warn!(
            "[{}] advertised bounds [{}, {}] repaired to [{}, {}]",
            device.name, bounds.min, bounds.max, repaired.min, repaired.max
        );
    }
    device.channel.bounds = repaired;

    if let Some(rate) = doc.rate {
        if rate > 0 && rate <= i64::from(u32::MAX) {
            device.channel.host_rate_ms = rate as u32;
        }
    }

    info!(
        "[{}] host device \"{}\" configured: bounds [{}, {}], rate {} ms",
        device.name,
        device.host_device,
        device.channel.bounds.min,
        device.channel.bounds.max,
        device.channel.host_rate_ms
    );
    Ok(())
}
