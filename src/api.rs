//! Controller API surface.
//!
//! Pure request handling for the two endpoints a controller serves:
//!
//! - `GET /api/config` — the *public* capability view: node name, command
//!   rate, and per-device name/type/bounds. Pin assignments and pulse
//!   tuning are internal and never leave the device.
//! - `GET /api/control?device=<name>&…` — apply a command to one hosted
//!   device and acknowledge in plain text.
//!
//! The HTTP server adapter only parses the request line and hands the raw
//! query string here, so the whole surface is exercised by host tests (and
//! fuzzed) without a socket in sight.

use core::fmt::Write as _;
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::control::stepper;
use crate::control::{LedShared, StepperShared};
use crate::devices::{CommandBounds, DeviceName, MAX_DEVICES};
use crate::error::RegistryError;

// ---------------------------------------------------------------------------
// Hosted devices
// ---------------------------------------------------------------------------

/// One device this controller hosts. The shared halves are handed to the
/// control loop / driver threads at wiring time.
enum HostedDevice {
    Stepper {
        name: DeviceName,
        shared: Arc<StepperShared>,
    },
    Led {
        name: DeviceName,
        shared: Arc<LedShared>,
        invert: bool,
    },
}

impl HostedDevice {
    fn name(&self) -> &str {
        match self {
            Self::Stepper { name, .. } | Self::Led { name, .. } => name,
        }
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// A plain response the server adapter writes back verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: heapless::String<128>,
}

impl ApiReply {
    fn text(status: u16, body: &str) -> Self {
        let mut reply = Self {
            status,
            content_type: "text/plain",
            body: heapless::String::new(),
        };
        reply.body.push_str(body).ok();
        reply
    }
}

// ---------------------------------------------------------------------------
// The API
// ---------------------------------------------------------------------------

pub struct ControlApi {
    name: DeviceName,
    rate_ms: u32,
    devices: heapless::Vec<HostedDevice, MAX_DEVICES>,
}

impl ControlApi {
    pub fn new(name: &str, rate_ms: u32) -> Result<Self, RegistryError> {
        Ok(Self {
            name: DeviceName::try_from(name).map_err(|_| RegistryError::NameTooLong)?,
            rate_ms,
            devices: heapless::Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rate_ms(&self) -> u32 {
        self.rate_ms
    }

    /// Register a stepper. Returns the shared half for the driver thread
    /// and the watchdog.
    pub fn add_stepper(
        &mut self,
        name: &str,
        bounds: CommandBounds,
    ) -> Result<Arc<StepperShared>, RegistryError> {
        let shared = Arc::new(StepperShared::new(bounds));
        self.register(HostedDevice::Stepper {
            name: DeviceName::try_from(name).map_err(|_| RegistryError::NameTooLong)?,
            shared: Arc::clone(&shared),
        })?;
        Ok(shared)
    }

    /// Register a switched output. Returns the shared half for the control
    /// loop.
    pub fn add_led(&mut self, name: &str, invert: bool) -> Result<Arc<LedShared>, RegistryError> {
        let shared = Arc::new(LedShared::new());
        self.register(HostedDevice::Led {
            name: DeviceName::try_from(name).map_err(|_| RegistryError::NameTooLong)?,
            shared: Arc::clone(&shared),
            invert,
        })?;
        Ok(shared)
    }

    fn register(&mut self, device: HostedDevice) -> Result<(), RegistryError> {
        if self.devices.iter().any(|d| d.name() == device.name()) {
            warn!("api: device name \"{}\" already exists", device.name());
            return Err(RegistryError::DuplicateName);
        }
        self.devices
            .push(device)
            .map_err(|_| RegistryError::Full)?;
        Ok(())
    }

    /// Handle `/api/control`. `query` is the raw query string (no `?`).
    pub fn handle_control(
        &self,
        query: &str,
        sink: &mut impl EventSink,
        now_ms: u64,
    ) -> ApiReply {
        let device_name = query_param(query, "device").unwrap_or("");
        let Some(device) = self.devices.iter().find(|d| d.name() == device_name) else {
            warn!("api: control request for non-existent device \"{device_name}\"");
            return ApiReply::text(500, "Device does not exist");
        };

        match device {
            HostedDevice::Stepper { name, shared } => {
                let raw = parse_leading_int(query_param(query, "command").unwrap_or(""));
                let raw = raw.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
                let set_point = shared.submit(raw, now_ms);
                stepper::log_submit(name, set_point);
                sink.emit(&AppEvent::ControlAccepted {
                    device: name.clone(),
                    command: set_point,
                });
                let mut reply = ApiReply::text(200, "");
                write!(
                    reply.body,
                    "command enable: {}  direction: {}  speed: {}",
                    i32::from(set_point != 0),
                    if set_point < 0 { -1 } else { 1 },
                    set_point.unsigned_abs()
                )
                .ok();
                reply
            }
            HostedDevice::Led {
                name,
                shared,
                invert,
            } => {
                // Browsers send `enable`; remote toggles dispatch on the
                // uniform `command` parameter, where non-neutral means on.
                let mut on = match query_param(query, "enable") {
                    Some(v) => parse_enable(v),
                    None => parse_leading_int(query_param(query, "command").unwrap_or("")) > 0,
                };
                if *invert {
                    on = !on;
                }
                shared.submit(on);
                info!("[{name}] command enable: {on}");
                sink.emit(&AppEvent::ControlAccepted {
                    device: name.clone(),
                    command: i32::from(on),
                });
                let mut reply = ApiReply::text(200, "");
                write!(reply.body, "command enable: {on}").ok();
                reply
            }
        }
    }

    /// The public capability document, serialised.
    pub fn config_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct PublicDevice<'a> {
            name: &'a str,
            #[serde(rename = "type")]
            kind: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            command_min: Option<i32>,
            #[serde(skip_serializing_if = "Option::is_none")]
            command_max: Option<i32>,
        }

        #[derive(Serialize)]
        struct PublicConfig<'a> {
            name: &'a str,
            rate: u32,
            devices: heapless::Vec<PublicDevice<'a>, MAX_DEVICES>,
        }

        let mut devices = heapless::Vec::new();
        for device in &self.devices {
            let entry = match device {
                HostedDevice::Stepper { name, shared } => PublicDevice {
                    name,
                    kind: "stepper",
                    command_min: Some(shared.bounds().min),
                    command_max: Some(shared.bounds().max),
                },
                HostedDevice::Led { name, .. } => PublicDevice {
                    name,
                    kind: "led",
                    command_min: None,
                    command_max: None,
                },
            };
            devices.push(entry).ok();
        }

        serde_json::to_string(&PublicConfig {
            name: &self.name,
            rate: self.rate_ms,
            devices,
        })
    }
}

// ---------------------------------------------------------------------------
// Query-string helpers
// ---------------------------------------------------------------------------

/// First value for `key` in a raw query string. No percent-decoding: device
/// names and integers never need it on this API.
pub fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

/// Leading-integer parse: optional whitespace, optional sign, then digits.
/// Anything else (including an empty string) is 0 — matching the lenient
/// `toInt()` the older boards applied to this parameter.
pub fn parse_leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let mut value: i64 = 0;
    for b in digits.bytes() {
        if !b.is_ascii_digit() {
            break;
        }
        value = value
            .saturating_mul(10)
            .saturating_add(i64::from(b - b'0'));
    }
    sign * value
}

/// Enable-parameter parse: anything starting with `t` ("true") or a
/// positive integer is on.
pub fn parse_enable(s: &str) -> bool {
    s.starts_with('t') || parse_leading_int(s) > 0
}
