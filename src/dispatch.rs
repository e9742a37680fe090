//! Failure-aware command dispatch.
//!
//! Per remote device the dispatcher keeps a *channel*: the resolved host
//! endpoint, the advertised command bounds and poll rate, and the delivery
//! bookkeeping. The channel is a two-state machine:
//!
//! ```text
//!   UNAVAILABLE ──(discovery + capability success)──▶ AVAILABLE
//!   AVAILABLE ──(failure streak hits command_fail_max)──▶ UNAVAILABLE
//! ```
//!
//! A later successful send never restores availability by itself — only a
//! fresh discovery+capability cycle does (see [`crate::discovery`]).
//!
//! Dispatch suppression combines a dead-band with a keep-alive: an unchanged
//! input generates no traffic, but the link is re-warmed after
//! `keep_alive_ms` so a dead host is noticed even with a stationary knob.

use core::fmt::Write as _;
use core::net::Ipv4Addr;

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, Transport};
use crate::config::RemoteConfig;
use crate::devices::{
    CommandBounds, DeviceName, InputFrame, InputKind, MAX_DEVICES, compute_command,
};
use crate::error::{DeliveryError, RegistryError};

// ---------------------------------------------------------------------------
// Channel state
// ---------------------------------------------------------------------------

/// A resolved discovery record. Logically destroyed when the channel is
/// demoted; the host must then be re-resolved from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub addr: Ipv4Addr,
    pub port: u16,
}

/// Dispatcher-side state for one device's command channel.
#[derive(Debug, Clone)]
pub struct ChannelState {
    /// False until a discovery+capability cycle has succeeded; forced false
    /// again when the failure streak crosses the threshold.
    pub host_available: bool,
    /// Poll period; the host's advertised rate once configured.
    pub host_rate_ms: u32,
    /// Resolved address, present from discovery until demotion.
    pub endpoint: Option<Endpoint>,
    /// Command bounds; the host's advertised bounds once configured.
    pub bounds: CommandBounds,
    /// Last command believed delivered.
    pub last_command: i32,
    /// Timestamp of the last acknowledged send; `None` before the first.
    pub last_send_ms: Option<u64>,
    /// Current consecutive-failure streak.
    pub consecutive_failures: u8,
}

impl ChannelState {
    fn new(cfg: &RemoteConfig) -> Self {
        let bounds = cfg.fallback_bounds;
        Self {
            host_available: false,
            host_rate_ms: cfg.fallback_rate_ms,
            endpoint: None,
            bounds,
            last_command: (bounds.min + bounds.max) / 2,
            last_send_ms: None,
            consecutive_failures: 0,
        }
    }

    /// Revoke availability and discard the discovery record. Recovery goes
    /// through a new discovery+capability cycle.
    pub fn demote(&mut self) {
        self.host_available = false;
        self.endpoint = None;
        self.consecutive_failures = 0;
    }
}

// ---------------------------------------------------------------------------
// Remote device + registry
// ---------------------------------------------------------------------------

/// One input device on this remote, bound to a device hosted by a
/// controller node.
#[derive(Debug, Clone)]
pub struct RemoteDevice {
    /// Local name, unique within the registry.
    pub name: DeviceName,
    /// Logical host to control; empty means no remote binding.
    pub host: DeviceName,
    /// Name of the target device on that host.
    pub host_device: DeviceName,
    pub kind: InputKind,
    pub channel: ChannelState,
}

impl RemoteDevice {
    pub fn new(
        name: &str,
        host: &str,
        host_device: &str,
        kind: InputKind,
        cfg: &RemoteConfig,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            name: DeviceName::try_from(name).map_err(|_| RegistryError::NameTooLong)?,
            host: DeviceName::try_from(host).map_err(|_| RegistryError::NameTooLong)?,
            host_device: DeviceName::try_from(host_device)
                .map_err(|_| RegistryError::NameTooLong)?,
            kind,
            channel: ChannelState::new(cfg),
        })
    }

    /// Whether this device is bound to a controller host at all.
    pub fn wants_host(&self) -> bool {
        !self.host.is_empty()
    }

    /// Bound to a host but not currently AVAILABLE — the locator should
    /// (re-)resolve it on its next pass.
    pub fn pending_discovery(&self) -> bool {
        self.wants_host() && !self.channel.host_available
    }

    /// The fully-qualified record name a matching discovery answer carries.
    pub fn expected_record(&self) -> heapless::String<64> {
        let mut s = heapless::String::new();
        write!(s, "{}.local", self.host).ok();
        s
    }
}

/// Fixed-capacity device table, write-once at registration.
pub struct Registry {
    devices: heapless::Vec<RemoteDevice, MAX_DEVICES>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            devices: heapless::Vec::new(),
        }
    }

    pub fn add(&mut self, device: RemoteDevice) -> Result<(), RegistryError> {
        if self.get(&device.name).is_some() {
            warn!("registry: device name \"{}\" already exists", device.name);
            return Err(RegistryError::DuplicateName);
        }
        self.devices
            .push(device)
            .map_err(|_| RegistryError::Full)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RemoteDevice> {
        self.devices.iter().find(|d| d.name.as_str() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut RemoteDevice> {
        self.devices.iter_mut().find(|d| d.name.as_str() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteDevice> {
        self.devices.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RemoteDevice> {
        self.devices.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Devices the locator still has to resolve.
    pub fn pending_discovery_count(&self) -> usize {
        self.devices.iter().filter(|d| d.pending_discovery()).count()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Channel policy, shared across devices.
#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    pub movement_min: i32,
    pub keep_alive_ms: u64,
    pub command_fail_max: u8,
}

impl From<&RemoteConfig> for DispatchPolicy {
    fn from(cfg: &RemoteConfig) -> Self {
        Self {
            movement_min: cfg.movement_min,
            keep_alive_ms: cfg.keep_alive_ms,
            command_fail_max: cfg.command_fail_max,
        }
    }
}

/// What one dispatch tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Channel is UNAVAILABLE; the tick was a no-op.
    Unavailable,
    /// Command computed but suppressed (inside dead-band, keep-alive not
    /// yet due).
    Held { command: i32 },
    /// Command delivered and acknowledged.
    Sent { command: i32 },
    /// Delivery failed; streak not yet at the threshold.
    Failed { streak: u8 },
    /// Delivery failed and the streak crossed the threshold; the channel
    /// was demoted to UNAVAILABLE.
    Demoted,
}

pub struct Dispatcher {
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// The dispatch predicate: dead-band exceeded, keep-alive elapsed, or
    /// first-ever attempt.
    pub fn should_send(&self, diff: i32, now_ms: u64, last_send_ms: Option<u64>) -> bool {
        if diff > self.policy.movement_min {
            return true;
        }
        match last_send_ms {
            None => true,
            Some(t) => now_ms.saturating_sub(t) >= self.policy.keep_alive_ms,
        }
    }

    /// One dispatch cycle for one device. Runs every `host_rate_ms`.
    pub fn tick(
        &self,
        device: &mut RemoteDevice,
        frame: InputFrame,
        transport: &mut impl Transport,
        sink: &mut impl EventSink,
        now_ms: u64,
    ) -> DispatchOutcome {
        if !device.channel.host_available {
            return DispatchOutcome::Unavailable;
        }
        let Some(endpoint) = device.channel.endpoint else {
            // Available without an endpoint cannot happen through the public
            // API; treat it as unavailable rather than panic.
            return DispatchOutcome::Unavailable;
        };

        let command = compute_command(device.kind, frame, device.channel.bounds);
        let diff = (command - device.channel.last_command).abs();
        if !self.should_send(diff, now_ms, device.channel.last_send_ms) {
            return DispatchOutcome::Held { command };
        }

        let url = control_url(endpoint, &device.host_device, command);
        let error = match transport.get(&url) {
            Ok(reply) if reply.is_success() => {
                device.channel.last_command = command;
                device.channel.consecutive_failures = 0;
                device.channel.last_send_ms = Some(now_ms);
                info!("[{}] command {} acknowledged", device.name, command);
                sink.emit(&AppEvent::CommandSent {
                    device: device.name.clone(),
                    command,
                });
                return DispatchOutcome::Sent { command };
            }
            Ok(reply) => DeliveryError::Status(reply.status),
            Err(e) => DeliveryError::Transport(e),
        };

        device.channel.consecutive_failures = device.channel.consecutive_failures.saturating_add(1);
        let streak = device.channel.consecutive_failures;
        warn!("[{}] dispatch failed ({error}), streak {streak}", device.name);
        sink.emit(&AppEvent::DeliveryFailed {
            device: device.name.clone(),
            error,
            streak,
        });

        if streak >= self.policy.command_fail_max {
            device.channel.demote();
            warn!("[{}] host unavailable, re-entering discovery", device.name);
            sink.emit(&AppEvent::HostLost {
                device: device.name.clone(),
            });
            DispatchOutcome::Demoted
        } else {
            DispatchOutcome::Failed { streak }
        }
    }
}

/// `http://<addr>:<port>/api/control?device=<name>&command=<int>`
fn control_url(endpoint: Endpoint, host_device: &str, command: i32) -> heapless::String<160> {
    let mut url = heapless::String::new();
    write!(
        url,
        "http://{}:{}/api/control?device={}&command={}",
        endpoint.addr, endpoint.port, host_device, command
    )
    .ok();
    url
}
