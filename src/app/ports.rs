//! Port traits — the hexagonal boundary between domain logic and the outside
//! world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ domain (dispatcher / controller)
//! ```
//!
//! Driven adapters (ADC, GPIO, mDNS, HTTP, event sinks) implement these
//! traits. The domain consumes them via generics, so the core never touches
//! hardware or sockets directly and every loop runs unmodified against the
//! mock adapters in the integration tests.
//!
//! The discovery and transport handles are **not reentrant**: the domain
//! issues at most one query or request per handle at a time.

use core::net::Ipv4Addr;

use crate::error::{DiscoveryError, SensorError, TransportError};

// ───────────────────────────────────────────────────────────────
// Input ports (hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One raw analog conversion. Averaging, clamping and inversion live in the
/// sampler, not here.
pub trait AnalogInput {
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

/// One digital level read. No debouncing is applied anywhere on this path —
/// the deployed boards never debounced their switches, and adding it would
/// change observed command timing.
pub trait DigitalInput {
    fn is_high(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Network ports
// ───────────────────────────────────────────────────────────────

/// Answers collected from one discovery query pass.
pub const MAX_ANSWERS: usize = 8;

/// One mDNS PTR answer. `hostname` is fully qualified (`foo.local`);
/// adapters append the suffix if their stack reports bare host names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAnswer {
    pub hostname: heapless::String<64>,
    pub addr: Ipv4Addr,
    pub port: u16,
}

/// Broadcast service discovery (mDNS).
pub trait ServiceDiscovery {
    /// Issue one query for `service`/`protocol` and return every answer
    /// received within the stack's answer window. Zero answers is a miss,
    /// not an error.
    fn query(
        &mut self,
        service: &str,
        protocol: &str,
    ) -> Result<heapless::Vec<ServiceAnswer, MAX_ANSWERS>, DiscoveryError>;
}

/// A bounded HTTP GET reply. Bodies longer than the buffer are truncated,
/// which is fine for both payloads we read (capability documents and
/// plain-text acks are well under it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: heapless::String<512>,
}

impl HttpReply {
    /// 2xx statuses acknowledge the request.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// GET-style request transport. Implementations must enforce a maximum wait
/// and surface it as [`TransportError::Timeout`] rather than blocking the
/// dispatch loop indefinitely.
pub trait Transport {
    fn get(&mut self, url: &str) -> Result<HttpReply, TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator ports (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Stepper driver pins. Timing (pulse width, inter-pulse pause) is decided
/// by the controller; the port only sets levels.
pub trait StepPins {
    /// Energise or release the driver.
    fn set_enable(&mut self, on: bool);
    /// HIGH = forward.
    fn set_direction(&mut self, forward: bool);
    /// Step line level.
    fn set_step(&mut self, high: bool);
}

/// Single switched output line (LED-class devices).
pub trait EnableLine {
    fn set_enabled(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go (serial log today; a
/// telemetry uplink would implement the same trait).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Sink for contexts that don't care about events (fuzzing, some tests).
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&mut self, _event: &super::events::AppEvent) {}
}
