//! Unified error types for the ESPControl firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! top-level loops' error handling uniform. All variants are `Copy` so they
//! can be cheaply passed through the dispatch loop and event sink without
//! allocation.
//!
//! None of these are fatal: discovery misses are retried, invalid capability
//! documents leave the device unavailable, and delivery failures are counted
//! until the failure streak revokes availability.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A discovery query could not be issued or answered.
    Discovery(DiscoveryError),
    /// A capability document was malformed or did not describe us.
    Config(ConfigError),
    /// A command dispatch was not acknowledged.
    Delivery(DeliveryError),
    /// An input could not be read.
    Sensor(SensorError),
    /// Device registration failed.
    Registry(RegistryError),
    /// Peripheral or service initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovery(e) => write!(f, "discovery: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Delivery(e) => write!(f, "delivery: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Registry(e) => write!(f, "registry: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Discovery errors
// ---------------------------------------------------------------------------

/// An empty query pass (no matching record) is a *miss*, not an error — the
/// locator retries it silently. These variants cover the query machinery
/// itself failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The mDNS query could not be issued.
    QueryFailed,
    /// The mDNS responder/stack could not be brought up.
    ResponderInit,
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueryFailed => write!(f, "mDNS query failed"),
            Self::ResponderInit => write!(f, "mDNS responder init failed"),
        }
    }
}

impl From<DiscoveryError> for Error {
    fn from(e: DiscoveryError) -> Self {
        Self::Discovery(e)
    }
}

// ---------------------------------------------------------------------------
// Capability / configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The capability document did not parse as JSON of the expected shape.
    Malformed,
    /// The document parsed but carried no descriptor for our target device.
    NoMatchingDevice,
    /// A locally configured value failed range validation.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "capability document malformed"),
            Self::NoMatchingDevice => write!(f, "no matching device entry"),
            Self::Invalid(msg) => write!(f, "invalid value: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Delivery / transport errors
// ---------------------------------------------------------------------------

/// A dispatch attempt that did not produce a success acknowledgment.
/// Counted against the failure streak by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The request never completed (connect, timeout, I/O).
    Transport(TransportError),
    /// The host answered with a non-success status code.
    Status(u16),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Status(code) => write!(f, "HTTP status {code}"),
        }
    }
}

impl From<DeliveryError> for Error {
    fn from(e: DeliveryError) -> Self {
        Self::Delivery(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// TCP connect to the resolved endpoint failed.
    ConnectFailed,
    /// The request exceeded the configured maximum wait.
    Timeout,
    /// The response could not be read or was not valid HTTP.
    Protocol,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Protocol => write!(f, "protocol error"),
        }
    }
}

impl From<TransportError> for DeliveryError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error or timed out.
    AdcReadFailed,
    /// GPIO read returned an error.
    GpioReadFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// A device with the same name is already registered.
    DuplicateName,
    /// The fixed-capacity device table is full.
    Full,
    /// A device or host name exceeds the fixed name capacity.
    NameTooLong,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName => write!(f, "device name already exists"),
            Self::Full => write!(f, "device table full"),
            Self::NameTooLong => write!(f, "name too long"),
        }
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
