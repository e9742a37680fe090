//! System configuration parameters.
//!
//! All tunable parameters for both node roles. The defaults carry the values
//! the deployed boards shipped with; deployments that differ (several board
//! generations disagree on dead-band, failure threshold and pulse bounds)
//! override them here instead of patching constants in the loops.

use serde::{Deserialize, Serialize};

use crate::devices::{CommandBounds, SensorRange};
use crate::error::ConfigError;

/// mDNS service identifier both roles agree on.
pub const MDNS_SERVICE: &str = "ESPControl";
/// mDNS protocol label.
pub const MDNS_PROTOCOL: &str = "tcp";

// ---------------------------------------------------------------------------
// Remote (input node)
// ---------------------------------------------------------------------------

/// Analog sampler tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Normalised reading range.
    pub range: SensorRange,
    /// Raw ADC reads averaged into one reading.
    pub samples_per_read: u16,
    /// Maximum readings per second.
    pub reads_per_sec: u16,
    /// Mirror the reading within its range.
    pub invert: bool,
}

impl SamplerConfig {
    pub fn read_interval_ms(&self) -> u32 {
        1000 / u32::from(self.reads_per_sec.max(1))
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            range: SensorRange::new(0, 1024),
            samples_per_read: 64,
            reads_per_sec: 10,
            invert: false,
        }
    }
}

/// Remote-side configuration: command computation and channel policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Dead-band: a command change must exceed this to be worth sending.
    pub movement_min: i32,
    /// Consecutive delivery failures that revoke host availability.
    pub command_fail_max: u8,
    /// Resend an unchanged command after this long to keep the link warm.
    pub keep_alive_ms: u64,
    /// Delay between discovery passes (skipped before the first pass).
    pub discovery_retry_ms: u32,
    /// Poll period used until a host advertises its own rate.
    pub fallback_rate_ms: u32,
    /// Command bounds used until a host advertises its own.
    pub fallback_bounds: CommandBounds,
    /// Analog input conditioning.
    pub sampler: SamplerConfig,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            movement_min: 2,
            command_fail_max: 5,
            keep_alive_ms: 1_800_000, // 30 min
            discovery_retry_ms: 3000,
            fallback_rate_ms: 1000,
            fallback_bounds: CommandBounds::new(-100, 100),
            sampler: SamplerConfig::default(),
        }
    }
}

impl RemoteConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.movement_min < 0 {
            return Err(ConfigError::Invalid("movement_min must be >= 0"));
        }
        if self.command_fail_max == 0 {
            return Err(ConfigError::Invalid("command_fail_max must be >= 1"));
        }
        if self.keep_alive_ms == 0 {
            return Err(ConfigError::Invalid("keep_alive_ms must be > 0"));
        }
        if self.fallback_rate_ms == 0 {
            return Err(ConfigError::Invalid("fallback_rate_ms must be > 0"));
        }
        if self.fallback_bounds.max < self.fallback_bounds.min {
            return Err(ConfigError::Invalid("fallback_bounds inverted"));
        }
        if self.sampler.range.max <= self.sampler.range.min {
            return Err(ConfigError::Invalid("sampler range empty"));
        }
        if self.sampler.samples_per_read == 0 || self.sampler.reads_per_sec == 0 {
            return Err(ConfigError::Invalid("sampler rates must be > 0"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Controller (actuator node)
// ---------------------------------------------------------------------------

/// Stepper actuator tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepperConfig {
    /// Declared command range (advertised to remotes).
    pub bounds: CommandBounds,
    /// Inter-pulse pause at full command magnitude (fastest).
    pub pulse_min_ms: u32,
    /// Inter-pulse pause at the smallest non-zero magnitude (slowest).
    pub pulse_max_ms: u32,
    /// Step pulse high time.
    pub pulse_width_ms: u32,
    /// Maximum command change per control cycle (slew bound).
    pub change_max: i32,
    /// Sleep between cycles while idle (command == 0).
    pub idle_poll_ms: u32,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            bounds: CommandBounds::new(-511, 512),
            pulse_min_ms: 10,
            pulse_max_ms: 1000,
            pulse_width_ms: 10,
            change_max: 10,
            idle_poll_ms: 50,
        }
    }
}

impl StepperConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bounds.max < self.bounds.min {
            return Err(ConfigError::Invalid("stepper bounds inverted"));
        }
        if self.bounds.min > 0 || self.bounds.max < 0 {
            return Err(ConfigError::Invalid("stepper bounds must bracket zero"));
        }
        if self.bounds.magnitude_max() == 0 {
            return Err(ConfigError::Invalid("stepper bounds are all-zero"));
        }
        if self.pulse_min_ms == 0 || self.pulse_max_ms < self.pulse_min_ms {
            return Err(ConfigError::Invalid("pulse pause bounds inverted"));
        }
        if self.pulse_width_ms == 0 {
            return Err(ConfigError::Invalid("pulse_width_ms must be > 0"));
        }
        if self.change_max <= 0 {
            return Err(ConfigError::Invalid("change_max must be >= 1"));
        }
        if self.idle_poll_ms == 0 {
            return Err(ConfigError::Invalid("idle_poll_ms must be > 0"));
        }
        Ok(())
    }
}

/// Controller-side configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Minimum milliseconds between commands, advertised to remotes.
    pub rate_ms: u32,
    /// API listen port (also advertised over mDNS).
    pub api_port: u16,
    /// Neutralise the setpoint when no command arrives for this long.
    pub watchdog_timeout_ms: u64,
    /// How often the staleness watchdog runs (coarse, independent of the
    /// control cycle).
    pub watchdog_poll_ms: u32,
    /// Stepper tuning shared by hosted steppers.
    pub stepper: StepperConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            rate_ms: 500,
            api_port: 80,
            watchdog_timeout_ms: 15_000,
            watchdog_poll_ms: 1000,
            stepper: StepperConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_ms == 0 {
            return Err(ConfigError::Invalid("rate_ms must be > 0"));
        }
        if self.watchdog_timeout_ms == 0 {
            return Err(ConfigError::Invalid("watchdog_timeout_ms must be > 0"));
        }
        if self.watchdog_poll_ms == 0 {
            return Err(ConfigError::Invalid("watchdog_poll_ms must be > 0"));
        }
        self.stepper.validate()
    }
}
