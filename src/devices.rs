//! Device identity and command-space arithmetic.
//!
//! A *device* on the remote is an input (pot or switch) bound to a target
//! device hosted by a controller node. Everything here is pure integer math
//! shared by the dispatcher (input → command mapping) and the actuator side
//! (command clamping, pulse-pause mapping).

use serde::{Deserialize, Serialize};

/// Maximum devices per node (registry capacity).
pub const MAX_DEVICES: usize = 32;

/// Device and host names are short, fixed-capacity strings.
pub type DeviceName = heapless::String<32>;

/// Integer linear interpolation, Arduino `map()` semantics: truncating
/// integer division, no clamping of the result.
///
/// A degenerate input span (`in_max == in_min`) returns `out_min`.
pub fn linear_map(x: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
    let span = i64::from(in_max) - i64::from(in_min);
    if span == 0 {
        return out_min;
    }
    let scaled =
        (i64::from(x) - i64::from(in_min)) * (i64::from(out_max) - i64::from(out_min)) / span;
    (scaled + i64::from(out_min)) as i32
}

// ---------------------------------------------------------------------------
// Command bounds
// ---------------------------------------------------------------------------

/// The command range a device declares: every command sent to or executed by
/// it is clamped into `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBounds {
    pub min: i32,
    pub max: i32,
}

impl CommandBounds {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Clamp a command into the declared range.
    pub fn clamp(&self, command: i32) -> i32 {
        command.clamp(self.min, self.max)
    }

    /// Swap inverted bounds (`max < min`) into ascending order.
    pub fn normalized(self) -> Self {
        if self.max < self.min {
            Self {
                min: self.max,
                max: self.min,
            }
        } else {
            self
        }
    }

    /// Force the range to bracket zero: a positive `min` is clamped down to
    /// 0, a negative `max` up to 0. Devices with a neutral "stop" command
    /// need 0 to be representable; a host advertising `[10, 512]` would
    /// otherwise make the device impossible to halt.
    pub fn bracketing_zero(self) -> Self {
        Self {
            min: self.min.min(0),
            max: self.max.max(0),
        }
    }

    /// Largest command magnitude in the range (saturated at `i32::MAX`).
    pub fn magnitude_max(&self) -> i32 {
        self.min
            .unsigned_abs()
            .max(self.max.unsigned_abs())
            .min(i32::MAX as u32) as i32
    }
}

// ---------------------------------------------------------------------------
// Input kinds
// ---------------------------------------------------------------------------

/// The raw range an analog input is normalised into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRange {
    pub min: i32,
    pub max: i32,
}

impl SensorRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn mid(&self) -> i32 {
        (self.min + self.max) / 2
    }
}

/// What kind of input drives a remote device's command computation.
///
/// Inversion of the raw reading is an input-conditioning concern and happens
/// in the sensor layer, before a value reaches [`InputFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Analog input mapped linearly onto the full command range.
    /// With `directed`, a companion direction switch selects which half of
    /// the range is active and the reading maps onto that half only.
    Pot { range: SensorRange, directed: bool },
    /// On/off input: active level maps to `command_max`, inactive to 0.
    Toggle,
}

/// One cycle's worth of conditioned input state, as read by the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFrame {
    /// Normalised analog reading, or 0/1 level for toggles.
    pub value: i32,
    /// Enable gate level, if the device has one. `Some(false)` forces the
    /// command to neutral regardless of the analog value.
    pub enable: Option<bool>,
    /// Direction level for `directed` pots. `None` means forward.
    pub direction: Option<bool>,
}

impl InputFrame {
    pub fn analog(value: i32) -> Self {
        Self {
            value,
            enable: None,
            direction: None,
        }
    }

    pub fn level(on: bool) -> Self {
        Self {
            value: i32::from(on),
            enable: None,
            direction: None,
        }
    }
}

/// Map one input frame onto the device's command range.
///
/// The result always lies in `bounds` and is monotone in `frame.value`
/// (within the active half for directed pots).
pub fn compute_command(kind: InputKind, frame: InputFrame, bounds: CommandBounds) -> i32 {
    if frame.enable == Some(false) {
        return 0;
    }
    match kind {
        InputKind::Toggle => {
            if frame.value != 0 {
                bounds.max
            } else {
                0
            }
        }
        InputKind::Pot { range, directed } => {
            let v = frame.value.clamp(range.min, range.max);
            let command = if directed {
                match frame.direction {
                    Some(false) => linear_map(v, range.min, range.max, 0, bounds.min),
                    _ => linear_map(v, range.min, range.max, 0, bounds.max),
                }
            } else {
                linear_map(v, range.min, range.max, bounds.min, bounds.max)
            };
            bounds.clamp(command)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
