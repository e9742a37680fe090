//! Stepper actuator controller.
//!
//! Splits the externally imposed target from the physically executed value:
//!
//! - `set_point` — what the network (or the watchdog) last asked for,
//!   clamped to the device bounds on every write.
//! - `command` — what the motor is currently doing; converges on
//!   `set_point` at no more than `change_max` per control cycle.
//!
//! The split absorbs network jitter and spares the mechanics from
//! discontinuous remote input: a remote can slam its knob from one end to
//! the other and the motor still ramps.
//!
//! ## Ownership
//!
//! [`StepperShared`] is the cross-thread surface: the HTTP control handler
//! and the watchdog write `set_point`/`last_command_ms`, the control loop
//! reads them. The two writers race benignly (both only ever store whole
//! values; a watchdog write always means "neutral"). `command`, direction
//! and pulse timing belong to [`StepperController`] alone, which lives on
//! the control-loop thread.

use core::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use log::info;

use crate::app::ports::StepPins;
use crate::config::StepperConfig;
use crate::devices::{CommandBounds, linear_map};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Cross-thread stepper state: the authoritative setpoint and the timestamp
/// of its last network write.
pub struct StepperShared {
    bounds: CommandBounds,
    set_point: AtomicI32,
    last_command_ms: AtomicU64,
}

impl StepperShared {
    pub fn new(bounds: CommandBounds) -> Self {
        Self {
            bounds,
            set_point: AtomicI32::new(0),
            last_command_ms: AtomicU64::new(0),
        }
    }

    pub fn bounds(&self) -> CommandBounds {
        self.bounds
    }

    /// Network write: clamp, store, stamp. Returns the clamped value.
    pub fn submit(&self, raw: i32, now_ms: u64) -> i32 {
        let clamped = self.bounds.clamp(raw);
        self.set_point.store(clamped, Ordering::Relaxed);
        self.last_command_ms.store(now_ms, Ordering::Relaxed);
        clamped
    }

    /// Watchdog write: force neutral and refresh the stamp so the trip
    /// condition cannot fire again on the next watchdog cycle.
    pub fn neutralize(&self, now_ms: u64) {
        self.set_point.store(0, Ordering::Relaxed);
        self.last_command_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn set_point(&self) -> i32 {
        self.set_point.load(Ordering::Relaxed)
    }

    pub fn last_command_ms(&self) -> u64 {
        self.last_command_ms.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// What the drive loop should do this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    /// De-energise and wait: `command == 0`.
    Idle { poll_ms: u32 },
    /// Emit one step pulse, then pause. Recomputed every cycle, so a
    /// mid-ramp command change retunes the train immediately.
    Pulse {
        forward: bool,
        width_ms: u32,
        pause_ms: u32,
    },
}

/// Control-loop owner of the executed command.
pub struct StepperController {
    cfg: StepperConfig,
    command: i32,
}

impl StepperController {
    pub fn new(cfg: StepperConfig) -> Self {
        Self { cfg, command: 0 }
    }

    /// Currently executed command.
    pub fn command(&self) -> i32 {
        self.command
    }

    /// Direction sign of the executed command (−1 or 1; 1 while idle).
    pub fn direction(&self) -> i32 {
        if self.command < 0 { -1 } else { 1 }
    }

    pub fn is_idle(&self) -> bool {
        self.command == 0
    }

    /// One control cycle: ease toward the setpoint, then plan the drive.
    pub fn tick(&mut self, shared: &StepperShared) -> Drive {
        let set_point = shared.set_point();
        self.command = slew(self.command, set_point, self.cfg.change_max);

        if self.command == 0 {
            Drive::Idle {
                poll_ms: self.cfg.idle_poll_ms,
            }
        } else {
            Drive::Pulse {
                forward: self.command > 0,
                width_ms: self.cfg.pulse_width_ms,
                pause_ms: self.pause_ms(),
            }
        }
    }

    /// Inter-pulse pause: `|command|` mapped from its live range
    /// `[1, magnitude_max]` onto `[pulse_max, pulse_min]` — larger
    /// magnitude, shorter pause, faster motor.
    fn pause_ms(&self) -> u32 {
        let magnitude = self.command.unsigned_abs() as i32;
        let paused = linear_map(
            magnitude,
            1,
            self.cfg.bounds.magnitude_max(),
            self.cfg.pulse_max_ms as i32,
            self.cfg.pulse_min_ms as i32,
        );
        (paused as u32).clamp(self.cfg.pulse_min_ms, self.cfg.pulse_max_ms)
    }
}

/// Ease `current` toward `target`, moving at most `change_max` and never
/// overshooting.
fn slew(current: i32, target: i32, change_max: i32) -> i32 {
    if current < target {
        target.min(current.saturating_add(change_max))
    } else if current > target {
        target.max(current.saturating_sub(change_max))
    } else {
        current
    }
}

/// Execute one [`Drive`] plan against real pins. `sleep` is injected so the
/// loop is testable and the espidf driver thread supplies FreeRTOS delays.
pub fn execute<P: StepPins>(drive: Drive, pins: &mut P, sleep: &mut impl FnMut(u32)) {
    match drive {
        Drive::Idle { poll_ms } => {
            pins.set_enable(false);
            sleep(poll_ms);
        }
        Drive::Pulse {
            forward,
            width_ms,
            pause_ms,
        } => {
            pins.set_direction(forward);
            pins.set_enable(true);
            pins.set_step(true);
            sleep(width_ms);
            pins.set_step(false);
            sleep(pause_ms);
        }
    }
}

/// Log a setpoint acknowledgment the way the serial console expects it.
pub fn log_submit(name: &str, set_point: i32) {
    info!(
        "[{name}] command enable: {}  direction: {}  speed: {}",
        i32::from(set_point != 0),
        if set_point < 0 { -1 } else { 1 },
        set_point.unsigned_abs()
    );
}
