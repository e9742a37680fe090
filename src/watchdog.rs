//! Command staleness watchdog.
//!
//! Runs on its own coarse period, independent of the control cycle. If the
//! setpoint is non-neutral and no command has arrived within the timeout,
//! the watchdog forces the setpoint to neutral — the sole backstop against
//! a crashed or disconnected remote leaving the motor running.
//!
//! The trip also refreshes the command timestamp, so a single stale
//! setpoint produces exactly one trip, not one per watchdog cycle. A trip
//! is a safety action, not an error: the actuator ramps down through the
//! normal slew path.

use log::warn;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::control::StepperShared;

pub struct CommandWatchdog {
    timeout_ms: u64,
}

impl CommandWatchdog {
    pub fn new(timeout_ms: u64) -> Self {
        Self { timeout_ms }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Evaluate one watchdog cycle. Returns `true` if it tripped.
    pub fn check(&self, shared: &StepperShared, sink: &mut impl EventSink, now_ms: u64) -> bool {
        let set_point = shared.set_point();
        if set_point == 0 {
            return false;
        }
        let age_ms = now_ms.saturating_sub(shared.last_command_ms());
        if age_ms <= self.timeout_ms {
            return false;
        }
        warn!(
            "watchdog: no command for {age_ms} ms (setpoint {set_point}), forcing neutral"
        );
        shared.neutralize(now_ms);
        sink.emit(&AppEvent::WatchdogTripped {
            stale_set_point: set_point,
        });
        true
    }
}
