//! GPIO drivers: embedded-hal pins adapted onto the port traits.
//!
//! Generic over `embedded_hal::digital` so they work with any HAL; on
//! device they wrap `esp_idf_hal::gpio::PinDriver`s. Pin errors are
//! swallowed the way the previous firmware generations did — a failed level
//! write on an already-configured pin has no recovery path in the loop, and
//! the enable line fail-safe is the level the driver chip idles at.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::{DigitalInput, EnableLine, StepPins};

// ───────────────────────────────────────────────────────────────
// Inputs
// ───────────────────────────────────────────────────────────────

/// Switch input over any embedded-hal input pin.
pub struct EhSwitchInput<P>(pub P);

impl<P: InputPin> DigitalInput for EhSwitchInput<P> {
    fn is_high(&mut self) -> bool {
        self.0.is_high().unwrap_or(false)
    }
}

// ───────────────────────────────────────────────────────────────
// Outputs
// ───────────────────────────────────────────────────────────────

/// Switched output line over any embedded-hal output pin.
pub struct EhEnableLine<P>(pub P);

impl<P: OutputPin> EnableLine for EhEnableLine<P> {
    fn set_enabled(&mut self, on: bool) {
        set_level(&mut self.0, on);
    }
}

/// Stepper driver pin trio (enable / direction / step).
pub struct EhStepPins<E, D, S> {
    enable: E,
    direction: D,
    step: S,
}

impl<E: OutputPin, D: OutputPin, S: OutputPin> EhStepPins<E, D, S> {
    /// All three lines are driven low at construction, so the motor driver
    /// starts released.
    pub fn new(mut enable: E, mut direction: D, mut step: S) -> Self {
        set_level(&mut enable, false);
        set_level(&mut direction, false);
        set_level(&mut step, false);
        Self {
            enable,
            direction,
            step,
        }
    }
}

impl<E: OutputPin, D: OutputPin, S: OutputPin> StepPins for EhStepPins<E, D, S> {
    fn set_enable(&mut self, on: bool) {
        set_level(&mut self.enable, on);
    }

    fn set_direction(&mut self, forward: bool) {
        set_level(&mut self.direction, forward);
    }

    fn set_step(&mut self, high: bool) {
        set_level(&mut self.step, high);
    }
}

fn set_level<P: OutputPin>(pin: &mut P, high: bool) {
    let result = if high { pin.set_high() } else { pin.set_low() };
    result.ok();
}
