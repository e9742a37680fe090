//! Actuator-side control: setpoint ramping, pulse-train planning, and
//! switched outputs.

pub mod led;
pub mod stepper;

pub use led::{LedController, LedShared};
pub use stepper::{Drive, StepperController, StepperShared};
