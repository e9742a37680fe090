//! Switched output ("Led") devices.
//!
//! The simplest hosted device: an on/off line driven from a stored enable
//! state. Inversion for active-low wiring is applied when the control
//! request is accepted, so the stored state is always the physical level.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::app::ports::EnableLine;

/// Cross-thread LED state: the HTTP handler writes, the control loop reads.
#[derive(Debug)]
pub struct LedShared {
    enabled: AtomicBool,
}

impl LedShared {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
        }
    }

    pub fn submit(&self, on: bool) {
        self.enabled.store(on, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl Default for LedShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Control-loop side: refresh the output line from the stored state.
pub struct LedController;

impl LedController {
    pub fn tick(shared: &LedShared, line: &mut impl EnableLine) {
        line.set_enabled(shared.is_enabled());
    }
}
