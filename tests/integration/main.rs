//! Integration test driver for `tests/integration/`.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters. All tests run on the host (x86_64) with no real
//! hardware or network required.

mod dispatch_tests;
mod end_to_end_tests;
mod locator_tests;
