//! Common utilities for the USB device emulator
//!
//! This crate provides functionality shared between the emulator library,
//! its driver binary and the test suites: the shared error type, logging
//! setup, and envelope fixtures for tests.

pub mod error;
pub mod logging;
pub mod test_utils;

pub use error::{Error, Result};
pub use logging::setup_logging;
