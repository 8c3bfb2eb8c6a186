//! Driving the external CAD applications.
//!
//! This module provides:
//! - Executable discovery from wildcard install paths
//! - The launch → wait → act → capture → close driver
//! - Keystroke injection via `SendInput` (Windows only)

pub mod discovery;
pub mod driver;
#[cfg(windows)]
pub mod input;

pub use discovery::resolve_executable;
pub use driver::{launch_and_drive, CaptureTask, DriveOutcome};
