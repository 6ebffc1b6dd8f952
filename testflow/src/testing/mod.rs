//! Testing utilities for testflow suites.
//!
//! This module provides:
//! - In-memory transports
//! - Recording actions
//! - Assertions on test results

mod actions;
mod assertions;
mod transports;

pub use actions::RecordingAction;
pub use assertions::{assert_test_failed_with, assert_test_succeeded};
pub use transports::{EchoTransport, RecordingTransport};
