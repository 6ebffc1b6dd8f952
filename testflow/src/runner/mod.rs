//! Test case execution.
//!
//! This module provides:
//! - [`TestCase`]: initial variables plus a top-level action sequence
//! - [`TestResult`]: the outcome of one run
//! - [`TestRunner`]: owns the registries and runs test cases

mod result;
mod test_runner;

pub use result::TestResult;
pub use test_runner::{TestCase, TestRunner};
