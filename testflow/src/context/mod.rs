//! Execution contexts for test runs.
//!
//! This module provides:
//! - The [`TestContext`] passed through the action tree
//! - Shared or isolated derivation of branch contexts

#[cfg(test)]
mod context_tests;
mod test_context;

pub use test_context::TestContext;
