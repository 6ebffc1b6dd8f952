//! Action descriptors.
//!
//! A front-end hands over a test as a serde-deserializable descriptor tree.
//! [`ActionSpec::build`] turns each descriptor into an executable action,
//! looking endpoints up in the run's registry.

mod spec;

pub use spec::{ActionSpec, BuildEnv, TemplateSpec, TestCaseSpec};
