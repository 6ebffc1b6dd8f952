//! Reusable named action sequences.
//!
//! A template is invoked with parameters that are bound as variables before
//! its body runs. With `global_context` set the body writes into the caller's
//! store; otherwise it runs against a snapshot copy and its writes vanish
//! when it returns.

mod registry;
mod template;

pub use registry::TemplateRegistry;
pub use template::{Template, TemplateParameter};
