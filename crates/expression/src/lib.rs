//! `expression` crate — path lookup, `{{ }}` template interpolation, and
//! condition evaluation over JSON records.
//!
//! Pure functions, no state, no I/O.  Node handlers resolve their
//! templated configuration through this crate.

pub mod condition;
pub mod path;
pub mod template;

pub use condition::{evaluate_condition, Condition, Operator};
pub use path::resolve_path;
pub use template::{interpolate, interpolate_deep};
