//! `nodes` crate — the `NodeHandler` trait, the handler registry, and the
//! built-in provider-free handlers.
//!
//! Every node — built-in and external integration alike — must implement
//! [`NodeHandler`].  The engine crate dispatches execution through this
//! trait object via the [`HandlerRegistry`].

pub mod builtin;
pub mod error;
pub mod mock;
pub mod node;
pub mod registry;
pub mod traits;

pub use error::NodeError;
pub use node::{Node, TriggerSource};
pub use registry::{FailurePolicy, HandlerKind, HandlerMeta, HandlerRegistry, Registration};
pub use traits::{NodeHandler, RunContext};
