//! # Task abstractions and composition.
//!
//! This module provides the typed task surface:
//! - [`Task<I, R>`] - immutable descriptor of a unit of work with input
//!   type `I` and result type `R`; `()` is the void marker
//! - [`Task::simple`] - wraps a user callable bound to a runner
//! - [`Task::then`] - sequential composition (the chain rule is the type
//!   system: a stage's result type is the next stage's input type)
//! - [`parallel2`]/[`parallel3`]/[`parallel4`] - common-input fan-out with a
//!   tuple result of fixed arity; void slots hold `()`
//! - [`if_then`]/[`if_then_else`] - conditional composition
//! - [`repeat`] - counted loop feeding the body its iteration index
//! - [`intercept`]/[`Handler`] - error interception along the chain
//!
//! ## Rules
//! - Tasks are values: cheap to clone, free of runtime state; each `run()`
//!   materialises fresh frames.
//! - Ill-typed compositions are rejected at compile time; no ill-typed
//!   composition ever runs.

mod combinators;
mod node;
mod task;

pub use combinators::{
    if_then, if_then_else, intercept, parallel2, parallel3, parallel4, repeat, Handler,
};
pub use task::Task;
