//! # Frame: one in-flight task instance.
//!
//! A [`Frame`] is the runtime object materialised when a task is entered:
//! it knows its target runner, its entry point, and whether the entry point
//! still executes when an error is travelling down the stack.
//!
//! Result passing is untyped at this level: the in-flight value is a
//! [`Value`] (`Box<dyn Any + Send>`) and the slot threading values between
//! frames is an [`Outcome`], either a produced value or the error standing
//! in for an exception. The typed combinators in `tasks/` bake the casts
//! into each entry point, so a mismatch can only arise from a library bug,
//! never from user code that type-checked.

use std::any::Any;

use crate::error::TaskError;
use crate::runtime::runner::RunnerRef;
use crate::runtime::stack::ContextStack;

/// An erased in-flight value.
pub(crate) type Value = Box<dyn Any + Send>;

/// A produced value or the error propagating in its place.
pub(crate) type Outcome = Result<Value, TaskError>;

/// Entry point invoked when the frame reaches the top of the stack.
///
/// Receives the stack (to push children and set the next value) and the
/// in-flight outcome left by the previously popped frame.
pub(crate) type EnterFn = Box<dyn FnOnce(&mut ContextStack, Outcome) + Send>;

/// One in-flight task instance.
///
/// Frames live inside a [`ContextStack`] and are destroyed as they are
/// popped; they migrate between runners together with the stack.
pub(crate) struct Frame {
    /// Runner that must execute this frame's entry point.
    pub(crate) runner: RunnerRef,
    /// Context type name, for debugging.
    pub(crate) label: &'static str,
    /// Whether the entry point executes when the in-flight outcome is an
    /// error. Frames that do not catch are skipped during unwinding.
    pub(crate) catches: bool,
    /// The entry point.
    pub(crate) enter: EnterFn,
}

impl Frame {
    /// Creates a frame whose entry point only runs on a success value.
    pub(crate) fn new(runner: RunnerRef, label: &'static str, enter: EnterFn) -> Self {
        Self {
            runner,
            label,
            catches: false,
            enter,
        }
    }

    /// Creates a frame whose entry point also runs on an error in flight
    /// (synchronisation and intercept frames).
    pub(crate) fn catching(runner: RunnerRef, label: &'static str, enter: EnterFn) -> Self {
        Self {
            runner,
            label,
            catches: true,
            enter,
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("label", &self.label)
            .field("catches", &self.catches)
            .finish()
    }
}

/// The void marker: the value occupying the slot of a void-producing stage.
pub(crate) fn unit() -> Value {
    Box::new(())
}

/// Error raised when an erased value fails to cast back to its static type.
///
/// Unreachable through the typed composition API; kept as a propagated
/// error rather than a panic so a library bug cannot take a runner down.
pub(crate) fn type_mismatch(label: &'static str) -> TaskError {
    TaskError::Failed {
        reason: format!("internal: result type mismatch in {label} frame"),
    }
}
