//! # Context stack: the per-`run()` LIFO of frames.
//!
//! Each `run()` call creates one [`ContextStack`], which is then
//! (re)submitted to runner queues for as long as unfinished frames remain.
//! The stack carries the in-flight value slot shared by all its frames and
//! the oneshot channel that delivers the final outcome to the awaiter.
//!
//! ## Rules
//! - The stack is only touched from within the runner currently executing
//!   it; serialisation is by construction, no locking needed.
//! - The top frame's runner decides where the next step executes.
//! - Terminal state: empty. At that point [`ContextStack::finish`] delivers
//!   the root's result or error.

use tokio::sync::oneshot;

use crate::events::{Bus, Event, EventKind};
use crate::runtime::frame::{unit, Frame, Outcome};

/// LIFO of frames rooted at one `run()` call.
pub(crate) struct ContextStack {
    frames: Vec<Frame>,
    /// Slot holding the most recently produced result or error.
    value: Option<Outcome>,
    /// Delivery channel for the root result; consumed by `finish`.
    done: Option<oneshot::Sender<Outcome>>,
    /// Root task name, carried for run-lifecycle events.
    task: String,
    bus: Option<Bus>,
}

impl ContextStack {
    pub(crate) fn new(task: String, bus: Option<Bus>, done: oneshot::Sender<Outcome>) -> Self {
        Self {
            frames: Vec::new(),
            value: None,
            done: Some(done),
            task,
            bus,
        }
    }

    /// Pushes a frame on top of the stack.
    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Removes and returns the top frame.
    pub(crate) fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Returns the top frame without removing it.
    pub(crate) fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Stores the in-flight outcome consumed by the next frame.
    pub(crate) fn set_value(&mut self, value: Outcome) {
        self.value = Some(value);
    }

    /// Takes the in-flight outcome; a missing value reads as void.
    pub(crate) fn take_value(&mut self) -> Outcome {
        self.value.take().unwrap_or_else(|| Ok(unit()))
    }

    /// Whether the in-flight outcome is an error.
    pub(crate) fn value_is_err(&self) -> bool {
        matches!(self.value, Some(Err(_)))
    }

    /// Discards frames that will not execute for the error in flight.
    ///
    /// Stops at the first catching frame (a synchronisation or intercept
    /// frame), which gets the error as its input instead.
    pub(crate) fn unwind(&mut self) {
        while self.value_is_err() {
            match self.frames.last() {
                Some(frame) if !frame.catches => {
                    self.frames.pop();
                }
                _ => break,
            }
        }
    }

    /// Delivers the final outcome to the awaiter and publishes the
    /// run-lifecycle event.
    pub(crate) fn finish(mut self: Box<Self>) {
        let outcome = self.take_value();

        if let Some(bus) = &self.bus {
            let ev = match &outcome {
                Ok(_) => Event::now(EventKind::RunCompleted).with_name(&self.task),
                Err(e) => Event::now(EventKind::RunFailed)
                    .with_name(&self.task)
                    .with_error(e.to_string()),
            };
            bus.publish(ev);
        }

        if let Some(done) = self.done.take() {
            // A dropped awaiter is fine; the result is simply discarded.
            let _ = done.send(outcome);
        }
    }
}

impl std::fmt::Debug for ContextStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextStack")
            .field("task", &self.task)
            .field("depth", &self.frames.len())
            .finish()
    }
}
