//! # Scheduler: drives context stacks across runners.
//!
//! One `run()` call produces one stack; the scheduler ships that stack
//! between runner queues until it is exhausted.
//!
//! ## Flow
//! ```text
//! launch(root, input)
//!   └─► submit(stack)
//!          ├─ unwind: drop frames skipped by an error in flight
//!          ├─ stack empty       → finish (deliver result/error)
//!          ├─ top runner gone   → error in flight = RunnerGone, retry
//!          └─ post step(stack) to the top frame's runner
//!
//! step(stack)                 (executes on the top frame's runner)
//!   ├─ pop top frame, invoke its entry point
//!   │    └─ entry point may push children and sets the next value
//!   └─ stack empty ? finish : submit(stack)
//! ```
//!
//! ## Rules
//! - One frame per runner turn: after every entry point the stack is
//!   re-submitted, so work interleaves fairly with other jobs queued on the
//!   same runner and migrates whenever the next frame targets another one.
//! - A dead target runner turns into a `RunnerGone` error in flight, which
//!   an enclosing intercept on a live runner may still catch.
//! - A stack dropped by a dying runner never delivers; the `run()` awaiter
//!   observes the closed channel as `RunnerGone`.

use tokio::sync::oneshot;

use crate::error::TaskError;
use crate::events::{Event, EventKind};
use crate::runtime::frame::{Frame, Outcome, Value};
use crate::runtime::stack::ContextStack;

/// Materialises a stack for `root`, seeds it with `input`, and submits it.
///
/// Returns the receiver the `run()` awaiter listens on.
pub(crate) fn launch(root: Frame, task: &str, input: Value) -> oneshot::Receiver<Outcome> {
    let (tx, rx) = oneshot::channel();

    let bus = root.runner.upgrade().and_then(|r| r.bus().cloned());
    if let Some(bus) = &bus {
        bus.publish(Event::now(EventKind::RunStarted).with_name(task));
    }

    let mut stack = Box::new(ContextStack::new(task.to_string(), bus, tx));
    stack.push(root);
    stack.set_value(Ok(input));
    submit(stack);

    rx
}

/// Ships the stack to the runner of its top frame.
///
/// Callable from any thread; the stack itself is only inspected, never
/// stepped, outside its runner.
pub(crate) fn submit(mut stack: Box<ContextStack>) {
    loop {
        stack.unwind();

        let target = match stack.top() {
            Some(top) => top.runner.clone(),
            None => {
                stack.finish();
                return;
            }
        };

        match target.upgrade() {
            Some(runner) => {
                // If the runner dies between the upgrade and the dequeue,
                // the job is discarded and the awaiter sees RunnerGone
                // through the closed completion channel.
                let _ = runner.post(async move { step(stack) });
                return;
            }
            None => {
                // The frame can never execute; drop it and let the error
                // travel on. A catching frame further down, on a runner
                // that is still alive, may yet handle it.
                stack.pop();
                if !stack.value_is_err() {
                    stack.set_value(Err(TaskError::RunnerGone));
                }
            }
        }
    }
}

/// Executes one frame. Runs on the frame's target runner.
fn step(mut stack: Box<ContextStack>) {
    let Some(frame) = stack.pop() else {
        stack.finish();
        return;
    };

    let value = stack.take_value();
    (frame.enter)(&mut stack, value);

    if stack.is_empty() {
        stack.finish();
    } else {
        submit(stack);
    }
}
