//! Runtime core: serial runners and the execution-context stack machine.
//!
//! ## Files & responsibilities
//! - **runner.rs**: [`Runner`] - a named serial execution context draining a
//!   FIFO of posted jobs; [`RunnerRef`] - the weak handle frames and event
//!   sources hold so a dropped runner does not stay alive through them.
//! - **frame.rs**: [`Frame`] - one in-flight task instance: target runner,
//!   entry point, and whether it still executes while an error is in flight.
//! - **stack.rs**: [`ContextStack`] - the per-`run()` LIFO of frames plus the
//!   in-flight value slot and the completion channel.
//! - **scheduler.rs**: `submit`/`step`: drives a stack across runners,
//!   migrating it whenever the top frame targets a different runner, and
//!   unwinding non-catching frames when an error is in flight.
//!
//! ## Wiring (module-level flow)
//! ```text
//! Task::run(input)
//!   └─ scheduler::launch(root frame, input)
//!        └─ submit(stack) ──► top frame's runner queue
//!                                  │  (serial job loop)
//!                                  ▼
//!                               step(stack)
//!                                  ├─ pop top frame, invoke entry point
//!                                  │    └─ may push child frames / set value
//!                                  └─ stack empty? deliver result : submit(stack)
//! ```
//!
//! A frame's entry point never yields; cooperative hand-off happens at frame
//! boundaries through stack re-submission. Any long computation inside a
//! callable blocks that runner's queue.

mod frame;
mod runner;
mod scheduler;
mod stack;

pub use runner::{Runner, RunnerRef};

pub(crate) use frame::{type_mismatch, unit, Frame, Outcome, Value};
pub(crate) use scheduler::launch;
pub(crate) use stack::ContextStack;
