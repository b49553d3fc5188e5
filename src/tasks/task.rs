//! # Task: immutable, typed descriptor of a unit of work.
//!
//! A [`Task<I, R>`] consumes an `I` and produces an `R`; `()` is the void
//! marker for stages that produce or consume nothing. Tasks are values:
//! cloning shares the underlying composition tree, and no task holds
//! mutable runtime state; every [`Task::run`] materialises fresh frames.
//!
//! ## Chain rule
//! Sequential composition threads result types through the chain, so the
//! rule `Tᵢ.R = Tᵢ₊₁.I` is simply [`Task::then`]'s signature; a mismatched
//! chain does not compile.
//!
//! ## Example
//! ```
//! use taskline::{Runner, Task, TaskError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), TaskError> {
//!     let runner = Runner::new("worker");
//!
//!     let inc = Task::simple(&runner, "inc", |x: i32| Ok(x + 1));
//!     let render = Task::simple(&runner, "render", |x: i32| Ok(x.to_string()));
//!
//!     let chain = inc.then(render);
//!     assert_eq!(chain.run(41).await?, "42");
//!     Ok(())
//! }
//! ```

use std::borrow::Cow;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::error::TaskError;
use crate::runtime::{launch, type_mismatch, Runner, Value};
use crate::tasks::node::{CallFn, Node, SimpleNode};

/// Immutable descriptor of a unit of work with input type `I` and result
/// type `R`.
///
/// Built by [`Task::simple`] and grown with the composition operators; see
/// the [module docs](crate::tasks) for the full set.
pub struct Task<I, R> {
    node: Arc<Node>,
    _types: PhantomData<fn(I) -> R>,
}

// Manual impl: task values are cheap handles regardless of `I`/`R`.
impl<I, R> Clone for Task<I, R> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
            _types: PhantomData,
        }
    }
}

impl<I, R> Task<I, R>
where
    I: Send + 'static,
    R: Send + 'static,
{
    /// Wraps a user callable bound to a runner.
    ///
    /// The callable runs to completion on `runner`, never yielding
    /// mid-execution; a long computation inside it stalls that runner's
    /// queue. A panicking callable is contained and surfaces as
    /// [`TaskError::Failed`].
    pub fn simple<F>(runner: &Runner, name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(I) -> Result<R, TaskError> + Send + Sync + 'static,
    {
        let call: CallFn = Arc::new(move |value: Value| {
            let input = value.downcast::<I>().map_err(|_| type_mismatch("simple"))?;
            match std::panic::catch_unwind(AssertUnwindSafe(|| f(*input))) {
                Ok(result) => result.map(|r| Box::new(r) as Value),
                Err(_) => Err(TaskError::failed("task callable panicked")),
            }
        });

        Self::from_node(Arc::new(Node::Simple(SimpleNode {
            name: name.into(),
            runner: runner.downgrade(),
            call,
        })))
    }

    /// Sequential composition: `self` first, then `next` consuming `self`'s
    /// result.
    ///
    /// Each stage executes on its own target runner; the scheduler re-homes
    /// the context stack between stages. An error aborts the remaining
    /// stages and becomes the chain's error.
    ///
    /// Nested chains flatten, so `a.then(b).then(c)` is one sequence of
    /// three stages.
    ///
    /// A mismatched chain does not compile:
    /// ```compile_fail
    /// use taskline::{Runner, Task};
    ///
    /// fn ill_typed(r: &Runner) {
    ///     let to_text = Task::simple(r, "to-text", |x: i32| Ok(x.to_string()));
    ///     let inc = Task::simple(r, "inc", |x: i32| Ok(x + 1));
    ///     let _bad = to_text.then(inc); // a String result cannot feed an i32 input
    /// }
    /// ```
    pub fn then<R2>(self, next: Task<R, R2>) -> Task<I, R2>
    where
        R2: Send + 'static,
    {
        let mut children: Vec<Arc<Node>> = Vec::new();
        match &*self.node {
            Node::Sequence(c) => children.extend(c.iter().cloned()),
            _ => children.push(Arc::clone(&self.node)),
        }
        match &*next.node {
            Node::Sequence(c) => children.extend(c.iter().cloned()),
            _ => children.push(Arc::clone(&next.node)),
        }
        Task::from_node(Arc::new(Node::Sequence(children)))
    }

    /// Schedules the task with `input` and awaits its result.
    ///
    /// The root frame is submitted to the task's target runner; the await
    /// completes when the context stack is exhausted. If every runner the
    /// stack needs has been released before then, the result is
    /// [`TaskError::RunnerGone`].
    pub async fn run(&self, input: I) -> Result<R, TaskError> {
        let receiver = launch(self.node.frame(), self.node.name(), Box::new(input));
        match receiver.await {
            Ok(Ok(value)) => value
                .downcast::<R>()
                .map(|boxed| *boxed)
                .map_err(|_| type_mismatch("run")),
            Ok(Err(e)) => Err(e),
            // The stack was discarded together with its runner.
            Err(_) => Err(TaskError::RunnerGone),
        }
    }

    pub(crate) fn from_node(node: Arc<Node>) -> Self {
        Self {
            node,
            _types: PhantomData,
        }
    }

    pub(crate) fn into_node(self) -> Arc<Node> {
        self.node
    }
}

impl<I, R> std::fmt::Debug for Task<I, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("name", &self.node.name()).finish()
    }
}
