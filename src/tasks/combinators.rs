//! # Composition operators.
//!
//! Free functions building composite [`Task`]s out of smaller ones. All
//! typing is enforced by the signatures: a predicate must produce `bool`, a
//! repeat counter must produce `u64`, parallel children must share an input
//! type, and intercept handlers must produce the body's result type.
//!
//! Sequential composition lives on the task itself as [`Task::then`].

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{ErrorKind, TaskError};
use crate::runtime::{type_mismatch, Outcome, Value};
use crate::tasks::node::{
    BranchNode, CloneFn, GatherFn, HandlerNode, InterceptNode, Node, ParallelNode, RepeatNode,
};
use crate::tasks::task::Task;

/// Clone glue for the erased common input of parallel/conditional nodes.
fn clone_value<I>() -> CloneFn
where
    I: Clone + Send + 'static,
{
    Arc::new(|value: &Value| {
        value
            .downcast_ref::<I>()
            .map(|v| Box::new(v.clone()) as Value)
            .ok_or_else(|| type_mismatch("clone"))
    })
}

/// Pulls the next child result out of the gather sequence and restores its
/// static type.
fn take_slot<T>(values: &mut std::vec::IntoIter<Value>) -> Result<T, TaskError>
where
    T: 'static,
{
    values
        .next()
        .ok_or_else(|| type_mismatch("parallel"))?
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| type_mismatch("parallel"))
}

macro_rules! parallel_arity {
    ($(#[$doc:meta])* $name:ident => $($T:ident / $t:ident),+) => {
        $(#[$doc])*
        pub fn $name<I, $($T),+>($($t: Task<I, $T>),+) -> Task<I, ($($T,)+)>
        where
            I: Clone + Send + 'static,
            $($T: Send + 'static,)+
        {
            let children = vec![$($t.into_node()),+];
            let gather: GatherFn = Arc::new(|results: Vec<Outcome>| {
                let mut values = Vec::with_capacity(results.len());
                for result in results {
                    // First failure in composition order becomes the
                    // aggregate outcome; later children have already run.
                    values.push(result?);
                }
                let mut values = values.into_iter();
                Ok(Box::new(($(take_slot::<$T>(&mut values)?,)+)) as Value)
            });

            Task::from_node(Arc::new(Node::Parallel(ParallelNode {
                children,
                clone_input: clone_value::<I>(),
                gather,
            })))
        }
    };
}

parallel_arity! {
    /// Runs two tasks with the same input; the result is the pair of their
    /// results, in composition order.
    parallel2 => R1/a, R2/b
}

parallel_arity! {
    /// Runs three tasks with the same input; the result tuple has fixed
    /// arity three, with `()` occupying the slot of any void-producing
    /// child.
    ///
    /// ## Example
    /// ```
    /// use taskline::{parallel3, Runner, Task, TaskError};
    ///
    /// #[tokio::main(flavor = "current_thread")]
    /// async fn main() -> Result<(), TaskError> {
    ///     let r = Runner::new("worker");
    ///     let double = Task::simple(&r, "double", |x: i32| Ok(x * 2));
    ///     let log = Task::simple(&r, "log", |_x: i32| Ok(()));
    ///     let inc = Task::simple(&r, "inc", |x: i32| Ok(x + 1));
    ///
    ///     let fan = parallel3(double, log, inc);
    ///     assert_eq!(fan.run(10).await?, (20, (), 11));
    ///     Ok(())
    /// }
    /// ```
    parallel3 => R1/a, R2/b, R3/c
}

parallel_arity! {
    /// Runs four tasks with the same input; the result is the quadruple of
    /// their results, in composition order.
    parallel4 => R1/a, R2/b, R3/c, R4/d
}

/// Conditional composition without an else-branch.
///
/// The predicate runs first with the conditional's input; on `true` the
/// body runs with a copy of the same input. Because nothing runs on
/// `false`, the body must be void-producing and the conditional's result
/// is void.
pub fn if_then<I>(predicate: Task<I, bool>, then: Task<I, ()>) -> Task<I, ()>
where
    I: Clone + Send + 'static,
{
    Task::from_node(Arc::new(Node::Branch(BranchNode {
        predicate: predicate.into_node(),
        then: then.into_node(),
        otherwise: None,
        clone_input: clone_value::<I>(),
    })))
}

/// Conditional composition with an else-branch; both branches consume the
/// conditional's input and produce the same result type.
pub fn if_then_else<I, R>(
    predicate: Task<I, bool>,
    then: Task<I, R>,
    otherwise: Task<I, R>,
) -> Task<I, R>
where
    I: Clone + Send + 'static,
    R: Send + 'static,
{
    Task::from_node(Arc::new(Node::Branch(BranchNode {
        predicate: predicate.into_node(),
        then: then.into_node(),
        otherwise: Some(otherwise.into_node()),
        clone_input: clone_value::<I>(),
    })))
}

/// Counted loop: the counter task consumes the repeat's input and yields
/// the iteration count; the body then runs once per index `0..count`.
/// The repeat itself is void-producing.
pub fn repeat<I>(counter: Task<I, u64>, body: Task<u64, ()>) -> Task<I, ()>
where
    I: Send + 'static,
{
    Task::from_node(Arc::new(Node::Repeat(RepeatNode {
        counter: counter.into_node(),
        body: body.into_node(),
    })))
}

/// An intercept handler: a task consuming the caught [`TaskError`] and
/// producing the intercepted body's result type.
pub struct Handler<R> {
    matches: Option<ErrorKind>,
    node: Arc<Node>,
    _result: PhantomData<fn() -> R>,
}

impl<R> Handler<R>
where
    R: Send + 'static,
{
    /// Handles errors of one [`ErrorKind`].
    pub fn on(kind: ErrorKind, task: Task<TaskError, R>) -> Self {
        Self {
            matches: Some(kind),
            node: task.into_node(),
            _result: PhantomData,
        }
    }

    /// Handles every error kind. Place after more specific handlers: the
    /// first registered match wins.
    pub fn any(task: Task<TaskError, R>) -> Self {
        Self {
            matches: None,
            node: task.into_node(),
            _result: PhantomData,
        }
    }
}

/// Error interception along a chain.
///
/// Runs `body`; if it finishes with an error whose kind matches one of the
/// handlers, that handler runs with the error value as its input and its
/// result becomes the composite's result. An unmatched error propagates
/// unchanged.
///
/// ## Example
/// ```
/// use taskline::{intercept, ErrorKind, Handler, Runner, Task, TaskError};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), TaskError> {
///     let r = Runner::new("worker");
///
///     let flaky = Task::simple(&r, "flaky", |_: u32| -> Result<String, TaskError> {
///         Err(TaskError::connection(std::io::Error::from(
///             std::io::ErrorKind::ConnectionRefused,
///         )))
///     });
///     let recover = Task::simple(&r, "recover", |_e: TaskError| Ok("recovered".to_string()));
///
///     let guarded = intercept(flaky, vec![Handler::on(ErrorKind::Connection, recover)]);
///     assert_eq!(guarded.run(7).await?, "recovered");
///     Ok(())
/// }
/// ```
pub fn intercept<I, R>(body: Task<I, R>, handlers: Vec<Handler<R>>) -> Task<I, R>
where
    I: Send + 'static,
    R: Send + 'static,
{
    let handlers = handlers
        .into_iter()
        .map(|h| HandlerNode {
            matches: h.matches,
            node: h.node,
        })
        .collect();

    Task::from_node(Arc::new(Node::Intercept(InterceptNode {
        body: body.into_node(),
        handlers,
    })))
}
