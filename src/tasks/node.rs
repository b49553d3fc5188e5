//! # Erased composition tree.
//!
//! A [`Node`] is the runtime shape of a task: the typed [`Task<I, R>`]
//! facade wraps an `Arc<Node>` and bakes every cast between the static
//! types and the erased in-flight [`Value`] into glue closures at
//! composition time. By the time a node executes, type errors are
//! impossible for code that compiled; the `type_mismatch` fallbacks exist
//! so that a library bug degrades into a propagated error instead of a
//! panic on somebody's runner.
//!
//! Entering a node materialises its frames onto the context stack:
//!
//! ```text
//! sequence    [T1, T2, T3]  → push T3, T2, T1        (T1 pops first)
//! parallel    {T1, T2}      → push gather, collect(1), T2, collect(0), T1
//! conditional (P, T [, E])  → push decision, P
//! repeat      (C, B)        → push driver, C; driver pushes B per index
//! intercept   (B, H…)       → push catch, B
//! ```
//!
//! Collect, gather, and catch frames are *catching*: they still execute
//! when the value in flight is an error, which is how parallel children all
//! run to completion and how intercept handlers receive their input.
//!
//! [`Task<I, R>`]: crate::Task

use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use crate::error::ErrorKind;
use crate::runtime::{type_mismatch, unit, ContextStack, Frame, Outcome, RunnerRef, Value};

/// User callable with the casts baked in.
pub(crate) type CallFn = Arc<dyn Fn(Value) -> Outcome + Send + Sync>;
/// Clones the erased common input of a parallel/conditional node.
pub(crate) type CloneFn = Arc<dyn Fn(&Value) -> Outcome + Send + Sync>;
/// Assembles child outcomes into the parallel tuple.
pub(crate) type GatherFn = Arc<dyn Fn(Vec<Outcome>) -> Outcome + Send + Sync>;

/// Runtime shape of a task. One node per composition-tree position; shared
/// freely between task values.
pub(crate) enum Node {
    Simple(SimpleNode),
    Sequence(Vec<Arc<Node>>),
    Parallel(ParallelNode),
    Branch(BranchNode),
    Repeat(RepeatNode),
    Intercept(InterceptNode),
}

pub(crate) struct SimpleNode {
    pub(crate) name: Cow<'static, str>,
    pub(crate) runner: RunnerRef,
    pub(crate) call: CallFn,
}

pub(crate) struct ParallelNode {
    pub(crate) children: Vec<Arc<Node>>,
    pub(crate) clone_input: CloneFn,
    pub(crate) gather: GatherFn,
}

pub(crate) struct BranchNode {
    pub(crate) predicate: Arc<Node>,
    pub(crate) then: Arc<Node>,
    pub(crate) otherwise: Option<Arc<Node>>,
    pub(crate) clone_input: CloneFn,
}

pub(crate) struct RepeatNode {
    pub(crate) counter: Arc<Node>,
    pub(crate) body: Arc<Node>,
}

pub(crate) struct InterceptNode {
    pub(crate) body: Arc<Node>,
    pub(crate) handlers: Vec<HandlerNode>,
}

#[derive(Clone)]
pub(crate) struct HandlerNode {
    /// `None` handles every error kind.
    pub(crate) matches: Option<ErrorKind>,
    pub(crate) node: Arc<Node>,
}

impl HandlerNode {
    fn handles(&self, kind: ErrorKind) -> bool {
        self.matches.map_or(true, |k| k == kind)
    }
}

impl Node {
    /// The runner this node's first frame targets. Composites inherit from
    /// the child that executes first.
    pub(crate) fn runner(&self) -> RunnerRef {
        match self {
            Node::Simple(s) => s.runner.clone(),
            Node::Sequence(children) => children[0].runner(),
            Node::Parallel(p) => p.children[0].runner(),
            Node::Branch(b) => b.predicate.runner(),
            Node::Repeat(r) => r.counter.runner(),
            Node::Intercept(i) => i.body.runner(),
        }
    }

    /// Name used in run-lifecycle events.
    pub(crate) fn name(&self) -> &str {
        match self {
            Node::Simple(s) => &s.name,
            _ => self.label(),
        }
    }

    /// Context type name, for debugging.
    fn label(&self) -> &'static str {
        match self {
            Node::Simple(_) => "simple",
            Node::Sequence(_) => "sequence",
            Node::Parallel(_) => "parallel",
            Node::Branch(_) => "conditional",
            Node::Repeat(_) => "repeat",
            Node::Intercept(_) => "intercept",
        }
    }

    /// Materialises the frame that enters this node.
    pub(crate) fn frame(self: &Arc<Self>) -> Frame {
        let node = Arc::clone(self);
        Frame::new(
            self.runner(),
            self.label(),
            Box::new(move |stack, value| node.enter(stack, value)),
        )
    }

    fn enter(self: Arc<Self>, stack: &mut ContextStack, value: Outcome) {
        let input = match value {
            Ok(v) => v,
            // Unreachable: non-catching frames are unwound past on error.
            Err(e) => {
                stack.set_value(Err(e));
                return;
            }
        };

        match &*self {
            Node::Simple(s) => stack.set_value((s.call)(input)),
            Node::Sequence(children) => {
                for child in children.iter().rev() {
                    stack.push(child.frame());
                }
                stack.set_value(Ok(input));
            }
            Node::Parallel(p) => p.enter(stack, input),
            Node::Branch(b) => b.enter(stack, input),
            Node::Repeat(r) => r.enter(stack, input),
            Node::Intercept(i) => i.enter(stack, input),
        }
    }
}

impl ParallelNode {
    /// Pushes every child interleaved with collect frames, with one gather
    /// frame at the bottom.
    ///
    /// Children execute in composition order, each on its own runner; the
    /// collect frames store each child's outcome and re-seed the common
    /// input for the next child. The gather frame runs once every child has
    /// either produced a result or failed, so a failing child never aborts
    /// its siblings; the first failure in composition order becomes the
    /// aggregate outcome.
    fn enter(&self, stack: &mut ContextStack, input: Value) {
        let n = self.children.len();
        let results: Arc<Mutex<Vec<Option<Outcome>>>> =
            Arc::new(Mutex::new((0..n).map(|_| None).collect()));
        let home = self.children[0].runner();

        let gather = Arc::clone(&self.gather);
        let gather_slots = Arc::clone(&results);
        stack.push(Frame::catching(
            home.clone(),
            "parallel",
            Box::new(move |stack, _| {
                let collected: Vec<Outcome> = {
                    let mut guard = match gather_slots.lock() {
                        Ok(g) => g,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    guard
                        .drain(..)
                        .map(|slot| slot.unwrap_or_else(|| Err(type_mismatch("parallel"))))
                        .collect()
                };
                stack.set_value(gather(collected));
            }),
        ));

        for i in (0..n).rev() {
            let next_input = if i + 1 < n {
                match (self.clone_input)(&input) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        stack.set_value(Err(e));
                        return;
                    }
                }
            } else {
                None
            };
            let collect_runner = if i + 1 < n {
                self.children[i + 1].runner()
            } else {
                home.clone()
            };

            let slots = Arc::clone(&results);
            stack.push(Frame::catching(
                collect_runner,
                "parallel",
                Box::new(move |stack, outcome| {
                    {
                        let mut guard = match slots.lock() {
                            Ok(g) => g,
                            Err(poisoned) => poisoned.into_inner(),
                        };
                        guard[i] = Some(outcome);
                    }
                    match next_input {
                        Some(v) => stack.set_value(Ok(v)),
                        None => stack.set_value(Ok(unit())),
                    }
                }),
            ));
            stack.push(self.children[i].frame());
        }

        stack.set_value(Ok(input));
    }
}

impl BranchNode {
    /// Runs the predicate first; its boolean result decides which branch
    /// frame is pushed with a copy of the original input.
    fn enter(&self, stack: &mut ContextStack, input: Value) {
        let kept = match (self.clone_input)(&input) {
            Ok(v) => v,
            Err(e) => {
                stack.set_value(Err(e));
                return;
            }
        };

        let then = Arc::clone(&self.then);
        let otherwise = self.otherwise.clone();
        stack.push(Frame::new(
            self.then.runner(),
            "conditional",
            Box::new(move |stack, predicate| {
                let flag = predicate
                    .and_then(|v| v.downcast::<bool>().map_err(|_| type_mismatch("conditional")));
                match flag {
                    Ok(flag) if *flag => {
                        stack.push(then.frame());
                        stack.set_value(Ok(kept));
                    }
                    Ok(_) => match otherwise {
                        Some(e) => {
                            stack.push(e.frame());
                            stack.set_value(Ok(kept));
                        }
                        // No else-branch: the conditional produces void.
                        None => stack.set_value(Ok(unit())),
                    },
                    Err(e) => stack.set_value(Err(e)),
                }
            }),
        ));
        stack.push(self.predicate.frame());
        stack.set_value(Ok(input));
    }
}

impl RepeatNode {
    /// Runs the counter with the repeat's input; its result decides how
    /// many body frames are pushed, each fed its iteration index.
    fn enter(&self, stack: &mut ContextStack, input: Value) {
        let body = Arc::clone(&self.body);
        stack.push(Frame::new(
            self.body.runner(),
            "repeat",
            Box::new(move |stack, count| {
                let count =
                    count.and_then(|v| v.downcast::<u64>().map_err(|_| type_mismatch("repeat")));
                match count {
                    Ok(count) => {
                        for i in (0..*count).rev() {
                            stack.push(body.frame());
                            stack.push(Frame::new(
                                body.runner(),
                                "repeat",
                                Box::new(move |stack, _| stack.set_value(Ok(Box::new(i) as Value))),
                            ));
                        }
                        // Zero iterations: the repeat itself is the void stage.
                        stack.set_value(Ok(unit()));
                    }
                    Err(e) => stack.set_value(Err(e)),
                }
            }),
        ));
        stack.push(self.counter.frame());
        stack.set_value(Ok(input));
    }
}

impl InterceptNode {
    /// Pushes a catch frame under the body: on success the value passes
    /// through unchanged; on failure the first handler registered for the
    /// error's kind is pushed with the error value as its input, and an
    /// unhandled error propagates on.
    fn enter(&self, stack: &mut ContextStack, input: Value) {
        let handlers = self.handlers.clone();
        stack.push(Frame::catching(
            self.body.runner(),
            "intercept",
            Box::new(move |stack, outcome| match outcome {
                Ok(v) => stack.set_value(Ok(v)),
                Err(e) => match handlers.iter().find(|h| h.handles(e.kind())) {
                    Some(handler) => {
                        stack.push(handler.node.frame());
                        stack.set_value(Ok(Box::new(e) as Value));
                    }
                    None => stack.set_value(Err(e)),
                },
            }),
        ));
        stack.push(self.body.frame());
        stack.set_value(Ok(input));
    }
}
