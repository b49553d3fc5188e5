//! Composition and scheduling semantics, end to end.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::timeout;

use taskline::{
    if_then, if_then_else, intercept, parallel3, repeat, Bus, ErrorKind, EventKind, Handler,
    Runner, Task, TaskError,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sequential_chain_threads_typed_results() {
    let compute = Runner::new("compute");
    let render = Runner::new("render");
    let observed = Arc::new(Mutex::new(Vec::new()));

    let inc = Task::simple(&compute, "inc", |x: i32| Ok(x + 1));
    let to_text = Task::simple(&render, "to-text", |x: i32| Ok(x.to_string()));
    let sink = {
        let observed = observed.clone();
        Task::simple(&compute, "sink", move |s: String| {
            observed.lock().unwrap().push(s);
            Ok(())
        })
    };

    inc.then(to_text).then(sink).run(41).await.unwrap();
    assert_eq!(observed.lock().unwrap().as_slice(), ["42".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_tuple_keeps_void_slot() {
    let fan = Runner::new("fan");
    let double = Task::simple(&fan, "double", |x: i32| Ok(x * 2));
    let log = Task::simple(&fan, "log", |_x: i32| Ok(()));
    let inc = Task::simple(&fan, "inc", |x: i32| Ok(x + 1));

    let result = parallel3(double, log, inc).run(10).await.unwrap();
    assert_eq!(result, (20, (), 11));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn intercept_recovers_matching_kind() {
    let main = Runner::new("main");

    let body = Task::simple(&main, "flaky", |_x: i32| -> Result<String, TaskError> {
        Err(TaskError::connection(std::io::Error::from(
            std::io::ErrorKind::ConnectionRefused,
        )))
    });
    let recover = Task::simple(&main, "recover", |e: TaskError| {
        assert_eq!(e.kind(), ErrorKind::Connection);
        Ok("recovered".to_string())
    });

    let result = intercept(body, vec![Handler::on(ErrorKind::Connection, recover)])
        .run(1)
        .await
        .unwrap();
    assert_eq!(result, "recovered");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn intercept_passes_unmatched_kind_through() {
    let main = Runner::new("main");

    let body = Task::simple(&main, "flaky", |_x: i32| -> Result<String, TaskError> {
        Err(TaskError::connection(std::io::Error::from(
            std::io::ErrorKind::TimedOut,
        )))
    });
    let handler = Task::simple(&main, "unreachable", |_e: TaskError| {
        Ok("should not run".to_string())
    });

    let err = intercept(body, vec![Handler::on(ErrorKind::Busy, handler)])
        .run(1)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn error_aborts_remaining_stages() {
    let main = Runner::new("main");
    let tail_ran = Arc::new(AtomicBool::new(false));

    let head = Task::simple(&main, "head", |x: i32| Ok(x));
    let failing = Task::simple(&main, "failing", |_x: i32| -> Result<i32, TaskError> {
        Err(TaskError::failed("boom"))
    });
    let tail = {
        let tail_ran = tail_ran.clone();
        Task::simple(&main, "tail", move |_x: i32| {
            tail_ran.store(true, Ordering::SeqCst);
            Ok(())
        })
    };

    let err = head.then(failing).then(tail).run(7).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Failed);
    assert!(!tail_ran.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn conditional_selects_branch() {
    let main = Runner::new("main");
    let even = |r: &Runner| Task::simple(r, "even?", |x: i32| Ok(x % 2 == 0));

    let labelled = if_then_else(
        even(&main),
        Task::simple(&main, "even", |_x: i32| Ok("even".to_string())),
        Task::simple(&main, "odd", |_x: i32| Ok("odd".to_string())),
    );

    assert_eq!(labelled.run(4).await.unwrap(), "even");
    assert_eq!(labelled.run(3).await.unwrap(), "odd");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn conditional_without_else_is_void() {
    let main = Runner::new("main");
    let body_ran = Arc::new(AtomicBool::new(false));

    let guarded = if_then(Task::simple(&main, "positive?", |x: i32| Ok(x > 0)), {
        let body_ran = body_ran.clone();
        Task::simple(&main, "body", move |_x: i32| {
            body_ran.store(true, Ordering::SeqCst);
            Ok(())
        })
    });

    guarded.run(-3).await.unwrap();
    assert!(!body_ran.load(Ordering::SeqCst));

    guarded.run(3).await.unwrap();
    assert!(body_ran.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeat_feeds_iteration_indices() {
    let main = Runner::new("main");
    let seen = Arc::new(Mutex::new(Vec::new()));

    let count = Task::simple(&main, "count", |n: u64| Ok(n));
    let body = {
        let seen = seen.clone();
        Task::simple(&main, "body", move |i: u64| {
            seen.lock().unwrap().push(i);
            Ok(())
        })
    };

    repeat(count, body).run(4).await.unwrap();
    assert_eq!(seen.lock().unwrap().as_slice(), [0, 1, 2, 3]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeat_zero_iterations_is_void_completion() {
    let main = Runner::new("main");
    let ran = Arc::new(AtomicBool::new(false));

    let count = Task::simple(&main, "count", |n: u64| Ok(n));
    let body = {
        let ran = ran.clone();
        Task::simple(&main, "body", move |_i: u64| {
            ran.store(true, Ordering::SeqCst);
            Ok(())
        })
    };

    repeat(count, body).run(0).await.unwrap();
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_failure_still_runs_siblings() {
    let fan = Runner::new("fan");
    let executed = Arc::new(AtomicUsize::new(0));
    let touch = |executed: &Arc<AtomicUsize>| {
        let executed = executed.clone();
        move || executed.fetch_add(1, Ordering::SeqCst)
    };

    let ok_a = {
        let touch = touch(&executed);
        Task::simple(&fan, "a", move |x: i32| {
            touch();
            Ok(x)
        })
    };
    let failing = {
        let touch = touch(&executed);
        Task::simple(&fan, "b", move |_x: i32| -> Result<i32, TaskError> {
            touch();
            Err(TaskError::failed("b blew up"))
        })
    };
    let ok_c = {
        let touch = touch(&executed);
        Task::simple(&fan, "c", move |x: i32| {
            touch();
            Ok(x)
        })
    };

    let err = parallel3(ok_a, failing, ok_c).run(1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Failed);
    // Every child ran to completion despite the failure in the middle.
    assert_eq!(executed.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_reports_first_failure_in_composition_order() {
    let fan = Runner::new("fan");

    let busy = Task::simple(&fan, "busy", |_x: i32| -> Result<i32, TaskError> {
        Err(TaskError::Busy)
    });
    let ok = Task::simple(&fan, "ok", |x: i32| Ok(x));
    let failed = Task::simple(&fan, "failed", |_x: i32| -> Result<i32, TaskError> {
        Err(TaskError::failed("later"))
    });

    let err = parallel3(busy, ok, failed).run(1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_runs_share_runners() {
    let r1 = Runner::new("r1");
    let r2 = Runner::new("r2");

    let forward = Task::simple(&r1, "fwd-1", |x: i32| Ok(x + 1))
        .then(Task::simple(&r2, "fwd-2", |x: i32| Ok(x * 10)));
    let backward = Task::simple(&r2, "bwd-1", |x: i32| Ok(x * 10))
        .then(Task::simple(&r1, "bwd-2", |x: i32| Ok(x + 1)));

    let (a, b) = tokio::join!(forward.run(1), backward.run(1));
    assert_eq!(a.unwrap(), 20);
    assert_eq!(b.unwrap(), 11);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_lifecycle_events_are_published() {
    let bus = Bus::new(64);
    let mut rx = bus.subscribe();
    let main = Runner::with_bus("evented", bus.clone());

    Task::simple(&main, "noop", |_x: i32| Ok(()))
        .run(1)
        .await
        .unwrap();

    let started = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(started.kind, EventKind::RunStarted);
    assert_eq!(started.name.as_deref(), Some("noop"));

    let completed = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(completed.kind, EventKind::RunCompleted);
}
