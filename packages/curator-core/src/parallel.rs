//! Fan-out/join harness with per-task failure isolation.
//!
//! Logging context does not follow work onto pool threads by itself, so it is
//! carried explicitly as a [`PassContext`] and re-entered as a `tracing` span
//! inside every task.

use rayon::prelude::*;
use rayon::ThreadPool;
use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info_span, warn, Span};

/// Identifies the curator and pass a piece of work belongs to.
#[derive(Debug, Clone)]
pub struct PassContext {
    curator: Arc<str>,
    pass: u64,
}

impl PassContext {
    pub fn new(curator: Arc<str>, pass: u64) -> Self {
        Self { curator, pass }
    }

    pub fn curator(&self) -> &str {
        &self.curator
    }

    pub fn pass(&self) -> u64 {
        self.pass
    }

    pub fn span(&self) -> Span {
        info_span!("curator", name = %self.curator, pass = self.pass)
    }
}

/// Outcome of one fan-out: per-item results in input order, `None` where the
/// task failed.
#[derive(Debug)]
pub struct ParallelRun<R> {
    pub results: Vec<Option<R>>,
    pub duration: Duration,
}

impl<R> ParallelRun<R> {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.is_none()).count()
    }
}

/// Runs `task` for every item on `pool` and waits for all of them.
///
/// A task that returns an error or panics is logged with `describe(item)` and
/// yields `None`; the other tasks are unaffected.
pub fn run_in_parallel<T, R, E, F, D>(
    pool: &ThreadPool,
    context: &PassContext,
    items: &[T],
    describe: D,
    task: F,
) -> ParallelRun<R>
where
    T: Sync,
    R: Send,
    E: Display,
    F: Fn(&T) -> Result<R, E> + Sync,
    D: Fn(&T) -> String + Sync,
{
    let started = Instant::now();
    let span = context.span();
    let results = pool.install(|| {
        items
            .par_iter()
            .map(|item| {
                let _entered = span.enter();
                match isolate(|| task(item)) {
                    Ok(Ok(result)) => Some(result),
                    Ok(Err(e)) => {
                        warn!("Job failed to execute: {}: {}", describe(item), e);
                        None
                    }
                    Err(panic) => {
                        error!("Job panicked: {}: {}", describe(item), panic);
                        None
                    }
                }
            })
            .collect()
    });
    ParallelRun {
        results,
        duration: started.elapsed(),
    }
}

/// Runs `f`, turning a panic into an error carrying the panic message.
pub fn isolate<R, F: FnOnce() -> R>(f: F) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub fn build_pool(worker_threads: usize) -> Result<ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(worker_threads)
        .thread_name(|index| format!("curator-worker-{}", index))
        .build()
}
