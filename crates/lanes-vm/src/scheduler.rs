//! Parallel batch execution with work stealing.
//!
//! Batch indices are dealt round-robin onto per-worker FIFO deques; idle
//! workers steal from their peers. Each worker owns one [`Interpreter`] and
//! reuses it for every batch it takes. A fault lowers a shared watermark:
//! batches above the lowest known fault are skipped, while batches below it
//! still run, so the reported fault is always the lowest failing batch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crossbeam_deque::{Steal, Stealer, Worker};
use lanes_error::{LaneError, Result};
use parking_lot::Mutex;

use crate::batch::Batch;
use crate::config::{InterpConfig, SchedulerConfig};
use crate::interp::Interpreter;
use crate::program::Program;

/// Runs one program over many batches on a pool of scoped threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchScheduler {
    config: SchedulerConfig,
}

impl BatchScheduler {
    /// Create a scheduler from explicit config.
    ///
    /// # Errors
    ///
    /// Returns [`LaneError::InvalidConfig`] when the worker count is zero.
    pub fn try_new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn worker_threads(&self) -> usize {
        self.config.worker_threads
    }

    /// Run `program` over every batch and collect one result per batch.
    ///
    /// `collect` is called on the worker thread right after a batch
    /// completes, with the batch index and the interpreter holding that
    /// batch's registers. Results are returned in batch order.
    ///
    /// # Errors
    ///
    /// Returns [`LaneError::WorkerPanicked`] if a worker (or `collect`)
    /// panicked. Otherwise, if any batch faulted, returns the fault of the
    /// lowest-indexed batch that faults. Batches after a known fault are
    /// never started. Interpreter limit errors are returned before any
    /// batch runs.
    pub fn run<R, F>(
        &self,
        program: &Program,
        interp_config: &InterpConfig,
        batches: &[Batch<'_>],
        collect: F,
    ) -> Result<Vec<R>>
    where
        R: Send,
        F: Fn(usize, &Interpreter<'_>) -> R + Sync,
    {
        Interpreter::new(program, interp_config)?;
        if batches.is_empty() {
            return Ok(Vec::new());
        }

        let workers = self.config.worker_threads.min(batches.len());
        let _span = tracing::debug_span!(
            "lanes_schedule",
            batches = batches.len(),
            workers,
            program_bytes = program.code().len(),
        )
        .entered();

        let queues: Vec<Worker<usize>> = (0..workers).map(|_| Worker::new_fifo()).collect();
        for index in 0..batches.len() {
            queues[index % workers].push(index);
        }
        let stealers: Vec<Stealer<usize>> = queues.iter().map(Worker::stealer).collect();
        let first_fault = AtomicUsize::new(usize::MAX);
        let failures: Mutex<Vec<(usize, LaneError)>> = Mutex::new(Vec::new());

        let joined: Vec<thread::Result<Vec<(usize, R)>>> = thread::scope(|scope| {
            let handles: Vec<_> = queues
                .into_iter()
                .enumerate()
                .map(|(worker_id, local)| {
                    let stealers = &stealers;
                    let first_fault = &first_fault;
                    let failures = &failures;
                    let collect = &collect;
                    scope.spawn(move || {
                        let mut completed = Vec::new();
                        let mut interp = match Interpreter::new(program, interp_config) {
                            Ok(interp) => interp,
                            Err(err) => {
                                first_fault.store(0, Ordering::Release);
                                failures.lock().push((0, err));
                                return completed;
                            }
                        };
                        while let Some(index) = pop_or_steal(&local, worker_id, stealers) {
                            if index > first_fault.load(Ordering::Acquire) {
                                continue;
                            }
                            match interp.run(&batches[index]) {
                                Ok(_) => completed.push((index, collect(index, &interp))),
                                Err(err) => {
                                    first_fault.fetch_min(index, Ordering::AcqRel);
                                    failures.lock().push((index, err));
                                }
                            }
                        }
                        tracing::trace!(worker_id, batches = completed.len(), "worker finished");
                        completed
                    })
                })
                .collect();
            handles.into_iter().map(thread::ScopedJoinHandle::join).collect()
        });

        let mut results = Vec::with_capacity(batches.len());
        let mut panicked = false;
        for outcome in joined {
            match outcome {
                Ok(mut completed) => results.append(&mut completed),
                Err(_) => panicked = true,
            }
        }
        if panicked {
            tracing::warn!("scheduler worker panicked");
            return Err(LaneError::WorkerPanicked);
        }

        let mut failures = failures.into_inner();
        failures.sort_by_key(|&(index, _)| index);
        if let Some((index, err)) = failures.into_iter().next() {
            tracing::warn!(batch = index, error = %err, "scheduled run aborted");
            return Err(err);
        }

        if results.len() != batches.len() {
            return Err(LaneError::internal(format!(
                "scheduler completed {} of {} batches without a fault",
                results.len(),
                batches.len()
            )));
        }
        results.sort_by_key(|&(index, _)| index);
        tracing::debug!(batches = results.len(), "scheduled run complete");
        Ok(results.into_iter().map(|(_, result)| result).collect())
    }
}

fn pop_or_steal<T>(local: &Worker<T>, worker_id: usize, stealers: &[Stealer<T>]) -> Option<T> {
    if let Some(task) = local.pop() {
        return Some(task);
    }
    steal_from_peers(worker_id, stealers)
}

fn steal_from_peers<T>(worker_id: usize, stealers: &[Stealer<T>]) -> Option<T> {
    let peer_count = stealers.len();
    if peer_count <= 1 {
        return None;
    }

    for offset in 1..peer_count {
        let peer = (worker_id + offset) % peer_count;
        loop {
            match stealers[peer].steal() {
                Steal::Success(task) => return Some(task),
                Steal::Empty => break,
                Steal::Retry => (),
            }
        }
    }
    None
}
