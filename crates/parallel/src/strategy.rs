//! Parallel processing strategies

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to set up a worker pool
#[derive(Error, Debug)]
#[error("cannot build worker pool with {threads} threads: {reason}")]
pub struct ParallelError {
    pub threads: usize,
    pub reason: String,
}

/// How independent units are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Single-threaded, in input order
    Sequential,
    /// Rayon's global pool
    #[default]
    Parallel,
    /// A dedicated pool bounded to the given number of workers
    ParallelWith(usize),
}

impl ProcessingMode {
    /// `ParallelWith(n)` for `Some(n)` with n > 1, `Sequential` for 1,
    /// `Parallel` otherwise.
    pub fn from_threads(threads: Option<usize>) -> Self {
        match threads {
            Some(0) | None => ProcessingMode::Parallel,
            Some(1) => ProcessingMode::Sequential,
            Some(n) => ProcessingMode::ParallelWith(n),
        }
    }
}

/// Strategy for executing a map over independent items
pub trait ParallelStrategy {
    /// Apply `f` to every item; output order matches input order.
    fn map_items<I, T, F>(&self, items: Vec<I>, f: F) -> Result<Vec<T>, ParallelError>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> T + Sync + Send;

    /// Run two independent closures, possibly concurrently.
    fn join<A, B, RA, RB>(&self, a: A, b: B) -> Result<(RA, RB), ParallelError>
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send;
}

fn bounded_pool(threads: usize) -> Result<rayon::ThreadPool, ParallelError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| ParallelError {
            threads,
            reason: e.to_string(),
        })
}

impl ParallelStrategy for ProcessingMode {
    fn map_items<I, T, F>(&self, items: Vec<I>, f: F) -> Result<Vec<T>, ParallelError>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => Ok(items.into_iter().map(f).collect()),
            ProcessingMode::Parallel => Ok(items.into_par_iter().map(f).collect()),
            ProcessingMode::ParallelWith(threads) => {
                let pool = bounded_pool(*threads)?;
                Ok(pool.install(|| items.into_par_iter().map(f).collect()))
            }
        }
    }

    fn join<A, B, RA, RB>(&self, a: A, b: B) -> Result<(RA, RB), ParallelError>
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        match self {
            ProcessingMode::Sequential => Ok((a(), b())),
            ProcessingMode::Parallel => Ok(rayon::join(a, b)),
            ProcessingMode::ParallelWith(threads) => {
                let pool = bounded_pool(*threads)?;
                Ok(pool.install(|| rayon::join(a, b)))
            }
        }
    }
}

/// Get the number of available CPU cores
pub fn num_cpus() -> usize {
    rayon::current_num_threads()
}

/// Configure the global thread pool; ignored if it is already initialised.
pub fn set_num_threads(threads: usize) {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
