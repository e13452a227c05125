//! Rayon thread pool configuration for optimization workloads.
//!
//! Use [WorkerPool::install] to run the population search with a fixed
//! number of threads, or leave the count at 0 for Rayon's default (all CPU
//! cores). The CLI sources the count from an environment variable via
//! [WorkerPool::from_env].

use std::env;

use rayon::ThreadPoolBuilder;

/// Configures how many worker threads are used for parallel fitness
/// evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerPool {
    /// Number of worker threads. If 0, use Rayon default (num_cpus).
    pub workers: usize,
}

impl WorkerPool {
    /// Use exactly `n` worker threads.
    pub fn with_workers(n: usize) -> Self {
        Self { workers: n }
    }

    /// Worker count from an environment variable. Unset or unparsable values
    /// fall back to the Rayon default.
    pub fn from_env(var: &str) -> Self {
        Self {
            workers: env::var(var)
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(0),
        }
    }

    /// Run a closure on a thread pool with this worker count. If
    /// [workers](WorkerPool::workers) is 0, uses the global Rayon pool (all
    /// cores). Otherwise builds a temporary pool with that many threads.
    pub fn install<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if self.workers == 0 {
            f()
        } else {
            let pool = ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
                .expect("Rayon thread pool");
            pool.install(f)
        }
    }
}
