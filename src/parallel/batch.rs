//! Worker-pool wrapper around a full optimization run.
//!
//! Fitness evaluation uses one squad per parallel task on whichever Rayon
//! pool is current; installing the search into a sized [WorkerPool] bounds
//! that parallelism without touching the optimizer itself.

use crate::data::config::OptimizerConfig;
use crate::data::player::PlayerPool;
use crate::optimizer::{optimize, OptimizationOutcome, OptimizeError};
use crate::parallel::pool::WorkerPool;
use crate::score::ProjectionTable;

/// Run the population search distributed across workers. This is a
/// convenience that calls [crate::optimizer::optimize] inside
/// [WorkerPool::install] when a custom worker count is set.
pub fn run_optimization_batches<F>(
    pool: &PlayerPool,
    projections: &ProjectionTable,
    config: &OptimizerConfig,
    workers: &WorkerPool,
    on_progress: F,
) -> Result<OptimizationOutcome, OptimizeError>
where
    F: FnMut(usize, usize) + Send,
{
    workers.install(|| optimize(pool, projections, config, on_progress))
}
