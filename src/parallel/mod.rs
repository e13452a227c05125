pub mod batch;
pub mod pool;

pub use batch::run_optimization_batches;
pub use pool::WorkerPool;
