//! Pluggable task system used to spread solver stages across workers.
//!
//! The world never spawns threads itself. Each parallel stage hands an item
//! range to [`TaskSystem::run_task`], which must not return before every
//! item has been processed. Callbacks invoked during a step must not touch
//! the world.

use crate::common::constants::MAX_WORKERS;

/// Work item callback: `(start_index, end_index, worker_index)`.
pub type TaskFn<'a> = &'a (dyn Fn(usize, usize, usize) + Sync);

/// Executes ranges of solver work.
pub trait TaskSystem: Send + Sync {
    /// Number of workers the ranges may be spread across.
    fn worker_count(&self) -> usize;

    /// Runs `task` over `[0, item_count)` split into ranges of at least
    /// `min_range` items and blocks until all ranges are finished. Worker
    /// indices passed to the task must be below [`Self::worker_count`].
    fn run_task(&self, item_count: usize, min_range: usize, task: TaskFn<'_>);
}

/// Runs every range inline on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialTaskSystem;

impl TaskSystem for SerialTaskSystem {
    fn worker_count(&self) -> usize {
        1
    }

    fn run_task(&self, item_count: usize, _min_range: usize, task: TaskFn<'_>) {
        if item_count > 0 {
            task(0, item_count, 0);
        }
    }
}

/// Splits `item_count` into `(start, end)` ranges for `worker_count` workers.
pub fn partition(item_count: usize, min_range: usize, worker_count: usize) -> Vec<(usize, usize)> {
    if item_count == 0 {
        return Vec::new();
    }

    let workers = worker_count.clamp(1, MAX_WORKERS);
    let range = (item_count / workers).max(min_range.max(1));
    (0..item_count)
        .step_by(range)
        .map(|start| (start, (start + range).min(item_count)))
        .collect()
}

#[cfg(feature = "parallel")]
pub use rayon_tasks::RayonTaskSystem;

#[cfg(feature = "parallel")]
mod rayon_tasks {
    use super::{partition, TaskFn, TaskSystem};
    use rayon::prelude::*;

    /// Task system backed by a rayon thread pool.
    #[derive(Debug)]
    pub struct RayonTaskSystem {
        pool: rayon::ThreadPool,
    }

    impl RayonTaskSystem {
        pub fn new(worker_count: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(worker_count.max(1))
                .build()?;
            Ok(Self { pool })
        }
    }

    impl TaskSystem for RayonTaskSystem {
        fn worker_count(&self) -> usize {
            self.pool.current_num_threads()
        }

        fn run_task(&self, item_count: usize, min_range: usize, task: TaskFn<'_>) {
            let ranges = partition(item_count, min_range, self.worker_count());
            if ranges.len() <= 1 {
                if let Some(&(start, end)) = ranges.first() {
                    task(start, end, 0);
                }
                return;
            }

            self.pool.install(|| {
                ranges.par_iter().for_each(|&(start, end)| {
                    let worker = rayon::current_thread_index().unwrap_or(0);
                    task(start, end, worker);
                });
            });
        }
    }
}
