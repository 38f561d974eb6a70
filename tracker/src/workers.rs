use anyhow::{Context, Result};
use log::info;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::graph_pool::default_parallelism;

/// Shared thread pool on which evaluated states are fanned out. One pool serves
/// every dungeon; graph pools bound how much of it a single dungeon can use.
#[derive(Debug)]
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    pub fn new() -> Result<Self> {
        Self::with_threads(default_parallelism())
    }

    pub fn with_threads(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("dungeon-worker-{i}"))
            .build()
            .context("unable to start worker threads")?;
        info!("Started {threads} worker threads");
        Ok(WorkerPool { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_install_runs_on_pool() {
        let workers = WorkerPool::with_threads(2).unwrap();
        assert_eq!(workers.threads(), 2);
        let sum: u64 = workers.install(|| (1..=100u64).into_par_iter().sum());
        assert_eq!(sum, 5050);
        let name = workers.install(|| std::thread::current().name().map(str::to_owned));
        assert!(name.unwrap().starts_with("dungeon-worker-"));
    }
}
