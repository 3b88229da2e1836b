//! Worker-pool demonstration.
//!
//! Runs a batch of sleepy jobs through a small pool and prints how the work
//! spread across the workers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use caching_proxy::pool::WorkerPool;

#[derive(Parser)]
#[command(name = "pool-demo")]
#[command(about = "Worker pool demonstration", long_about = None)]
struct Cli {
    /// Number of workers to spawn.
    #[arg(default_value_t = 10)]
    workers: usize,

    /// Number of jobs to schedule.
    #[arg(default_value_t = 15)]
    jobs: usize,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caching_proxy=debug,pool_demo=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let pool = WorkerPool::new(cli.workers);
    let finished = Arc::new(AtomicUsize::new(0));

    tracing::info!(workers = cli.workers, jobs = cli.jobs, "scheduling");
    for job in 0..cli.jobs {
        let finished = finished.clone();
        pool.schedule(move || async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tracing::info!(job, "job finished");
            finished.fetch_add(1, Ordering::SeqCst);
        });
    }

    while finished.load(Ordering::SeqCst) < cli.jobs {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    for (worker, count) in pool.executed_counts().iter().enumerate() {
        tracing::info!(worker, jobs = count, "worker attribution");
    }

    pool.shutdown().await;
}
