use super::{JobOutcome, JobRunner, StrategyError};
use crate::jobs::JobId;
use rayon::{prelude::*, ThreadPoolBuilder};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, instrument};

/// execute jobs one after another, each waits for its predecessor
#[instrument(skip(runner), level = "info")]
pub fn sequential(jobs: &[JobId], runner: &dyn JobRunner) -> Vec<JobOutcome> {
    let total = jobs.len();

    jobs.iter()
        .enumerate()
        .map(|(index, job_id)| {
            let outcome = runner.run(*job_id);
            info!("Done with {}/{total}", index + 1);

            outcome
        })
        .collect()
}

/// Execute all jobs concurrently with one worker per job
///
/// The pool is sized to the job count, so every job starts right away. Core counts are
/// not checked, oversubscribing the node is up to the caller.
#[instrument(skip(runner), level = "info")]
pub fn shared(jobs: &[JobId], runner: &dyn JobRunner) -> Result<Vec<JobOutcome>, StrategyError> {
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    debug!("Starting thread pool with {} threads", jobs.len());

    let pool = ThreadPoolBuilder::new()
        .num_threads(jobs.len())
        .thread_name(|index| format!("mocsim-worker-{index}"))
        .build()?;

    // progress counter shared by the workers
    let processed = AtomicU64::new(0);
    let total = jobs.len();

    let outcomes: Vec<JobOutcome> = pool.install(|| {
        jobs.par_iter()
            .with_max_len(1)
            .map(|job_id| {
                let outcome = runner.run(*job_id);
                info!(
                    "Done with {}/{total}",
                    processed.fetch_add(1, Ordering::SeqCst) + 1
                );

                outcome
            })
            .collect()
    });

    Ok(outcomes)
}
