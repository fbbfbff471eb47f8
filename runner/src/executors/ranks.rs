use super::{local, ExecutionMode, JobOutcome, JobRunner, StrategyError};
use crate::{
    distributed::{coordinator::RankCoordinator, util::node_name, Communicator},
    jobs::{compress, grouping, JobId},
};
use tracing::{info, instrument};

const ROOT: usize = 0;

fn announce(jobs: &[JobId], communicator: &dyn Communicator) {
    if communicator.rank() == ROOT {
        info!(
            "Started with {} ranks, sequence is [{}]",
            communicator.size(),
            compress(jobs)
        );
    }
}

/// Run `jobs[rank]` on every rank, requires exactly one job per rank
#[instrument(skip_all, level = "info", fields(rank = communicator.rank(), size = communicator.size()))]
pub fn per_job(
    jobs: &[JobId],
    communicator: &dyn Communicator,
    runner: &dyn JobRunner,
) -> Result<Vec<JobOutcome>, StrategyError> {
    let context = communicator.context();

    if jobs.len() != context.world_size {
        return Err(StrategyError::RankJobMismatch {
            jobs: jobs.len(),
            world_size: context.world_size,
        });
    }

    let coordinator = RankCoordinator::new(communicator);
    announce(jobs, communicator);
    coordinator.barrier(ROOT)?;

    let job_id = jobs[context.rank];
    info!(
        node = %node_name(),
        "Rank ({} / {}) starts job {job_id}",
        context.rank, context.world_size
    );
    let outcome = runner.run(job_id);
    info!(
        "Rank ({} / {}) completed job {job_id} with [{}]",
        context.rank, context.world_size, outcome.exit_code
    );

    coordinator.gather_completion(ROOT)?;

    Ok(vec![outcome])
}

/// Split `jobs` into one group per rank and run the own group as a concurrent burst
///
/// The pack size is rounded up, so trailing ranks may end up without a group and just
/// take part in the coordination.
#[instrument(skip_all, level = "info", fields(rank = communicator.rank(), size = communicator.size()))]
pub fn hybrid(
    jobs: &[JobId],
    communicator: &dyn Communicator,
    runner: &dyn JobRunner,
) -> Result<Vec<JobOutcome>, StrategyError> {
    let context = communicator.context();

    if context.world_size == 0 {
        return Err(StrategyError::NoWorld(ExecutionMode::Hybrid));
    }

    let groups = grouping::group(jobs, jobs.len() as f64 / context.world_size as f64)?;
    let own = groups
        .into_iter()
        .find(|group| group.index == context.rank)
        .map(|group| group.ids)
        .unwrap_or_default();

    let coordinator = RankCoordinator::new(communicator);
    announce(jobs, communicator);
    coordinator.barrier(ROOT)?;

    info!(
        node = %node_name(),
        "Rank ({} / {}) execution group [Count={}] = [{}]",
        context.rank,
        context.world_size,
        own.len(),
        compress(&own)
    );
    let outcomes = local::shared(&own, runner)?;

    coordinator.gather_completion(ROOT)?;

    Ok(outcomes)
}
