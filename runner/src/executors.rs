mod local;
mod ranks;

#[cfg(test)]
mod local_test;
#[cfg(test)]
mod ranks_test;

use crate::{
    distributed::{Communicator, CoordinatorError},
    jobs::{JobError, JobId},
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("{jobs} jobs cannot be run one per rank on {world_size} ranks")]
    RankJobMismatch { jobs: usize, world_size: usize },
    #[error("Auto selection found no mode for {jobs} jobs on {world_size} ranks")]
    NoApplicableStrategy { jobs: usize, world_size: usize },
    #[error("Mode {0:?} requires a message passing world")]
    NoWorld(ExecutionMode),
    #[error("Failed to build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Rank coordination failed")]
    Coordinator(#[from] CoordinatorError),
    #[error("Invalid job grouping")]
    Job(#[from] JobError),
}

/// How a list of jobs is mapped onto processes and ranks
#[derive(Deserialize, Serialize, ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// one job after another
    Sequential,
    /// all jobs at once on this node
    Shared,
    /// exactly one job per message passing rank
    Mpi,
    /// contiguous job groups per rank, each group runs concurrently
    Hybrid,
    /// pick one of the above from job count and world size
    #[default]
    Auto,
}

/// true for operating systems where runs never span multiple nodes
pub fn single_node_os() -> bool {
    cfg!(windows)
}

/// Select the concrete mode for `Auto`, first matching rule wins
pub fn select(
    jobs: usize,
    world_size: usize,
    single_node_os: bool,
) -> Result<ExecutionMode, StrategyError> {
    if jobs == 1 {
        Ok(ExecutionMode::Sequential)
    } else if single_node_os {
        Ok(ExecutionMode::Shared)
    } else if jobs == world_size {
        Ok(ExecutionMode::Mpi)
    } else if world_size == 0 {
        Ok(ExecutionMode::Shared)
    } else if jobs > world_size {
        Ok(ExecutionMode::Hybrid)
    } else {
        Err(StrategyError::NoApplicableStrategy { jobs, world_size })
    }
}

/// Runs a single job to completion, implemented by the simulator
pub trait JobRunner: Sync {
    fn run(&self, job_id: JobId) -> JobOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub exit_code: i32,
    pub elapsed: Duration,
}

impl JobOutcome {
    pub fn new(job_id: JobId, exit_code: i32, elapsed: Duration) -> Self {
        Self {
            job_id,
            exit_code,
            elapsed,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Outcomes of every job this process executed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub mode: Option<ExecutionMode>,
    pub outcomes: Vec<JobOutcome>,
}

impl RunReport {
    pub fn new(mode: ExecutionMode, outcomes: Vec<JobOutcome>) -> Self {
        Self {
            mode: Some(mode),
            outcomes,
        }
    }

    /// 0 when every job succeeded, otherwise the exit code of the last failed job
    pub fn exit_code(&self) -> i32 {
        self.outcomes
            .iter()
            .rev()
            .find(|outcome| !outcome.success())
            .map_or(0, |outcome| outcome.exit_code)
    }

    pub fn exit_codes(&self) -> Vec<i32> {
        self.outcomes.iter().map(|outcome| outcome.exit_code).collect()
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.success())
    }
}

/// Execute `jobs` in `mode`, resolving `Auto` against the communicator's world first
#[instrument(skip(jobs, communicator, runner), fields(jobs = jobs.len(), rank = communicator.rank(), size = communicator.size()))]
pub fn execute(
    mode: ExecutionMode,
    jobs: &[JobId],
    communicator: &dyn Communicator,
    runner: &dyn JobRunner,
) -> Result<RunReport, StrategyError> {
    let outcomes = match mode {
        ExecutionMode::Auto => {
            let selected = select(jobs.len(), communicator.size(), single_node_os())?;
            info!("Auto selected execution mode {selected:?}");

            return execute(selected, jobs, communicator, runner);
        }
        ExecutionMode::Sequential => local::sequential(jobs, runner),
        ExecutionMode::Shared => local::shared(jobs, runner)?,
        ExecutionMode::Mpi => ranks::per_job(jobs, communicator, runner)?,
        ExecutionMode::Hybrid => ranks::hybrid(jobs, communicator, runner)?,
    };

    let report = RunReport::new(mode, outcomes);
    info!(exit_codes = ?report.exit_codes(), "Simulations completed");

    Ok(report)
}
