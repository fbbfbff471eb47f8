use super::{
    execute, local, ExecutionMode, JobOutcome, JobRunner, RunReport,
};
use crate::{distributed::SoloCommunicator, jobs::JobId};
use parking_lot::Mutex;
use std::{collections::BTreeSet, sync::Barrier, time::Duration};

/// Job runner that records every started job and fails a fixed set of ids
#[derive(Debug, Default)]
pub struct RecordingRunner {
    pub started: Mutex<Vec<JobId>>,
    pub failing: BTreeSet<JobId>,
}

impl RecordingRunner {
    pub fn failing(ids: &[JobId]) -> Self {
        Self {
            started: Mutex::new(Vec::new()),
            failing: ids.iter().copied().collect(),
        }
    }

    pub fn started(&self) -> Vec<JobId> {
        self.started.lock().clone()
    }
}

impl JobRunner for RecordingRunner {
    fn run(&self, job_id: JobId) -> JobOutcome {
        self.started.lock().push(job_id);
        let exit_code = if self.failing.contains(&job_id) { 3 } else { 0 };

        JobOutcome::new(job_id, exit_code, Duration::ZERO)
    }
}

/// Job runner that only returns once all jobs of a burst are running at the same time
struct RendezvousRunner {
    barrier: Barrier,
}

impl JobRunner for RendezvousRunner {
    fn run(&self, job_id: JobId) -> JobOutcome {
        self.barrier.wait();

        JobOutcome::new(job_id, 0, Duration::ZERO)
    }
}

#[test]
pub fn sequential_keeps_order() {
    let runner = RecordingRunner::default();
    let outcomes = local::sequential(&[5, 1, 9], &runner);

    assert_eq!(runner.started(), vec![5, 1, 9]);
    assert_eq!(
        outcomes.iter().map(|outcome| outcome.job_id).collect::<Vec<_>>(),
        vec![5, 1, 9]
    );
}

#[test]
pub fn failures_do_not_stop_siblings() {
    let runner = RecordingRunner::failing(&[2]);
    let report = execute(
        ExecutionMode::Sequential,
        &[1, 2, 3],
        &SoloCommunicator::unavailable(),
        &runner,
    )
    .unwrap();

    assert_eq!(runner.started(), vec![1, 2, 3]);
    assert_eq!(report.exit_codes(), vec![0, 3, 0]);
    assert_eq!(report.exit_code(), 3);
    assert_eq!(report.failed().count(), 1);
}

#[test]
pub fn shared_runs_every_job_concurrently() {
    let jobs: Vec<JobId> = (1..=6).collect();
    let runner = RendezvousRunner {
        barrier: Barrier::new(jobs.len()),
    };

    let outcomes = local::shared(&jobs, &runner).unwrap();

    assert_eq!(
        outcomes.iter().map(|outcome| outcome.job_id).collect::<Vec<_>>(),
        jobs
    );
}

#[test]
pub fn shared_collects_all_failures() {
    let runner = RecordingRunner::failing(&[4, 6]);
    let outcomes = local::shared(&[4, 5, 6], &runner).unwrap();

    let mut started = runner.started();
    started.sort_unstable();
    assert_eq!(started, vec![4, 5, 6]);
    assert_eq!(
        outcomes.iter().map(|outcome| outcome.exit_code).collect::<Vec<_>>(),
        vec![3, 0, 3]
    );
}

#[test]
pub fn shared_without_jobs_does_nothing() {
    let runner = RecordingRunner::default();

    assert!(local::shared(&[], &runner).unwrap().is_empty());
    assert!(runner.started().is_empty());
}

#[test]
pub fn auto_without_world_runs_shared() {
    let runner = RecordingRunner::default();
    let report = execute(
        ExecutionMode::Auto,
        &[1, 2, 3, 4],
        &SoloCommunicator::unavailable(),
        &runner,
    )
    .unwrap();

    assert_eq!(report.mode, Some(ExecutionMode::Shared));
    assert_eq!(report.exit_code(), 0);
}

#[test]
pub fn auto_single_job_runs_sequential() {
    let runner = RecordingRunner::default();
    let report = execute(
        ExecutionMode::Auto,
        &[8],
        &SoloCommunicator::single(),
        &runner,
    )
    .unwrap();

    assert_eq!(report.mode, Some(ExecutionMode::Sequential));
    assert_eq!(runner.started(), vec![8]);
}

#[test]
pub fn empty_report_succeeds() {
    assert_eq!(RunReport::default().exit_code(), 0);
}
