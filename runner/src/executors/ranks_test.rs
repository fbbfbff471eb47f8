use super::{execute, local_test::RecordingRunner, ExecutionMode, StrategyError};
use crate::{
    distributed::{local::LocalFabric, SoloCommunicator},
    jobs::JobId,
};
use std::thread;

/// run `jobs` on `size` in-process ranks, returns the ids executed by every rank
fn run_ranks(mode: ExecutionMode, jobs: &[JobId], size: usize) -> Vec<Vec<JobId>> {
    let handles: Vec<_> = LocalFabric::new(size)
        .communicators()
        .into_iter()
        .map(|communicator| {
            let jobs = jobs.to_vec();

            thread::spawn(move || {
                let runner = RecordingRunner::default();
                let report = execute(mode, &jobs, &communicator, &runner).unwrap();

                assert_eq!(report.exit_code(), 0);
                let mut started = runner.started();
                started.sort_unstable();
                started
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect()
}

#[test]
pub fn one_job_per_rank() {
    assert_eq!(
        run_ranks(ExecutionMode::Mpi, &[11, 12, 13], 3),
        vec![vec![11], vec![12], vec![13]]
    );
}

#[test]
pub fn auto_picks_one_job_per_rank() {
    assert_eq!(
        run_ranks(ExecutionMode::Auto, &[1, 2], 2),
        vec![vec![1], vec![2]]
    );
}

#[test]
pub fn mismatch_launches_nothing() {
    let runner = RecordingRunner::default();
    let communicators = LocalFabric::new(4).communicators();

    for communicator in communicators.iter() {
        let result = execute(ExecutionMode::Mpi, &[1, 2, 3], communicator, &runner);

        assert!(matches!(
            result,
            Err(StrategyError::RankJobMismatch {
                jobs: 3,
                world_size: 4
            })
        ));
    }
    assert!(runner.started().is_empty());
}

#[test]
pub fn hybrid_groups_per_rank() {
    assert_eq!(
        run_ranks(ExecutionMode::Hybrid, &[1, 2, 3, 4, 5, 6, 7, 8], 4),
        vec![vec![1, 2], vec![3, 4], vec![5, 6], vec![7, 8]]
    );
}

#[test]
pub fn hybrid_auto_with_uneven_split_leaves_last_rank_idle() {
    assert_eq!(
        run_ranks(ExecutionMode::Auto, &[1, 2, 3, 4, 5], 4),
        vec![vec![1, 2], vec![3, 4], vec![5], vec![]]
    );
}

#[test]
pub fn hybrid_needs_a_world() {
    let runner = RecordingRunner::default();

    assert!(matches!(
        execute(
            ExecutionMode::Hybrid,
            &[1, 2],
            &SoloCommunicator::unavailable(),
            &runner
        ),
        Err(StrategyError::NoWorld(ExecutionMode::Hybrid))
    ));
}
