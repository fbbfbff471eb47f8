use super::{Cli, CliError, Commands, RunRequest};
use crate::{
    executors::ExecutionMode,
    jobs::{JobError, JobSelection},
};
use clap::Parser;
use std::path::PathBuf;

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
pub fn key_value_arguments() {
    let request = RunRequest::parse(&args(&["db=/data/jobs.moc", "jobs=1,3-5,9"])).unwrap();

    assert_eq!(request.database, PathBuf::from("/data/jobs.moc"));
    assert_eq!(request.spec, "1,3-5,9");
    assert_eq!(
        request.selection,
        JobSelection::Ids([1, 3, 4, 5, 9].into_iter().collect())
    );
}

#[test]
pub fn positional_arguments() {
    let request = RunRequest::parse(&args(&["/data/jobs.moc", "1-2", "7"])).unwrap();

    assert_eq!(request.database, PathBuf::from("/data/jobs.moc"));
    assert_eq!(request.spec, "1-2,7");
    assert_eq!(
        request.selection,
        JobSelection::Ids([1, 2, 7].into_iter().collect())
    );

    let request = RunRequest::parse(&args(&["/data/jobs.moc", "all"])).unwrap();
    assert_eq!(request.selection, JobSelection::All);
}

#[test]
pub fn incomplete_arguments() {
    assert!(matches!(
        RunRequest::parse(&args(&["db=/data/jobs.moc"])),
        Err(CliError::Job(JobError::MissingParameter(name))) if name == "jobs"
    ));
    assert!(matches!(
        RunRequest::parse(&args(&["/data/jobs.moc"])),
        Err(CliError::Job(JobError::MissingParameter(_)))
    ));
    assert!(matches!(RunRequest::parse(&[]), Err(CliError::MissingDatabase)));
    assert!(matches!(
        RunRequest::parse(&args(&["db=/data/jobs.moc", "jobs=x"])),
        Err(CliError::Job(JobError::InvalidSpec(_)))
    ));
}

#[test]
pub fn run_command_line() {
    let cli = Cli::try_parse_from([
        "mocsim",
        "run",
        "--mode",
        "hybrid",
        "--simulate-ranks",
        "3",
        "db=jobs.moc",
        "jobs=1-9",
    ])
    .unwrap();

    match cli.command {
        Commands::Run {
            config,
            mode,
            simulate_ranks,
            args,
        } => {
            assert_eq!(config, None);
            assert_eq!(mode, Some(ExecutionMode::Hybrid));
            assert_eq!(simulate_ranks, Some(3));
            assert_eq!(args, vec!["db=jobs.moc", "jobs=1-9"]);
        }
        other => panic!("unexpected command {other:?}"),
    }

    assert!(Cli::try_parse_from(["mocsim", "run", "--simulate-ranks", "0", "a.moc", "1"]).is_err());
    assert!(Cli::try_parse_from(["mocsim", "run"]).is_err());
}

#[test]
pub fn inspect_command_line() {
    let cli = Cli::try_parse_from(["mocsim", "inspect", "--pack-size", "2.5", "1-6"]).unwrap();

    match cli.command {
        Commands::Inspect { pack_size, db, spec } => {
            assert_eq!(pack_size, Some(2.5));
            assert_eq!(db, None);
            assert_eq!(spec, "1-6");
        }
        other => panic!("unexpected command {other:?}"),
    }
}
