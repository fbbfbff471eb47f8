use super::{
    provider::{
        ArgumentProvider, ArgumentProviders, CookieOverwrite, JobContext, ProviderArgument,
        ProviderConfig, SchedulingArgumentProvider, SingleArgumentProvider, COMPLETION_TAG,
    },
    BatchError,
};
use crate::{
    database::database_test::create_database, jobs::JobError, simulator::job_folder,
};
use std::{fs, path::Path};
use tempfile::TempDir;

fn context(arguments: String, task_count: usize, cores_per_task: usize) -> JobContext {
    JobContext {
        arguments,
        task_count,
        cores_per_task,
        task_tag: String::from("ntasks"),
        core_tag: String::from("cpus-per-task"),
    }
}

fn write_log(base: &Path, job_id: u64, content: &str) {
    let folder = job_folder(base, job_id);
    fs::create_dir_all(&folder).unwrap();
    fs::write(folder.join("stdout.log"), content).unwrap();
}

#[test]
pub fn single_passes_arguments_once() {
    let provider = ArgumentProviders::load(&ProviderConfig::Single);
    let set = provider
        .argument_set(&context(String::from("db=a.moc jobs=1-3 --fast"), 4, 1))
        .unwrap()
        .collect::<Vec<_>>();

    assert_eq!(provider.name(), "single");
    assert_eq!(
        set,
        vec![ProviderArgument::plain(String::from("db=a.moc jobs=1-3 --fast"))]
    );
}

#[test]
pub fn scheduling_shrinks_trailing_group() {
    let provider = SchedulingArgumentProvider {
        filter_completed: false,
        ..Default::default()
    };
    let set = provider
        .argument_set(&context(String::from("db=/data/a.moc jobs=1-5"), 2, 1))
        .unwrap()
        .collect::<Vec<_>>();

    assert_eq!(
        set.iter().map(|argument| argument.arguments.as_str()).collect::<Vec<_>>(),
        vec![
            "db=/data/a.moc jobs=1-2",
            "db=/data/a.moc jobs=3-4",
            "db=/data/a.moc jobs=5"
        ]
    );
    assert!(set[0].overwrites.is_empty());
    assert!(set[1].overwrites.is_empty());
    assert_eq!(
        set[2].overwrites,
        vec![
            CookieOverwrite {
                tag: String::from("ntasks"),
                value: String::from("1")
            },
            CookieOverwrite {
                tag: String::from("cpus-per-task"),
                value: String::from("1")
            },
        ]
    );
}

#[test]
pub fn completed_jobs_are_skipped() {
    let directory = TempDir::new().unwrap();
    let database = directory.path().join("jobs.moc");
    write_log(directory.path(), 3, &format!("step 1000\n{COMPLETION_TAG}: finished\n"));
    write_log(directory.path(), 4, "step 10\n");

    let provider = SchedulingArgumentProvider::default();
    let set = provider
        .argument_set(&context(format!("db={} jobs=1-5", database.display()), 2, 1))
        .unwrap()
        .map(|argument| argument.arguments)
        .collect::<Vec<_>>();

    assert_eq!(
        set,
        vec![
            format!("db={} jobs=1-2", database.display()),
            format!("db={} jobs=4-5", database.display()),
        ]
    );
}

#[test]
pub fn all_jobs_from_database() {
    let directory = TempDir::new().unwrap();
    let database = create_database(directory.path(), &[1, 2, 3, 7]);

    let provider = SchedulingArgumentProvider::default();
    let set = provider
        .argument_set(&context(format!("db={} jobs=all", database.display()), 2, 2))
        .unwrap()
        .map(|argument| argument.arguments)
        .collect::<Vec<_>>();

    assert_eq!(set, vec![format!("db={} jobs=1-3,7", database.display())]);
}

#[test]
pub fn missing_database_parameter() {
    let provider = SchedulingArgumentProvider::default();

    assert!(matches!(
        provider.argument_set(&context(String::from("jobs=1-5"), 2, 1)),
        Err(BatchError::Job(JobError::MissingParameter(name))) if name == "db"
    ));
    assert_eq!(SingleArgumentProvider.name(), "single");
}
