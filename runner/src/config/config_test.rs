use super::{check_executable, ConfigErrors, RunnerConfig};
use crate::{
    executors::ExecutionMode,
    simulator::{ExponentialMode, SIMULATOR_NAME},
};
use std::{fs, os::unix::fs::PermissionsExt, path::Path};
use tempfile::{Builder, TempDir};

fn search_root() -> TempDir {
    Builder::new().prefix("search").tempdir().unwrap()
}

fn create_file(path: &Path, mode: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

#[test]
pub fn defaults_from_empty_mapping() {
    let config = RunnerConfig::parse("{}").unwrap();

    assert_eq!(config.executable, None);
    assert_eq!(config.stdout_log, "stdout.log");
    assert_eq!(config.exponential_mode, ExponentialMode::Exact);
    assert_eq!(config.execution_mode, ExecutionMode::Auto);
    assert!(!config.test_mode);
}

#[test]
pub fn parse_full_config() {
    let config = RunnerConfig::parse(
        r#"
executable: /opt/mocassin/Mocassin.Simulator
extension_dir: /opt/mocassin/ext
stdout_log: run.log
exponential_mode: fast
execution_mode: hybrid
"#,
    )
    .unwrap();

    assert_eq!(config.exponential_mode, ExponentialMode::Fast);
    assert_eq!(config.execution_mode, ExecutionMode::Hybrid);
    assert_eq!(config.stdout_log, "run.log");
}

#[test]
pub fn unknown_fields_are_rejected() {
    assert!(matches!(
        RunnerConfig::parse("executabel: /bin/true"),
        Err(ConfigErrors::InvalidConfig(_))
    ));
}

#[test]
pub fn executable_bit() {
    let directory = TempDir::new().unwrap();
    let runnable = directory.path().join("runnable");
    let plain = directory.path().join("plain");
    create_file(&runnable, 0o755);
    create_file(&plain, 0o644);

    assert!(check_executable(&runnable).unwrap());
    assert!(!check_executable(&plain).unwrap());
    assert!(matches!(
        check_executable(&directory.path().join("absent")),
        Err(ConfigErrors::FileNotFound(_))
    ));
}

#[test]
pub fn preflight_reports_problems() {
    let directory = TempDir::new().unwrap();
    let plain = directory.path().join("plain");
    create_file(&plain, 0o644);

    let config = RunnerConfig {
        executable: Some(plain),
        extension_dir: Some(directory.path().join("missing")),
        stdout_log: String::from(" "),
        ..Default::default()
    };
    assert!(config.preflight_checks());

    let config = RunnerConfig {
        search_path: Some(directory.path().to_path_buf()),
        ..Default::default()
    };
    assert!(!config.preflight_checks());
}

#[test]
pub fn simulator_discovered_below_search_path() {
    let directory = search_root();
    let executable = directory.path().join("build").join("bin").join(SIMULATOR_NAME);
    create_file(&executable, 0o755);

    let config = RunnerConfig {
        search_path: Some(directory.path().to_path_buf()),
        exponential_mode: ExponentialMode::Fast,
        ..Default::default()
    };
    let simulator = config
        .simulator(directory.path().join("jobs.moc"))
        .unwrap();

    assert_eq!(simulator.executable, executable);
    assert_eq!(simulator.extension_dir, directory.path().join("build").join("bin"));
    assert_eq!(simulator.exponential, ExponentialMode::Fast);
    assert_eq!(simulator.stdout_log, "stdout.log");
}

#[test]
pub fn missing_simulator() {
    let directory = search_root();
    let config = RunnerConfig {
        search_path: Some(directory.path().to_path_buf()),
        ..Default::default()
    };

    assert!(matches!(
        config.simulator(directory.path().join("jobs.moc")),
        Err(ConfigErrors::ExecutableNotFound(root)) if root == directory.path()
    ));
}
