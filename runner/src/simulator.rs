use crate::{
    executors::{JobOutcome, JobRunner},
    jobs::JobId,
};
use globset::{GlobBuilder, GlobMatcher};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
    time::Instant,
};
use tracing::{debug, error, info, instrument, warn};


/// name of the simulator binary searched for when no executable is configured
pub const SIMULATOR_NAME: &str = "Mocassin.Simulator";

/// exit code recorded for jobs whose simulator could not be started
pub const LAUNCH_FAILURE_CODE: i32 = 127;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExponentialMode {
    #[default]
    Exact,
    Fast,
}

/// Everything required to start the simulator for a single job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorInvocation {
    pub job_id: JobId,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub job_folder: PathBuf,
}

impl SimulatorInvocation {
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);

        command
    }
}

/// folder of a job next to the database, e.g. `<base>/Job00042`
pub fn job_folder(base: &Path, job_id: JobId) -> PathBuf {
    base.join(format!("Job{job_id:05}"))
}

/// Create the job folder if it does not exist yet
///
/// Workers of the same node may race for the same folder, losing the race is fine.
pub fn ensure_job_folder_created(base: &Path, job_id: JobId) -> io::Result<PathBuf> {
    let folder = job_folder(base, job_id);

    if !folder.is_dir() {
        match std::fs::create_dir_all(&folder) {
            Ok(()) => debug!(folder = ?folder, "Created job folder"),
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {}
            Err(error) => return Err(error),
        }
    }

    Ok(folder)
}

/// Search `root` recursively for a file called `name`, hidden folders are skipped
pub fn find_executable(root: &Path, name: &str) -> Result<Option<PathBuf>, globset::Error> {
    let matcher: GlobMatcher = GlobBuilder::new(name)
        .literal_separator(true)
        .build()?
        .compile_matcher();

    debug!(root = ?root, glob = ?matcher, "Searching for the simulator executable");

    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .hidden(true)
        .sort_by_file_name(|a, b| a.cmp(b));

    Ok(builder
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!("Skipped unreadable path during executable search: {error}");
                None
            }
        })
        .filter(|entry| entry.file_type().map_or(false, |kind| kind.is_file()))
        .map(|entry| entry.into_path())
        .find(|path| path.file_name().map_or(false, |file| matcher.is_match(file))))
}

/// exit code of a finished simulator, a process killed by a signal reports 128 + signal
#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(LAUNCH_FAILURE_CODE)
}

/// The external simulator bound to a single job database
#[derive(Debug, Clone)]
pub struct Simulator {
    pub executable: PathBuf,
    pub extension_dir: PathBuf,
    pub database: PathBuf,
    pub stdout_log: String,
    pub exponential: ExponentialMode,
    pub test_mode: bool,
}

impl Simulator {
    /// directory of the database, also the working directory handed to the simulator
    pub fn base_path(&self) -> PathBuf {
        self.database
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// build the argument vector for `job_id` and make sure its job folder exists
    pub fn invocation(&self, job_id: JobId) -> io::Result<SimulatorInvocation> {
        let base = self.base_path();
        let job_folder = ensure_job_folder_created(&base, job_id)?;

        let args = if self.test_mode {
            vec![base.into_os_string(), OsString::from("--bcall")]
        } else {
            vec![
                base.into_os_string(),
                OsString::from("-dbPath"),
                self.database.clone().into_os_string(),
                OsString::from("-jobId"),
                OsString::from(job_id.to_string()),
                OsString::from("-ioPath"),
                job_folder.clone().into_os_string(),
                OsString::from("-stdout"),
                OsString::from(&self.stdout_log),
                OsString::from("-fexp"),
                OsString::from(match self.exponential {
                    ExponentialMode::Fast => "true",
                    ExponentialMode::Exact => "false",
                }),
                OsString::from("-extDir"),
                self.extension_dir.clone().into_os_string(),
            ]
        };

        Ok(SimulatorInvocation {
            job_id,
            program: self.executable.clone(),
            args,
            job_folder,
        })
    }
}

impl JobRunner for Simulator {
    #[instrument(skip(self), level = "debug")]
    fn run(&self, job_id: JobId) -> JobOutcome {
        let start = Instant::now();

        let invocation = match self.invocation(job_id) {
            Ok(invocation) => invocation,
            Err(error) => {
                error!(job = job_id, "Failed to prepare job folder: {error}");

                return JobOutcome::new(job_id, LAUNCH_FAILURE_CODE, start.elapsed());
            }
        };

        info!(job = job_id, args = ?invocation.args, "Simulation start");

        let exit_code = match invocation.command().status() {
            Ok(status) => exit_code(status),
            Err(error) => {
                error!(job = job_id, program = ?invocation.program, "Failed to start simulator: {error}");

                LAUNCH_FAILURE_CODE
            }
        };

        let outcome = JobOutcome::new(job_id, exit_code, start.elapsed());
        if outcome.success() {
            info!(job = job_id, elapsed = ?outcome.elapsed, "Simulation completed");
        } else {
            warn!(job = job_id, exit_code, elapsed = ?outcome.elapsed, "Simulation failed");
        }

        outcome
    }
}
