mod batch;
mod cli;
mod config;
mod database;
mod distributed;
mod executors;
mod jobs;
mod simulator;

use crate::{
    batch::engine::BatchScriptEngine,
    cli::{Cli, CliError, Commands, RunRequest},
    config::{ConfigErrors, RunnerConfig},
    database::ensure_exists,
    distributed::{local::LocalFabric, Communicator, SoloCommunicator},
    executors::{execute, ExecutionMode, RunReport, StrategyError},
    jobs::{compress, grouping, parse, JobId, JobSelection},
    simulator::Simulator,
};
use clap::Parser;
use itertools::Itertools;
use std::{
    error::Error,
    path::{Path, PathBuf},
    process::ExitCode,
    thread,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_unwrap::ResultExt;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            config,
            mode,
            simulate_ranks,
            args,
        } => run(config.as_deref(), mode, simulate_ranks, &args),
        Commands::Submit { template, args } => submit(&template, &args),
        Commands::Inspect { pack_size, db, spec } => inspect(pack_size, db.as_deref(), &spec),
    };

    match result {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            error!("{e}");
            let mut source = e.source();
            while let Some(cause) = source {
                error!("  caused by: {cause}");
                source = cause.source();
            }

            ExitCode::FAILURE
        }
    }
}

fn run(
    config: Option<&Path>,
    mode: Option<ExecutionMode>,
    simulate_ranks: Option<u64>,
    args: &[String],
) -> Result<i32, CliError> {
    let config = match config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };
    if config.preflight_checks() {
        return Err(ConfigErrors::PreflightFailed.into());
    }

    let request = RunRequest::parse(args)?;
    ensure_exists(&request.database)?;

    let jobs = request.selection.resolve(&request.database)?;
    if jobs.is_empty() {
        return Err(CliError::NoJobs(request.spec));
    }

    let simulator = config.simulator(request.database)?;
    let mode = mode.unwrap_or(config.execution_mode);

    let report = match simulate_ranks {
        Some(size) => execute_simulated(size as usize, mode, &jobs, &simulator)?,
        None => execute_in_world(mode, &jobs, &simulator)?,
    };

    for outcome in report.failed() {
        warn!(job = outcome.job_id, exit_code = outcome.exit_code, "Job failed");
    }

    Ok(report.exit_code())
}

fn log_command_line(communicator: &dyn Communicator) {
    if communicator.rank() == 0 {
        info!("Command: {}", std::env::args().join(" "));
    }
}

#[cfg(feature = "mpi")]
fn execute_in_world(
    mode: ExecutionMode,
    jobs: &[JobId],
    simulator: &Simulator,
) -> Result<RunReport, StrategyError> {
    use crate::distributed::mpi::MpiCommunicator;

    match MpiCommunicator::initialize() {
        Some(world) => {
            log_command_line(&world);
            execute(mode, jobs, &world, simulator)
        }
        None => execute(mode, jobs, &SoloCommunicator::unavailable(), simulator),
    }
}

#[cfg(not(feature = "mpi"))]
fn execute_in_world(
    mode: ExecutionMode,
    jobs: &[JobId],
    simulator: &Simulator,
) -> Result<RunReport, StrategyError> {
    let communicator = SoloCommunicator::unavailable();
    log_command_line(&communicator);

    execute(mode, jobs, &communicator, simulator)
}

/// every rank runs on its own thread, the reports are concatenated in rank order
fn execute_simulated(
    size: usize,
    mode: ExecutionMode,
    jobs: &[JobId],
    simulator: &Simulator,
) -> Result<RunReport, StrategyError> {
    let communicators = LocalFabric::new(size).communicators();
    log_command_line(&SoloCommunicator::single());
    info!("Simulating {size} ranks in process");

    let reports = thread::scope(|scope| {
        let handles = communicators
            .into_iter()
            .map(|communicator| scope.spawn(move || execute(mode, jobs, &communicator, simulator)))
            .collect_vec();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_log())
            .collect::<Result<Vec<_>, _>>()
    })?;

    Ok(RunReport {
        mode: reports.first().and_then(|report| report.mode),
        outcomes: reports
            .into_iter()
            .flat_map(|report| report.outcomes)
            .collect(),
    })
}

fn submit(template: &Path, args: &[String]) -> Result<i32, CliError> {
    let mut engine = BatchScriptEngine::load(template)?;
    let submitted = engine.submit(&args.iter().join(" "))?;

    Ok(submitted
        .iter()
        .rev()
        .filter_map(|script| script.status)
        .find(|status| *status != 0)
        .unwrap_or(0))
}

fn inspect(pack_size: Option<f64>, db: Option<&Path>, spec: &str) -> Result<i32, CliError> {
    let selection = parse(spec)?;
    let database = match db {
        Some(path) => {
            ensure_exists(path)?;
            path.to_path_buf()
        }
        None => PathBuf::new(),
    };
    let ids = match selection {
        JobSelection::All if db.is_none() => return Err(CliError::MissingDatabase),
        selection => selection.resolve(&database)?,
    };

    println!("ids:        {}", ids.iter().join(" "));
    println!("compressed: {}", compress(&ids));

    if let Some(pack_size) = pack_size {
        for group in grouping::group(&ids, pack_size)? {
            println!("group {:3}: {}", group.index, compress(&group.ids));
        }
    }

    Ok(0)
}
