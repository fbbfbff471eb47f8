use crate::{
    batch::BatchError,
    config::ConfigErrors,
    database::ConnectionError,
    executors::{ExecutionMode, StrategyError},
    jobs::{find_parameter_value, parse, JobError, JobSelection},
};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use std::path::PathBuf;
use thiserror::Error;

#[cfg(test)]
mod cli_test;

/// Distributes simulation jobs of a job database over local workers, message passing
/// ranks or batch scripts
#[derive(Parser, Debug)]
#[command(name = "mocsim", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run jobs of a database, either `db=<path> jobs=<spec>` or `<path> <spec>...`
    Run {
        /// YAML runner config
        #[arg(long)]
        config: Option<PathBuf>,

        /// overrides the execution mode of the config
        #[arg(long, value_enum)]
        mode: Option<ExecutionMode>,

        /// run N in-process ranks instead of joining a message passing world
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        simulate_ranks: Option<u64>,

        #[arg(required = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Render batch scripts from a template and hand them to the batch system
    Submit {
        template: PathBuf,

        #[arg(required = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print the ids, compressed form and groups of a job specification
    Inspect {
        #[arg(long)]
        pack_size: Option<f64>,

        /// database used to resolve `all`
        #[arg(long)]
        db: Option<PathBuf>,

        spec: String,
    },
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid job arguments")]
    Job(#[from] JobError),
    #[error("Job database not usable")]
    Connection(#[from] ConnectionError),
    #[error("Invalid runner config")]
    Config(#[from] ConfigErrors),
    #[error("Execution failed")]
    Strategy(#[from] StrategyError),
    #[error("Batch submission failed")]
    Batch(#[from] BatchError),
    #[error("Arguments name no database, use db=<path> or pass it first")]
    MissingDatabase,
    #[error("Job selection '{0}' contains no jobs")]
    NoJobs(String),
}

/// database and job selection of a `run` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub database: PathBuf,
    pub spec: String,
    pub selection: JobSelection,
}

impl RunRequest {
    /// Accepts `db=<path> jobs=<spec>` anywhere in the arguments, otherwise the first
    /// argument is the database and all remaining ones form the job specification
    pub fn parse(args: &[String]) -> Result<Self, CliError> {
        let joined = args.iter().join(" ");

        let (database, spec) = match find_parameter_value("db", &joined) {
            Some(database) => (
                PathBuf::from(database),
                find_parameter_value("jobs", &joined)
                    .ok_or_else(|| JobError::MissingParameter(String::from("jobs")))?
                    .to_string(),
            ),
            None => match args.split_first() {
                Some((database, spec)) if !spec.is_empty() => {
                    (PathBuf::from(database), spec.iter().join(","))
                }
                Some(_) => {
                    return Err(JobError::MissingParameter(String::from("jobs")).into())
                }
                None => return Err(CliError::MissingDatabase),
            },
        };

        let selection = parse(&spec)?;

        Ok(Self {
            database,
            spec,
            selection,
        })
    }
}
