use super::BatchError;
use crate::{
    jobs::{compress, grouping, parse, require_parameter, JobId},
    simulator::job_folder,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// marker a finished simulation writes into its run log
pub const COMPLETION_TAG: &str = "ABORT_REASON";

/// Provider selection inside a batch template
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum ProviderConfig {
    #[default]
    Single,
    Scheduling {
        #[serde(default = "default_filter_completed")]
        filter_completed: bool,
        #[serde(default = "default_log_name")]
        log_name: String,
    },
}

/// Snapshot of the batch job a provider derives its argument strings from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    pub arguments: String,
    pub task_count: usize,
    pub cores_per_task: usize,
    pub task_tag: String,
    pub core_tag: String,
}

impl JobContext {
    /// number of jobs a single script can run with its requested resources
    pub fn target_job_count(&self) -> usize {
        self.task_count * self.cores_per_task
    }
}

/// request to change a resource cookie before the next script is rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOverwrite {
    pub tag: String,
    pub value: String,
}

/// One element of an argument set, results in exactly one submitted script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderArgument {
    pub arguments: String,
    pub overwrites: Vec<CookieOverwrite>,
}

impl ProviderArgument {
    pub fn plain(arguments: String) -> Self {
        Self {
            arguments,
            overwrites: Vec::new(),
        }
    }
}

pub type ArgumentSet = Box<dyn Iterator<Item = ProviderArgument>>;

/// Yields the argument strings of the batch scripts to submit
///
/// Every call derives a fresh sequence from the current state of the job.
pub trait ArgumentProvider {
    fn name(&self) -> &'static str;

    fn argument_set(&self, context: &JobContext) -> Result<ArgumentSet, BatchError>;
}

/// All available providers, selected through `ProviderConfig`
#[derive(Debug, Clone)]
pub enum ArgumentProviders {
    Single(SingleArgumentProvider),
    Scheduling(SchedulingArgumentProvider),
}

impl ArgumentProviders {
    pub fn load(config: &ProviderConfig) -> Self {
        match config {
            ProviderConfig::Single => Self::Single(SingleArgumentProvider),
            ProviderConfig::Scheduling {
                filter_completed,
                log_name,
            } => Self::Scheduling(SchedulingArgumentProvider {
                filter_completed: *filter_completed,
                log_name: log_name.clone(),
            }),
        }
    }
}

impl ArgumentProvider for ArgumentProviders {
    fn name(&self) -> &'static str {
        match self {
            Self::Single(provider) => provider.name(),
            Self::Scheduling(provider) => provider.name(),
        }
    }

    fn argument_set(&self, context: &JobContext) -> Result<ArgumentSet, BatchError> {
        match self {
            Self::Single(provider) => provider.argument_set(context),
            Self::Scheduling(provider) => provider.argument_set(context),
        }
    }
}

/// Passes the caller's argument string through unchanged, once
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleArgumentProvider;

impl ArgumentProvider for SingleArgumentProvider {
    fn name(&self) -> &'static str {
        "single"
    }

    fn argument_set(&self, context: &JobContext) -> Result<ArgumentSet, BatchError> {
        Ok(Box::new(std::iter::once(ProviderArgument::plain(
            context.arguments.clone(),
        ))))
    }
}

/// Splits the selected jobs into scripts sized to the requested tasks and cores
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingArgumentProvider {
    pub filter_completed: bool,
    pub log_name: String,
}

impl Default for SchedulingArgumentProvider {
    fn default() -> Self {
        Self {
            filter_completed: default_filter_completed(),
            log_name: default_log_name(),
        }
    }
}

impl SchedulingArgumentProvider {
    /// Drop jobs whose run log already carries the completion tag
    ///
    /// A crashed run never writes the tag and is therefore submitted again.
    pub fn filter_by_completion_tag(
        &self,
        jobs: Vec<JobId>,
        database: &Path,
    ) -> Result<Vec<JobId>, BatchError> {
        let base = database
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut submit = Vec::new();
        let mut completed = Vec::new();

        for job_id in jobs {
            let log = job_folder(&base, job_id).join(&self.log_name);

            if !log.is_file() {
                submit.push(job_id);
                continue;
            }

            let content = fs::read(&log).map_err(|error| BatchError::io(&log, error))?;
            if String::from_utf8_lossy(&content).contains(COMPLETION_TAG) {
                completed.push(job_id);
            } else {
                submit.push(job_id);
            }
        }

        if !completed.is_empty() {
            info!("Found incomplete jobs [{}]", compress(&submit));
            info!("Found completed jobs  [{}]", compress(&completed));
        }

        Ok(submit)
    }
}

impl ArgumentProvider for SchedulingArgumentProvider {
    fn name(&self) -> &'static str {
        "scheduling"
    }

    fn argument_set(&self, context: &JobContext) -> Result<ArgumentSet, BatchError> {
        let database = require_parameter("db", &context.arguments)?.to_string();
        let selection = parse(require_parameter("jobs", &context.arguments)?)?;
        let mut jobs = selection.resolve(Path::new(&database))?;

        if self.filter_completed {
            jobs = self.filter_by_completion_tag(jobs, Path::new(&database))?;
        }

        let target = context.target_job_count();
        let groups = grouping::group(&jobs, target as f64)?;
        debug!(jobs = jobs.len(), target_size = target, groups = groups.len(), "Scheduled job groups");

        let task_tag = context.task_tag.clone();
        let core_tag = context.core_tag.clone();

        Ok(Box::new(groups.into_iter().map(move |group| {
            // shrink the resource request of a short trailing group
            let overwrites = if group.len() < target {
                vec![
                    CookieOverwrite {
                        tag: task_tag.clone(),
                        value: group.len().to_string(),
                    },
                    CookieOverwrite {
                        tag: core_tag.clone(),
                        value: String::from("1"),
                    },
                ]
            } else {
                Vec::new()
            };

            ProviderArgument {
                arguments: format!("db={database} jobs={}", compress(&group.ids)),
                overwrites,
            }
        })))
    }
}

fn default_filter_completed() -> bool {
    true
}

fn default_log_name() -> String {
    String::from("stdout.log")
}
