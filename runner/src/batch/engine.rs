use super::{
    provider::{ArgumentProvider, ArgumentProviders, JobContext},
    template::{BatchTemplate, CookieSet},
    BatchError,
};
use itertools::Itertools;
use std::{
    fs::OpenOptions,
    io::Write,
    ops::Deref,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Rendered script on disk, removed again on drop unless it should be retained
#[derive(Debug)]
pub struct ScriptFile {
    path: PathBuf,
    delete: bool,
}

impl Drop for ScriptFile {
    fn drop(&mut self) {
        if !self.delete {
            return;
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = ?self.path, "Removed batch script"),
            Err(error) => error!(error = ?error, path = ?self.path, "Failed to clean up batch script"),
        }
    }
}

impl Deref for ScriptFile {
    type Target = PathBuf;

    fn deref(&self) -> &Self::Target {
        &self.path
    }
}

/// task and core layout derived from the task and core cookies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    pub task_count: usize,
    pub cores_per_task: usize,
    pub mpi_exe: String,
    pub mpi_flags: String,
}

/// Record of one script handed to the batch system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedScript {
    pub index: usize,
    pub arguments: String,
    pub task_count: usize,
    pub cores_per_task: usize,
    pub path: PathBuf,
    /// exit status of the submission command, `None` in test mode
    pub status: Option<i32>,
}

/// Renders batch scripts from a template and submits them
#[derive(Debug, Clone)]
pub struct BatchScriptEngine {
    template: BatchTemplate,
    cookies: CookieSet,
    settings: LaunchSettings,
}

impl BatchScriptEngine {
    pub fn new(template: BatchTemplate) -> Result<Self, BatchError> {
        let cookies = CookieSet::new(&template.cookies);
        let settings = Self::detect_launch_settings(&template, &cookies)?;

        Ok(Self {
            template,
            cookies,
            settings,
        })
    }

    pub fn load(path: &Path) -> Result<Self, BatchError> {
        let engine = Self::new(BatchTemplate::load(path)?)?;

        info!("Argument provider: {}", engine.provider().name());
        info!("Auto script deletion: [{}]", engine.template.delete_scripts);
        info!(
            "Parallel default: [Ranks: {:3} Cores: {:3}]",
            engine.settings.task_count, engine.settings.cores_per_task
        );

        Ok(engine)
    }

    pub fn cookies(&self) -> &CookieSet {
        &self.cookies
    }

    pub fn settings(&self) -> &LaunchSettings {
        &self.settings
    }

    pub fn provider(&self) -> ArgumentProviders {
        ArgumentProviders::load(&self.template.execution.provider)
    }

    fn cookie_number(cookies: &CookieSet, tag: &str) -> Result<usize, BatchError> {
        let cookie = cookies
            .get(tag)
            .ok_or_else(|| BatchError::MissingCookie(tag.to_string()))?;
        let value = cookie.value.as_deref().unwrap_or_default().trim();

        value.parse().map_err(|_| BatchError::InvalidCookie {
            tag: tag.to_string(),
            value: value.to_string(),
        })
    }

    fn detect_launch_settings(
        template: &BatchTemplate,
        cookies: &CookieSet,
    ) -> Result<LaunchSettings, BatchError> {
        let task_count = Self::cookie_number(cookies, &cookies.task_tag)?;
        let cores_per_task = Self::cookie_number(cookies, &cookies.core_tag)?.max(1);
        let launcher = &template.execution.launcher;
        let (mpi_exe, mpi_flags) = if task_count > 1 {
            (launcher.exec.clone(), launcher.flags.clone())
        } else {
            (String::new(), String::new())
        };

        Ok(LaunchSettings {
            task_count,
            cores_per_task,
            mpi_exe,
            mpi_flags,
        })
    }

    /// snapshot handed to argument providers
    pub fn job_context(&self, arguments: &str) -> JobContext {
        JobContext {
            arguments: arguments.to_string(),
            task_count: self.settings.task_count,
            cores_per_task: self.settings.cores_per_task,
            task_tag: self.cookies.task_tag.clone(),
            core_tag: self.cookies.core_tag.clone(),
        }
    }

    /// Change the value of a cookie, returns whether a cookie was changed
    ///
    /// Templates can block provider overwrites, the request is only logged then.
    pub fn overwrite_cookie(
        &mut self,
        tag: &str,
        value: &str,
        sender: &str,
    ) -> Result<bool, BatchError> {
        if tag.trim().is_empty() {
            return Err(BatchError::BlankCookieTag);
        }

        if self.template.disable_provider_overwrites {
            info!("{sender}: [OVERWRITE BLOCKED: {tag}]");
            return Ok(false);
        }

        if !self.cookies.set(tag, value) {
            warn!("{sender}: no cookie with tag '{tag}' to overwrite");
            return Ok(false);
        }

        if let Some(cookie) = self.cookies.get(tag) {
            info!("{sender}: [OVERWRITE: {}]", self.cookies.directive(cookie));
        }
        self.settings = Self::detect_launch_settings(&self.template, &self.cookies)?;

        Ok(true)
    }

    /// Render the script for `arguments`
    ///
    /// Markers are replaced in a fixed order: shell, cookies, modules, execution
    /// tokens, newlines and finally the argument string.
    pub fn render(&self, arguments: &str) -> String {
        let cookies = self
            .cookies
            .iter()
            .map(|cookie| self.cookies.directive(cookie))
            .filter(|directive| !directive.is_empty())
            .map(|directive| format!("{directive} $nl"))
            .join("");
        let modules = self
            .template
            .modules
            .iter()
            .map(|module| format!("{module} $nl"))
            .join("");
        let execution = &self.template.execution;

        let script = self
            .template
            .script
            .replace("$shell", &format!("#!/usr/bin/env {}", self.template.shell))
            .replace("$cookies", &cookies)
            .replace("$modules", &modules);
        let script = script
            .trim()
            .replace("$mpiexe", &self.settings.mpi_exe)
            .replace("$mpiflags", &self.settings.mpi_flags)
            .replace("$interpreter", &execution.interpreter)
            .replace("$executable", &execution.executable);

        collapse_newline_markers(&script).replace("$args", arguments)
    }

    /// write `text` into a new, uniquely named script file
    pub fn write_script(&self, text: &str) -> Result<ScriptFile, BatchError> {
        let path = self
            .template
            .script_dir
            .join(format!("{}.sh", Uuid::new_v4()));

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|error| BatchError::io(&path, error))?;
        file.write_all(text.as_bytes())
            .map_err(|error| BatchError::io(&path, error))?;

        Ok(ScriptFile {
            path,
            delete: self.template.delete_scripts,
        })
    }

    fn submit_script(&self, script: &ScriptFile) -> Result<i32, BatchError> {
        let command_line = &self.template.submit_command;
        let mut parts = command_line.split_whitespace();
        let program = parts.next().ok_or(BatchError::EmptySubmitCommand)?;

        let status = Command::new(program)
            .args(parts)
            .arg(script.as_path())
            .status()
            .map_err(|error| BatchError::Submit {
                command: command_line.clone(),
                error,
            })?;
        let code = status.code().unwrap_or(-1);

        if !status.success() {
            warn!(script = ?script.as_path(), code, "Submission command failed");
        }

        Ok(code)
    }

    /// Submit one script per element of the provider's argument set
    #[instrument(skip(self), level = "info")]
    pub fn submit(&mut self, arguments: &str) -> Result<Vec<SubmittedScript>, BatchError> {
        let provider = self.provider();
        let argument_set = provider.argument_set(&self.job_context(arguments))?;
        let mut submitted = Vec::new();

        for (index, argument) in argument_set.enumerate() {
            for overwrite in argument.overwrites.iter() {
                self.overwrite_cookie(&overwrite.tag, &overwrite.value, provider.name())?;
            }

            let script = self.write_script(&self.render(&argument.arguments))?;
            info!("[{index}] [PROVIDER DATA]: {}", argument.arguments);
            info!(
                "[{index}] [RANKS: {:3} CORES: {:3}]: {}",
                self.settings.task_count,
                self.settings.cores_per_task,
                script.display()
            );

            let status = if self.template.test_mode {
                None
            } else {
                Some(self.submit_script(&script)?)
            };

            submitted.push(SubmittedScript {
                index,
                arguments: argument.arguments,
                task_count: self.settings.task_count,
                cores_per_task: self.settings.cores_per_task,
                path: script.to_path_buf(),
                status,
            });
        }

        info!("Submission completed with {} scripts", submitted.len());

        Ok(submitted)
    }
}

/// replace every `$nl` marker and the whitespace around it with a single newline
fn collapse_newline_markers(text: &str) -> String {
    let parts = text.split("$nl").collect_vec();
    let last = parts.len() - 1;

    parts
        .iter()
        .enumerate()
        .map(|(index, part)| match (index == 0, index == last) {
            (true, true) => *part,
            (true, false) => part.trim_end(),
            (false, true) => part.trim_start(),
            (false, false) => part.trim(),
        })
        .join("\n")
}
