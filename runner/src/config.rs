use crate::{
    executors::ExecutionMode,
    simulator::{find_executable, ExponentialMode, Simulator, SIMULATOR_NAME},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::Error,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{error, info, warn};

#[cfg(all(test, unix))]
mod config_test;

static DEFAULT_SEARCH_PATH: Lazy<PathBuf> = Lazy::new(|| match std::env::var_os("HOME") {
    Some(home) => PathBuf::from(home),
    None => {
        warn!("HOME is not set, searching for the simulator in the working directory");
        PathBuf::from(".")
    }
});

// check if a file is executable
#[cfg(unix)]
pub fn check_executable(path: &Path) -> Result<bool, ConfigErrors> {
    use std::os::unix::fs::MetadataExt;

    if !path.is_file() {
        Err(ConfigErrors::FileNotFound(path.to_path_buf()))
    } else {
        match File::open(path).map(|file| file.metadata()) {
            Ok(Ok(metadata)) => Ok((metadata.mode() & 0o111) != 0),
            Ok(Err(e)) | Err(e) => Err(ConfigErrors::MetadataNotFound(e)),
        }
    }
}

// without permission bits every readable file counts as executable
#[cfg(not(unix))]
pub fn check_executable(path: &Path) -> Result<bool, ConfigErrors> {
    if !path.is_file() {
        Err(ConfigErrors::FileNotFound(path.to_path_buf()))
    } else {
        File::open(path)
            .and_then(|file| file.metadata())
            .map(|metadata| metadata.is_file())
            .map_err(ConfigErrors::MetadataNotFound)
    }
}

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Failed to read config file {0:?}")]
    ReadFailed(PathBuf, #[source] Error),
    #[error("Config file is not valid")]
    InvalidConfig(#[from] serde_yaml::Error),
    #[error("Simulator name is not a valid glob")]
    InvalidGlobs(#[from] globset::Error),
    #[error("File {0:?} not found")]
    FileNotFound(PathBuf),
    #[error("Metadata not found")]
    MetadataNotFound(#[from] Error),
    #[error("No simulator executable '{SIMULATOR_NAME}' below {0:?}")]
    ExecutableNotFound(PathBuf),
    #[error("Config contains errors, see the log for details")]
    PreflightFailed,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    // simulator binary, searched below `search_path` when missing
    pub executable: Option<PathBuf>,
    // extension directory handed to the simulator, defaults to the executable's folder
    pub extension_dir: Option<PathBuf>,
    pub search_path: Option<PathBuf>,
    #[serde(default = "default_stdout_log")]
    pub stdout_log: String,
    #[serde(default)]
    pub exponential_mode: ExponentialMode,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub test_mode: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            executable: None,
            extension_dir: None,
            search_path: None,
            stdout_log: default_stdout_log(),
            exponential_mode: ExponentialMode::default(),
            execution_mode: ExecutionMode::default(),
            test_mode: false,
        }
    }
}

impl RunnerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        let text =
            fs::read_to_string(path).map_err(|e| ConfigErrors::ReadFailed(path.to_path_buf(), e))?;

        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigErrors> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn search_path(&self) -> &Path {
        self.search_path
            .as_deref()
            .unwrap_or_else(|| DEFAULT_SEARCH_PATH.as_path())
    }

    pub fn preflight_checks(&self) -> bool {
        // report every problem at once instead of failing on the first one
        let mut contains_error = false;

        if let Some(ref executable) = self.executable {
            match check_executable(executable) {
                Ok(true) => {}
                Ok(false) => {
                    error!(
                        "executable {} is not executable",
                        executable.to_string_lossy()
                    );
                    contains_error = true;
                }
                Err(e) => {
                    error!(
                        "Failed to check executable ({}): {e}",
                        executable.to_string_lossy()
                    );
                    contains_error = true;
                }
            }
        } else if !self.search_path().is_dir() {
            error!(
                "No executable configured and search_path {} is not a directory",
                self.search_path().to_string_lossy()
            );
            contains_error = true;
        }

        if let Some(ref extension_dir) = self.extension_dir {
            if !extension_dir.is_dir() {
                error!(
                    "extension_dir {} is not a directory",
                    extension_dir.to_string_lossy()
                );
                contains_error = true;
            }
        }

        if self.stdout_log.trim().is_empty() {
            error!("stdout_log cannot be empty, the simulator needs a log file name");
            contains_error = true;
        }

        if self.test_mode {
            warn!("Test mode is enabled, the simulator will only be called with --bcall");
        }

        contains_error
    }

    /// the configured executable or the first match of the simulator name below the search path
    pub fn locate_executable(&self) -> Result<PathBuf, ConfigErrors> {
        if let Some(ref executable) = self.executable {
            return Ok(executable.clone());
        }

        let root = self.search_path();
        match find_executable(root, SIMULATOR_NAME)? {
            Some(executable) => {
                info!("Found simulator at {}", executable.to_string_lossy());
                Ok(executable)
            }
            None => Err(ConfigErrors::ExecutableNotFound(root.to_path_buf())),
        }
    }

    /// bind the simulator to `database`
    pub fn simulator(&self, database: PathBuf) -> Result<Simulator, ConfigErrors> {
        let executable = self.locate_executable()?;
        let extension_dir = match self.extension_dir {
            Some(ref extension_dir) => extension_dir.clone(),
            None => executable
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        Ok(Simulator {
            executable,
            extension_dir,
            database,
            stdout_log: self.stdout_log.clone(),
            exponential: self.exponential_mode,
            test_mode: self.test_mode,
        })
    }
}

fn default_stdout_log() -> String {
    String::from("stdout.log")
}
