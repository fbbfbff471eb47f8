use super::{provider::ProviderConfig, BatchError};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Display},
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

/// A batch script template together with its resource and environment settings
///
/// ```yaml
/// shell: zsh
/// cookies:
///   task_tag: ntasks
///   core_tag: cpus-per-task
///   entries:
///     - { tag: ntasks, value: "4" }
///     - { tag: cpus-per-task, value: "2" }
/// modules:
///   - { group: intel, name: "2019" }
/// execution:
///   interpreter: python3
///   executable: mocsim_mt.py
///   provider: { name: scheduling }
/// script: |
///   $shell $nl $cookies $modules $mpiexe $mpiflags $interpreter $executable $args
/// ```
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct BatchTemplate {
    #[serde(default = "default_shell")]
    pub shell: String,
    // keep rendered scripts on disk when false
    #[serde(default = "default_delete_scripts")]
    pub delete_scripts: bool,
    // render and log scripts without submitting them
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default)]
    pub disable_provider_overwrites: bool,
    #[serde(default = "default_submit_command")]
    pub submit_command: String,
    #[serde(default = "default_script_dir")]
    pub script_dir: PathBuf,
    pub cookies: CookieConfig,
    #[serde(default)]
    pub modules: Vec<EnvironmentModule>,
    pub execution: ExecutionConfig,
    pub script: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct CookieConfig {
    // tag of the cookie holding the number of tasks/ ranks
    pub task_tag: String,
    // tag of the cookie holding the number of cores per task
    pub core_tag: String,
    #[serde(default = "default_directive")]
    pub directive: String,
    #[serde(default)]
    pub entries: Vec<ResourceCookie>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ResourceCookie {
    pub tag: String,
    pub value: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentModule {
    pub group: String,
    pub name: String,
}

impl Display for EnvironmentModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module load {} {}", self.group, self.name)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub interpreter: String,
    pub executable: String,
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// message passing launcher inserted when a script requests more than one task
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct LauncherConfig {
    pub exec: String,
    pub flags: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            exec: String::from("$MPIEXEC"),
            flags: String::from("$FLAGS_MPI_BATCH"),
        }
    }
}

/// Mutable cookie block of one engine, tags are engine local configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSet {
    pub task_tag: String,
    pub core_tag: String,
    directive: String,
    cookies: Vec<ResourceCookie>,
}

impl CookieSet {
    pub fn new(config: &CookieConfig) -> Self {
        Self {
            task_tag: config.task_tag.clone(),
            core_tag: config.core_tag.clone(),
            directive: config.directive.clone(),
            cookies: config.entries.clone(),
        }
    }

    pub fn get(&self, tag: &str) -> Option<&ResourceCookie> {
        self.cookies.iter().find(|cookie| cookie.tag == tag)
    }

    /// set the value of the cookie with `tag`, returns false if no such cookie exists
    pub fn set(&mut self, tag: &str, value: &str) -> bool {
        match self.cookies.iter_mut().find(|cookie| cookie.tag == tag) {
            Some(cookie) => {
                cookie.value = Some(value.to_string());
                true
            }
            None => false,
        }
    }

    /// directive line of a single cookie, empty for cookies without value
    pub fn directive(&self, cookie: &ResourceCookie) -> String {
        match cookie.value {
            Some(ref value) if !cookie.tag.is_empty() => self
                .directive
                .replace("{tag}", &cookie.tag)
                .replace("{value}", value),
            _ => String::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceCookie> {
        self.cookies.iter()
    }
}

impl BatchTemplate {
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        let text = fs::read_to_string(path).map_err(|error| BatchError::io(path, error))?;
        let template = Self::parse(&text)?;

        info!(path = ?path, "Parsed batch template");

        Ok(template)
    }

    /// parse a template and normalize its script, runs of whitespace become one space
    pub fn parse(text: &str) -> Result<Self, BatchError> {
        let mut template: Self = serde_yaml::from_str(text)?;
        template.script = collapse_whitespace(&template.script);

        Ok(template)
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut pending = String::new();

    for c in text.chars() {
        if c.is_whitespace() {
            pending.push(c);
            continue;
        }

        match pending.chars().count() {
            0 => {}
            1 => collapsed.push_str(&pending),
            _ => collapsed.push(' '),
        }
        pending.clear();
        collapsed.push(c);
    }

    collapsed.trim().to_string()
}

fn default_shell() -> String {
    String::from("zsh")
}

fn default_delete_scripts() -> bool {
    true
}

fn default_submit_command() -> String {
    String::from("sbatch")
}

fn default_script_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_directive() -> String {
    String::from("#SBATCH --{tag}={value}")
}
