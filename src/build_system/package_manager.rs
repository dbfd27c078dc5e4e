// Package manager step
// Runs `pub install` or `pub update` inside the source directory

use std::fmt;
use std::path::PathBuf;

use crate::build_system::config::BuildConfig;
use crate::build_system::error::{BuildResult, BuildSystemError};
use crate::build_system::outcome::RunOutcome;
use crate::build_system::process::{CommandTemplate, ProcessRunner, SystemProcessRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PubCommand {
    Install,
    Update,
}

impl PubCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            PubCommand::Install => "install",
            PubCommand::Update => "update",
        }
    }
}

impl fmt::Display for PubCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PubSettings {
    /// Package root, used as the working directory
    pub source_root: PathBuf,
    pub command: PubCommand,
    pub skip: bool,
}

impl PubSettings {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            source_root: config.source_directory(),
            command: if config.package_manager.update {
                PubCommand::Update
            } else {
                PubCommand::Install
            },
            skip: config.package_manager.skip,
        }
    }
}

pub struct PackageManager<R: ProcessRunner = SystemProcessRunner> {
    settings: PubSettings,
    runner: R,
}

impl PackageManager<SystemProcessRunner> {
    pub fn new(settings: PubSettings) -> Self {
        Self::with_runner(settings, SystemProcessRunner)
    }
}

impl<R: ProcessRunner> PackageManager<R> {
    pub fn with_runner(settings: PubSettings, runner: R) -> Self {
        Self { settings, runner }
    }

    /// Run pub for the package root. `None` when the step is skipped.
    pub fn run(&self, pub_executable: impl Into<PathBuf>) -> BuildResult<Option<RunOutcome>> {
        if self.settings.skip {
            log::info!("Updating dependencies (pub packagemanager) is skipped.");
            return Ok(None);
        }

        let root = &self.settings.source_root;
        if !root.is_dir() {
            return Err(BuildSystemError::Configuration(format!(
                "Package root is not a directory: {}",
                root.display()
            )));
        }

        let invocation = CommandTemplate::new(pub_executable)
            .working_dir(root)
            .invocation([self.settings.command.as_str()]);
        log::info!("Run pub for package root: {}", root.display());
        log::debug!("Execute pub command: {}", invocation);

        let output = self
            .runner
            .run(&invocation)
            .map_err(|source| BuildSystemError::Launch {
                candidate: root.clone(),
                completed: Vec::new(),
                source,
            })?;
        log::debug!("pub return code: {}", output.exit_code);

        let outcome = RunOutcome::from_output(root, None, output);
        outcome.ensure_success("Pub")?;
        Ok(Some(outcome))
    }
}
