// Dart VM script runner
// Builds the VM flag template and runs one designated script

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::build_system::config::BuildConfig;
use crate::build_system::error::{BuildResult, BuildSystemError};
use crate::build_system::outcome::RunOutcome;
use crate::build_system::process::{CommandTemplate, ProcessRunner, SystemProcessRunner};

/// Fixed VM argument prefix shared by the script runner and the test runner
pub fn vm_template(dart: impl Into<PathBuf>, config: &BuildConfig) -> CommandTemplate {
    let script = &config.script;
    let mut template = CommandTemplate::new(dart);

    if script.checked_mode {
        template.push_arg("--checked");
    }
    if script.debug {
        match script.debug_port {
            Some(port) => template.push_arg(format!("--debug:{}", port)),
            None => template.push_arg("--debug"),
        }
    }
    if let Some(location) = &script.break_at {
        template.push_arg(format!("--break_at={}", location));
    }
    if let Some(snapshot) = &script.use_script_snapshot {
        let mut arg = OsString::from("--use_script_snapshot=");
        arg.push(config.resolve(snapshot));
        template.push_arg(arg);
    }
    if let Some(package_root) = config.package_root() {
        let mut arg = OsString::from("--package-root=");
        arg.push(package_root);
        template.push_arg(arg);
    }

    template
}

/// Script path resolved against the source directory
pub fn resolve_script(config: &BuildConfig, script: &Path) -> PathBuf {
    if script.is_absolute() {
        script.to_path_buf()
    } else {
        config.source_directory().join(script)
    }
}

/// Runs a single script with the Dart VM
pub struct ScriptRunner<R: ProcessRunner = SystemProcessRunner> {
    runner: R,
}

impl ScriptRunner<SystemProcessRunner> {
    pub fn new() -> Self {
        Self::with_runner(SystemProcessRunner)
    }
}

impl Default for ScriptRunner<SystemProcessRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ProcessRunner> ScriptRunner<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    /// Run `script` and return its outcome whatever the exit code.
    /// The script must be an existing, readable regular file.
    pub fn execute(&self, template: &CommandTemplate, script: &Path) -> BuildResult<RunOutcome> {
        check_script(script)?;
        log::info!("Dart script to execute: {}", script.display());

        let invocation = template.invocation([script.as_os_str()]);
        log::debug!("Execute dart: {}", invocation);

        let output = self
            .runner
            .run(&invocation)
            .map_err(|source| BuildSystemError::Launch {
                candidate: script.to_path_buf(),
                completed: Vec::new(),
                source,
            })?;
        log::debug!("dart return code: {}", output.exit_code);

        Ok(RunOutcome::from_output(script, None, output))
    }

    /// Run `script`, failing with `ProcessFailed` on a nonzero exit
    pub fn run(&self, template: &CommandTemplate, script: &Path) -> BuildResult<RunOutcome> {
        let outcome = self.execute(template, script)?;
        outcome.ensure_success("Dart")?;
        Ok(outcome)
    }
}

fn check_script(script: &Path) -> BuildResult<()> {
    if !script.is_file() {
        return Err(BuildSystemError::Configuration(format!(
            "Script must be a file: {}",
            script.display()
        )));
    }
    File::open(script).map_err(|e| {
        BuildSystemError::Configuration(format!(
            "Script must be a readable file: {} ({})",
            script.display(),
            e
        ))
    })?;
    Ok(())
}
