// Process invocation boundary
// Runs one external command synchronously and captures its exit code and streams

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

/// The external process could not be started
#[derive(Debug, Error)]
#[error("unable to execute '{}': {source}", .program.display())]
pub struct LaunchError {
    pub program: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl LaunchError {
    pub fn new(program: PathBuf, source: std::io::Error) -> Self {
        Self { program, source }
    }
}

/// A fully specified external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Arguments rendered lossily, mostly for assertions and logs
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Fixed program and argument prefix shared by every candidate of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: PathBuf,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
}

impl CommandTemplate {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn push_arg(&mut self, arg: impl AsRef<OsStr>) {
        self.args.push(arg.as_ref().to_os_string());
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Build the invocation for one candidate by appending its variable tail
    pub fn invocation<I, S>(&self, tail: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut args = self.args.clone();
        args.extend(tail.into_iter().map(|a| a.as_ref().to_os_string()));
        Invocation {
            program: self.program.clone(),
            args,
            working_dir: self.working_dir.clone(),
        }
    }
}

/// Exit code and captured streams of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands. Implementations block until the process exits.
pub trait ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, LaunchError>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, LaunchError> {
        (**self).run(invocation)
    }
}

/// `ProcessRunner` backed by `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, LaunchError> {
        let start = Instant::now();

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        // Pipes are closed when `output` returns, before the next candidate starts.
        let output = command
            .output()
            .map_err(|e| LaunchError::new(invocation.program.clone(), e))?;

        Ok(ProcessOutput {
            // Terminated by a signal.
            exit_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
            duration: start.elapsed(),
        })
    }
}
