// Shared fixtures for dartbuild integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use dartbuild::build_system::{Invocation, LaunchError, ProcessOutput, ProcessRunner};

/// Process runner that records invocations and answers from a script.
///
/// Exit codes are keyed by the file name of the candidate, found as the
/// first argument after the template prefix whose file name matches.
#[derive(Default)]
pub struct ScriptedRunner {
    invocations: Mutex<Vec<Invocation>>,
    exit_codes: HashMap<String, i32>,
    launch_failure_on: Option<String>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `code` for the candidate whose file name is `file_name`
    pub fn exit_code(mut self, file_name: &str, code: i32) -> Self {
        self.exit_codes.insert(file_name.to_string(), code);
        self
    }

    /// Fail to launch when the candidate `file_name` comes up
    pub fn launch_failure(mut self, file_name: &str) -> Self {
        self.launch_failure_on = Some(file_name.to_string());
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// File names of the candidates, in the order they were run
    pub fn candidates(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .filter_map(|invocation| self.candidate_name(invocation))
            .collect()
    }

    fn candidate_name(&self, invocation: &Invocation) -> Option<String> {
        invocation
            .args
            .iter()
            .filter_map(|arg| Path::new(arg).file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .find(|name| name.ends_with(".dart"))
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, LaunchError> {
        self.invocations.lock().unwrap().push(invocation.clone());

        let candidate = self.candidate_name(invocation).unwrap_or_default();
        if self.launch_failure_on.as_deref() == Some(candidate.as_str()) {
            return Err(LaunchError::new(
                invocation.program.clone(),
                io::Error::new(io::ErrorKind::NotFound, "no such file"),
            ));
        }

        let exit_code = self.exit_codes.get(&candidate).copied().unwrap_or(0);
        Ok(ProcessOutput {
            exit_code,
            stdout: format!("ran {}\n", candidate).into_bytes(),
            ..Default::default()
        })
    }
}

/// Write `path` (creating parents) and return it
pub fn touch(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, "// generated by tests\n").unwrap();
    path.to_path_buf()
}

/// Fixed reference instant, far enough from "now" to avoid clock noise
pub fn epoch() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000)
}

/// Set the modification time of `path` to `epoch() + offset_millis`
pub fn set_mtime(path: impl AsRef<Path>, offset_millis: u64) {
    let file = fs::File::options().write(true).open(path.as_ref()).unwrap();
    file.set_modified(epoch() + Duration::from_millis(offset_millis))
        .unwrap();
}

/// Create `source` and `output` with the given relative timestamps
pub fn source_and_output(source: &Path, source_millis: u64, output: &Path, output_millis: u64) {
    touch(source);
    touch(output);
    set_mtime(source, source_millis);
    set_mtime(output, output_millis);
}
