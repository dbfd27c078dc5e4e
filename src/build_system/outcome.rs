// Per-candidate run outcomes and the aggregate verdict folded from them

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::build_system::error::{BuildResult, BuildSystemError};
use crate::build_system::process::ProcessOutput;

/// Success iff the exit code is zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Success,
    Failure,
}

/// Result of one external invocation for one candidate file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub candidate: PathBuf,
    pub output_file: Option<PathBuf>,
    pub exit_code: i32,
    #[serde(skip)]
    pub stdout: Vec<u8>,
    #[serde(skip)]
    pub stderr: Vec<u8>,
    pub duration: Duration,
}

impl RunOutcome {
    pub fn from_output(candidate: &Path, output_file: Option<PathBuf>, output: ProcessOutput) -> Self {
        Self {
            candidate: candidate.to_path_buf(),
            output_file,
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            duration: output.duration,
        }
    }

    pub fn classification(&self) -> Classification {
        if self.exit_code == 0 {
            Classification::Success
        } else {
            Classification::Failure
        }
    }

    pub fn succeeded(&self) -> bool {
        self.classification() == Classification::Success
    }

    /// `ProcessFailed` naming `tool` unless the run succeeded
    pub fn ensure_success(&self, tool: &str) -> BuildResult<()> {
        if self.succeeded() {
            Ok(())
        } else {
            Err(BuildSystemError::ProcessFailed {
                tool: tool.to_string(),
                exit_code: self.exit_code,
            })
        }
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Batch-level conclusion: counts plus the policy-applied proceed/abort flag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateVerdict {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// True when the caller may proceed, false when the batch must be reported as failed
    pub proceed: bool,
    /// Set when the whole pass was skipped by configuration
    pub skipped: bool,
    pub outcomes: Vec<RunOutcome>,
}

impl AggregateVerdict {
    /// Fold outcomes into a verdict. Failures abort unless `tolerate_failures` is set.
    pub fn fold(outcomes: Vec<RunOutcome>, tolerate_failures: bool) -> Self {
        let total = outcomes.len();
        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
        let failed = total - succeeded;

        Self {
            total,
            succeeded,
            failed,
            proceed: failed == 0 || tolerate_failures,
            skipped: false,
            outcomes,
        }
    }

    pub fn skipped() -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            proceed: true,
            skipped: true,
            outcomes: Vec::new(),
        }
    }

    /// Turn an abort verdict into `BatchFailed`, keeping a proceed verdict
    pub fn into_result(self) -> BuildResult<Self> {
        if self.proceed {
            Ok(self)
        } else {
            Err(BuildSystemError::BatchFailed(self.summary()))
        }
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        if self.skipped {
            return "skipped".to_string();
        }
        format!(
            "{} processed, {} succeeded, {} failed",
            self.total, self.succeeded, self.failed
        )
    }
}

/// Serialized form of a finished batch, written by the CLI with `--report`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub goal: String,
    pub finished_at: DateTime<Utc>,
    pub verdict: AggregateVerdict,
}

impl BatchReport {
    pub fn new(goal: impl Into<String>, verdict: AggregateVerdict) -> Self {
        Self {
            goal: goal.into(),
            finished_at: Utc::now(),
            verdict,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
