// Error taxonomy for the dartbuild build system
// Configuration, toolchain, launch and batch failures are kept as distinct variants

use std::path::PathBuf;
use thiserror::Error;

use crate::build_system::environment::ToolchainError;
use crate::build_system::outcome::RunOutcome;
use crate::build_system::process::LaunchError;

/// Errors raised by the build system and its orchestrators
#[derive(Debug, Error)]
pub enum BuildSystemError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Toolchain error: {0}")]
    Toolchain(#[from] ToolchainError),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Output directory is not a directory: {}", .0.display())]
    OutputNotDirectory(PathBuf),

    #[error("Unable to find a compile source root for '{}' (roots: {roots})", .source_file.display())]
    SourceOutsideRoots { source_file: PathBuf, roots: String },

    #[error("Failed to launch process for '{}': {source}", .candidate.display())]
    Launch {
        candidate: PathBuf,
        /// Outcomes of the candidates that ran before the launch failure
        completed: Vec<RunOutcome>,
        #[source]
        source: LaunchError,
    },

    #[error("{tool} returned error code {exit_code}")]
    ProcessFailed { tool: String, exit_code: i32 },

    #[error("Error scanning source root '{}': {message}", .root.display())]
    Scan { root: PathBuf, message: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file error: {0}")]
    ConfigFile(String),

    #[error("Build failed: {0}")]
    BatchFailed(String),
}

impl BuildSystemError {
    /// Wrap an I/O error with a description of what was being attempted
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BuildSystemError::Io {
            context: context.into(),
            source,
        }
    }

    /// Fatal misconfiguration that must never be retried
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            BuildSystemError::Configuration(_)
                | BuildSystemError::Toolchain(_)
                | BuildSystemError::InvalidPattern { .. }
                | BuildSystemError::OutputNotDirectory(_)
                | BuildSystemError::SourceOutsideRoots { .. }
                | BuildSystemError::ConfigFile(_)
        )
    }

    /// The external process could not be started at all
    pub fn is_launch_error(&self) -> bool {
        matches!(self, BuildSystemError::Launch { .. })
    }

    /// Outcomes collected before a batch was aborted, empty for any other error
    pub fn completed_outcomes(&self) -> &[RunOutcome] {
        match self {
            BuildSystemError::Launch { completed, .. } => completed,
            _ => &[],
        }
    }

    /// Attach the outcomes gathered so far to a launch error
    pub(crate) fn with_completed(self, outcomes: Vec<RunOutcome>) -> Self {
        match self {
            BuildSystemError::Launch {
                candidate, source, ..
            } => BuildSystemError::Launch {
                candidate,
                completed: outcomes,
                source,
            },
            other => other,
        }
    }
}

pub type BuildResult<T> = Result<T, BuildSystemError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let config = BuildSystemError::OutputNotDirectory(PathBuf::from("out"));
        assert!(config.is_configuration_error());
        assert!(!config.is_launch_error());

        let launch = BuildSystemError::Launch {
            candidate: PathBuf::from("web/main.dart"),
            completed: Vec::new(),
            source: LaunchError::new(
                PathBuf::from("dart2js"),
                std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            ),
        };
        assert!(launch.is_launch_error());
        assert!(!launch.is_configuration_error());
        assert!(launch.to_string().contains("web/main.dart"));
        assert!(launch.completed_outcomes().is_empty());
        assert!(config.completed_outcomes().is_empty());
    }

    #[test]
    fn test_process_failed_message() {
        let err = BuildSystemError::ProcessFailed {
            tool: "Pub".to_string(),
            exit_code: 65,
        };
        assert_eq!(err.to_string(), "Pub returned error code 65");
    }
}
