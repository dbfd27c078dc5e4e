// Test Runner
// Runs every discovered test file as its own VM process and folds the results into one verdict

use std::path::PathBuf;

use thiserror::Error;

use crate::build_system::config::BuildConfig;
use crate::build_system::error::BuildSystemError;
use crate::build_system::outcome::{AggregateVerdict, RunOutcome};
use crate::build_system::process::{CommandTemplate, ProcessRunner, SystemProcessRunner};
use crate::build_system::scanner::{resolve_patterns, SourceSet};

/// Include pattern used when none is configured
pub const DEFAULT_TEST_INCLUDES: &[&str] = &["**/*.dart"];

/// Exclude pattern used when none is configured
pub const DEFAULT_TEST_EXCLUDES: &[&str] = &["**/packages/**"];

/// Message logged, or returned, when tests fail
pub const TEST_FAILURES_MESSAGE: &str =
    "There are test failures.\n\nPlease refer to output for the individual test results.";

/// Errors raised by the test runner
#[derive(Debug, Error)]
pub enum TestingError {
    #[error("No tests were executed! (Set test.fail_if_no_tests = false or pass --allow-no-tests to ignore this error.)")]
    NoTestsExecuted,

    #[error("{message} ({summary})")]
    TestFailures { message: String, summary: String },

    #[error(transparent)]
    Build(#[from] BuildSystemError),
}

impl TestingError {
    /// Outcomes of the tests that ran before the pass was aborted
    pub fn completed_outcomes(&self) -> &[RunOutcome] {
        match self {
            TestingError::Build(e) => e.completed_outcomes(),
            _ => &[],
        }
    }
}

pub type TestingResult<T> = Result<T, TestingError>;

/// Discovery and verdict policy for one test pass
#[derive(Debug, Clone)]
pub struct TestSettings {
    pub test_root: PathBuf,
    pub includes: Option<Vec<String>>,
    pub excludes: Option<Vec<String>>,
    pub skip_tests: bool,
    pub fail_if_no_tests: bool,
    pub ignore_failures: bool,
}

impl TestSettings {
    pub fn new(test_root: impl Into<PathBuf>) -> Self {
        Self {
            test_root: test_root.into(),
            includes: None,
            excludes: None,
            skip_tests: false,
            fail_if_no_tests: true,
            ignore_failures: false,
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        let test = &config.test;
        Self {
            test_root: config.test_directory(),
            includes: test.includes.clone(),
            excludes: test.excludes.clone(),
            skip_tests: test.skip_tests,
            fail_if_no_tests: test.fail_if_no_tests,
            ignore_failures: test.ignore_failures,
        }
    }

    pub fn source_set(&self) -> Result<SourceSet, BuildSystemError> {
        SourceSet::new(
            &self.test_root,
            resolve_patterns(self.includes.as_deref(), DEFAULT_TEST_INCLUDES),
            resolve_patterns(self.excludes.as_deref(), DEFAULT_TEST_EXCLUDES),
        )
    }
}

/// Test orchestrator: no staleness filtering, every match runs on every pass
pub struct TestOrchestrator<R: ProcessRunner = SystemProcessRunner> {
    settings: TestSettings,
    runner: R,
}

impl TestOrchestrator<SystemProcessRunner> {
    pub fn new(settings: TestSettings) -> Self {
        Self::with_runner(settings, SystemProcessRunner)
    }
}

impl<R: ProcessRunner> TestOrchestrator<R> {
    pub fn with_runner(settings: TestSettings, runner: R) -> Self {
        Self { settings, runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn discover(&self) -> TestingResult<Vec<PathBuf>> {
        let sources = self.settings.source_set()?;
        Ok(sources.files()?.into_iter().collect())
    }

    /// Run every discovered test, appending each path to `template`.
    ///
    /// Returns `NoTestsExecuted` for an empty set when `fail_if_no_tests` is
    /// set, and a launch error carrying the outcomes so far as soon as one
    /// process cannot start. Failing
    /// tests never stop the pass; they show up in the verdict, which
    /// `conclude` turns into an error unless failures are ignored.
    pub fn run(&self, template: &CommandTemplate) -> TestingResult<AggregateVerdict> {
        if self.settings.skip_tests {
            log::info!("Tests are skipped.");
            return Ok(AggregateVerdict::skipped());
        }

        log::info!("running tests in {}", self.settings.test_root.display());
        let tests = self.discover()?;

        if tests.is_empty() {
            if self.settings.fail_if_no_tests {
                return Err(TestingError::NoTestsExecuted);
            }
            log::info!("No tests to run.");
            return Ok(AggregateVerdict::fold(Vec::new(), true));
        }

        let mut outcomes = Vec::with_capacity(tests.len());
        for test in &tests {
            log::info!("Execute test: {}", test.display());
            let invocation = template.invocation([test.as_os_str()]);
            log::debug!("Execute test command: {}", invocation);

            let output = match self.runner.run(&invocation) {
                Ok(output) => output,
                Err(source) => {
                    return Err(TestingError::Build(BuildSystemError::Launch {
                        candidate: test.clone(),
                        completed: outcomes,
                        source,
                    }))
                }
            };
            log::debug!("test return code: {}", output.exit_code);

            let outcome = RunOutcome::from_output(test, None, output);
            if !outcome.succeeded() {
                log::warn!("Test {} exited with {}", test.display(), outcome.exit_code);
            }
            outcomes.push(outcome);
        }

        let verdict = AggregateVerdict::fold(outcomes, self.settings.ignore_failures);
        log::info!("Tests: {}", verdict.summary());
        if verdict.failed > 0 && verdict.proceed {
            log::error!("{}", TEST_FAILURES_MESSAGE);
        }
        Ok(verdict)
    }
}

/// Turn an abort verdict into `TestFailures`
pub fn conclude(verdict: AggregateVerdict) -> TestingResult<AggregateVerdict> {
    if verdict.proceed {
        Ok(verdict)
    } else {
        Err(TestingError::TestFailures {
            message: TEST_FAILURES_MESSAGE.to_string(),
            summary: verdict.summary(),
        })
    }
}
