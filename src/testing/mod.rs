// Test execution for dartbuild
// Discovers test scripts and runs each one as an independent process

pub mod test_runner;

pub use test_runner::{
    conclude, TestOrchestrator, TestSettings, TestingError, TestingResult, DEFAULT_TEST_EXCLUDES,
    DEFAULT_TEST_INCLUDES, TEST_FAILURES_MESSAGE,
};
