// dartbuild
// Incremental dart2js compilation and Dart test execution driven by external SDK tools

pub mod build_system;
pub mod cli;
pub mod testing;

// Re-export build system types
pub use build_system::{
    AggregateVerdict, BuildConfig, BuildResult, BuildSystemError, CommandTemplate,
    CompilationOrchestrator, CompileSettings, DartSdk, Invocation, LaunchError, PathMapper,
    ProcessOutput, ProcessRunner, RunOutcome, SourceSet, StaleSourceScanner, SuffixMapping,
    SystemProcessRunner,
};

// Re-export testing types
pub use testing::{TestOrchestrator, TestSettings, TestingError};

// Re-export CLI types
pub use cli::{run_build_cli, BuildCli, BuildCommand};
