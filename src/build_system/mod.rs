// Build system for dartbuild
// Source scanning, output mapping, process invocation and compilation orchestration

pub mod compiler;
pub mod config;
pub mod environment;
pub mod error;
pub mod outcome;
pub mod package_manager;
pub mod path_mapper;
pub mod process;
pub mod scanner;
pub mod script_runner;

pub use compiler::{
    dart2js_template, prepare_output_root, CompilationOrchestrator, CompilationUnit, CompileSettings,
    DEFAULT_COMPILE_EXCLUDES, DEFAULT_COMPILE_INCLUDES,
};
pub use config::{
    BuildConfig, CompileConfig, PackageManagerConfig, ProjectConfig, ScriptConfig, TestConfig,
    ToolchainConfig, DEFAULT_CONFIG_FILE,
};
pub use environment::{DartSdk, SdkTool, ToolchainError, SDK_ENV_VAR};
pub use error::{BuildResult, BuildSystemError};
pub use outcome::{AggregateVerdict, BatchReport, Classification, RunOutcome};
pub use package_manager::{PackageManager, PubCommand, PubSettings};
pub use path_mapper::PathMapper;
pub use process::{
    CommandTemplate, Invocation, LaunchError, ProcessOutput, ProcessRunner, SystemProcessRunner,
};
pub use scanner::{
    resolve_patterns, staleness, SourceSet, StaleSourceScanner, StalenessDecision, SuffixMapping,
    DEFAULT_EXCLUDES,
};
pub use script_runner::{resolve_script, vm_template, ScriptRunner};
