// Build configuration management for dartbuild
// Plain values consumed by the orchestrators, loaded from TOML and overridden by the CLI

use std::ffi::OsString;
use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::build_system::error::{BuildResult, BuildSystemError};

/// Default configuration file looked up by the CLI
pub const DEFAULT_CONFIG_FILE: &str = "dartbuild.toml";

/// Complete build configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub project: ProjectConfig,
    pub toolchain: ToolchainConfig,
    pub compile: CompileConfig,
    pub test: TestConfig,
    pub script: ScriptConfig,
    #[serde(rename = "pub")]
    pub package_manager: PackageManagerConfig,
}

/// Project layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Directory every relative path is resolved against
    pub base_directory: PathBuf,
    pub source_directory: PathBuf,
    /// Where `package:` imports are found, relative to the source directory
    pub package_path: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            base_directory: PathBuf::from("."),
            source_directory: PathBuf::from("src/main/dart"),
            package_path: Some("packages".to_string()),
        }
    }
}

/// SDK location. `None` falls back to `DART_SDK`, then to `dart` on `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub sdk: Option<PathBuf>,
}

/// dart2js compilation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Root scanned for sources, defaults to the project source directory
    pub source_directory: Option<PathBuf>,
    /// Roots tried in order when deriving output paths, defaults to the scanned root.
    /// Staleness is checked against outputs relative to the scanned root, so the
    /// first entry should be that root or outputs never count as up to date.
    pub compile_roots: Vec<PathBuf>,
    pub output_directory: PathBuf,
    /// Unset uses `**/*.dart`; an explicit empty list selects nothing
    pub includes: Option<Vec<String>>,
    /// Unset uses `**/packages/**`; version-control directories are always excluded
    pub excludes: Option<Vec<String>>,
    /// Modification-time granularity tolerated before a source counts as stale
    pub stale_millis: u64,
    /// Empty the output directory first, which makes every source stale
    pub force: bool,
    pub skip: bool,
    /// Report per-file failures without failing the build
    pub ignore_failures: bool,
    /// Compile only this entry file, always, ignoring timestamps
    pub bundle_entry: Option<PathBuf>,
    pub source_suffix: String,
    pub target_suffix: String,
    /// Appended to the source file name to form the output file name
    pub output_suffix: String,
    /// Prefix joined to the output path argument
    pub output_flag: String,
    pub checked_mode: bool,
    pub verbose: bool,
    pub analyze_all: bool,
    pub minify: bool,
    pub suppress_warnings: bool,
    pub diagnostic_colors: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            source_directory: None,
            compile_roots: Vec::new(),
            output_directory: PathBuf::from("target/generated-sources/dart/dart2js"),
            includes: None,
            excludes: None,
            stale_millis: 0,
            force: false,
            skip: false,
            ignore_failures: false,
            bundle_entry: None,
            source_suffix: "dart".to_string(),
            target_suffix: "dart.js".to_string(),
            output_suffix: ".js".to_string(),
            output_flag: "-o".to_string(),
            checked_mode: false,
            verbose: false,
            analyze_all: false,
            minify: false,
            suppress_warnings: false,
            diagnostic_colors: false,
        }
    }
}

/// Test discovery and verdict policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Defaults to `<source directory>/test`
    pub test_directory: Option<PathBuf>,
    pub includes: Option<Vec<String>>,
    pub excludes: Option<Vec<String>>,
    pub skip_tests: bool,
    /// An empty test set fails the pass unless this is switched off
    pub fail_if_no_tests: bool,
    pub ignore_failures: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            test_directory: None,
            includes: None,
            excludes: None,
            skip_tests: false,
            fail_if_no_tests: true,
            ignore_failures: false,
        }
    }
}

/// Dart VM settings, shared by the script runner and the test runner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Script to run, relative to the source directory
    pub script: Option<PathBuf>,
    pub checked_mode: bool,
    pub debug: bool,
    pub debug_port: Option<u16>,
    pub break_at: Option<String>,
    pub use_script_snapshot: Option<PathBuf>,
}

/// Package manager step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageManagerConfig {
    /// Run `update` instead of `install`
    pub update: bool,
    pub skip: bool,
}

impl BuildConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> BuildResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BuildSystemError::io(format!("Failed to read {}", path.display()), e))?;
        toml::from_str(&content)
            .map_err(|e| BuildSystemError::ConfigFile(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> BuildResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| BuildSystemError::ConfigFile(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| BuildSystemError::io(format!("Failed to write {}", path.display()), e))
    }

    /// Validate the configuration
    pub fn validate(&self) -> BuildResult<()> {
        let base = self.base_directory();
        if !base.is_dir() {
            return Err(BuildSystemError::Configuration(format!(
                "Base directory does not exist: {}",
                base.display()
            )));
        }

        if self.compile.source_suffix.is_empty() {
            return Err(BuildSystemError::Configuration(
                "compile.source_suffix must not be empty".to_string(),
            ));
        }

        if self.compile.output_suffix.is_empty() {
            return Err(BuildSystemError::Configuration(
                "compile.output_suffix must not be empty".to_string(),
            ));
        }

        if let Some(root) = self.misaligned_compile_root() {
            log::warn!(
                "compile root '{}' differs from the scanned source directory '{}'; outputs will always look stale",
                root.display(),
                self.compile_source_directory().display()
            );
        }

        if self.script.debug_port.is_some() && !self.script.debug {
            log::warn!("script.debug_port is set but script.debug is false, ignoring the port");
        }

        Ok(())
    }

    /// Absolute base directory
    pub fn base_directory(&self) -> PathBuf {
        absolutize(&self.project.base_directory)
    }

    /// Resolve a configured path against the base directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_directory().join(path)
        }
    }

    pub fn source_directory(&self) -> PathBuf {
        self.resolve(&self.project.source_directory)
    }

    pub fn compile_source_directory(&self) -> PathBuf {
        match &self.compile.source_directory {
            Some(dir) => self.resolve(dir),
            None => self.source_directory(),
        }
    }

    pub fn compile_roots(&self) -> Vec<PathBuf> {
        if self.compile.compile_roots.is_empty() {
            vec![self.compile_source_directory()]
        } else {
            self.compile
                .compile_roots
                .iter()
                .map(|root| self.resolve(root))
                .collect()
        }
    }

    /// First compile root, when it is not the directory scanned for stale sources
    pub fn misaligned_compile_root(&self) -> Option<PathBuf> {
        let first = self.compile_roots().into_iter().next()?;
        (first != self.compile_source_directory()).then_some(first)
    }

    pub fn output_directory(&self) -> PathBuf {
        self.resolve(&self.compile.output_directory)
    }

    pub fn test_directory(&self) -> PathBuf {
        match &self.test.test_directory {
            Some(dir) => self.resolve(dir),
            None => self.source_directory().join("test"),
        }
    }

    pub fn stale_tolerance(&self) -> Duration {
        Duration::from_millis(self.compile.stale_millis)
    }

    /// Bundle entry resolved against the compile source directory
    pub fn bundle_entry(&self) -> Option<PathBuf> {
        self.compile
            .bundle_entry
            .as_ref()
            .map(|entry| self.compile_source_directory().join(entry))
    }

    /// Absolute package root with a trailing separator, if a package path is configured
    pub fn package_root(&self) -> Option<OsString> {
        self.project.package_path.as_ref().map(|package_path| {
            let mut root = self.source_directory().join(package_path).into_os_string();
            root.push(MAIN_SEPARATOR_STR);
            root
        })
    }

    pub fn sdk_directory(&self) -> Option<PathBuf> {
        self.toolchain.sdk.as_ref().map(|sdk| self.resolve(sdk))
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
