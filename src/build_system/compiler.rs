// Compilation orchestration for dartbuild
// Selects stale sources, maps each onto the output tree and runs the compiler once per file

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::build_system::config::BuildConfig;
use crate::build_system::error::{BuildResult, BuildSystemError};
use crate::build_system::outcome::{AggregateVerdict, RunOutcome};
use crate::build_system::path_mapper::PathMapper;
use crate::build_system::process::{CommandTemplate, ProcessRunner, SystemProcessRunner};
use crate::build_system::scanner::{resolve_patterns, SourceSet, StaleSourceScanner, SuffixMapping};

/// Include pattern used when none is configured
pub const DEFAULT_COMPILE_INCLUDES: &[&str] = &["**/*.dart"];

/// Exclude pattern used when none is configured, on top of the built-in excludes
pub const DEFAULT_COMPILE_EXCLUDES: &[&str] = &["**/packages/**"];

/// Plain values driving one compilation pass
#[derive(Debug, Clone)]
pub struct CompileSettings {
    pub source_root: PathBuf,
    pub compile_roots: Vec<PathBuf>,
    pub output_root: PathBuf,
    pub includes: Option<Vec<String>>,
    pub excludes: Option<Vec<String>>,
    pub stale_tolerance: Duration,
    pub force: bool,
    pub skip: bool,
    pub ignore_failures: bool,
    pub bundle_entry: Option<PathBuf>,
    pub mapping: SuffixMapping,
    pub output_suffix: String,
    pub output_flag: String,
}

impl CompileSettings {
    /// Settings with the default patterns, mapping and flags
    pub fn new(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        let source_root = source_root.into();
        Self {
            compile_roots: vec![source_root.clone()],
            source_root,
            output_root: output_root.into(),
            includes: None,
            excludes: None,
            stale_tolerance: Duration::ZERO,
            force: false,
            skip: false,
            ignore_failures: false,
            bundle_entry: None,
            mapping: SuffixMapping::new("dart", "dart.js"),
            output_suffix: ".js".to_string(),
            output_flag: "-o".to_string(),
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        let compile = &config.compile;
        Self {
            source_root: config.compile_source_directory(),
            compile_roots: config.compile_roots(),
            output_root: config.output_directory(),
            includes: compile.includes.clone(),
            excludes: compile.excludes.clone(),
            stale_tolerance: config.stale_tolerance(),
            force: compile.force,
            skip: compile.skip,
            ignore_failures: compile.ignore_failures,
            bundle_entry: config.bundle_entry(),
            mapping: SuffixMapping::new(&compile.source_suffix, &compile.target_suffix),
            output_suffix: compile.output_suffix.clone(),
            output_flag: compile.output_flag.clone(),
        }
    }

    pub fn source_set(&self) -> BuildResult<SourceSet> {
        SourceSet::new(
            &self.source_root,
            resolve_patterns(self.includes.as_deref(), DEFAULT_COMPILE_INCLUDES),
            resolve_patterns(self.excludes.as_deref(), DEFAULT_COMPILE_EXCLUDES),
        )
    }
}

/// Fixed dart2js argument prefix built from the compile flags
pub fn dart2js_template(dart2js: impl Into<PathBuf>, config: &BuildConfig) -> CommandTemplate {
    let compile = &config.compile;
    let mut template = CommandTemplate::new(dart2js);

    if compile.checked_mode {
        template.push_arg("-c");
    }
    if compile.verbose {
        template.push_arg("-v");
    }
    if compile.analyze_all {
        template.push_arg("--analyze-all");
    }
    if compile.minify {
        template.push_arg("--minify");
    }
    if compile.suppress_warnings {
        template.push_arg("--suppress-warnings");
    }
    if compile.diagnostic_colors {
        template.push_arg("--enable-diagnostic-colors");
    }
    if let Some(package_root) = config.package_root() {
        let mut arg = OsString::from("-p");
        arg.push(package_root);
        template.push_arg(arg);
    }

    template
}

/// One source file paired with the output it compiles to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationUnit {
    pub source: PathBuf,
    pub output: PathBuf,
}

/// Runs the compiler over every stale source of a `SourceSet`
pub struct CompilationOrchestrator<R: ProcessRunner = SystemProcessRunner> {
    settings: CompileSettings,
    runner: R,
}

impl CompilationOrchestrator<SystemProcessRunner> {
    pub fn new(settings: CompileSettings) -> Self {
        Self::with_runner(settings, SystemProcessRunner)
    }
}

impl<R: ProcessRunner> CompilationOrchestrator<R> {
    pub fn with_runner(settings: CompileSettings, runner: R) -> Self {
        Self { settings, runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Sources to compile on this pass: the bundle entry alone, or every stale source.
    pub fn candidates(&self) -> BuildResult<BTreeSet<PathBuf>> {
        if let Some(entry) = &self.settings.bundle_entry {
            if !entry.is_file() {
                return Err(BuildSystemError::Configuration(format!(
                    "Bundle entry is not a file: {}",
                    entry.display()
                )));
            }
            log::debug!("bundle mode, compiling '{}' only", entry.display());
            return Ok(BTreeSet::from([entry.clone()]));
        }

        let sources = self.settings.source_set()?;
        log::debug!("Source includes: {:?}", sources.include_patterns());
        log::debug!("Source excludes: {:?}", sources.exclude_patterns());

        let scanner = StaleSourceScanner::new(self.settings.stale_tolerance, self.settings.mapping.clone());
        scanner.stale_sources(&sources, &self.settings.output_root)
    }

    /// Map a candidate onto the output tree
    pub fn unit_for(&self, source: &Path) -> BuildResult<CompilationUnit> {
        let mapper = PathMapper::new(
            self.settings.compile_roots.clone(),
            &self.settings.output_root,
            &self.settings.output_suffix,
        );
        Ok(CompilationUnit {
            source: source.to_path_buf(),
            output: mapper.output_path(source)?,
        })
    }

    /// Compile every candidate in path order.
    ///
    /// A nonzero exit is recorded and the loop continues. A process that cannot
    /// be launched aborts the pass with `BuildSystemError::Launch`, which keeps
    /// the outcomes of the units compiled before it. The returned
    /// verdict carries every outcome; use `AggregateVerdict::into_result` to
    /// turn an abort verdict into an error after reporting it.
    pub fn run(&self, template: &CommandTemplate) -> BuildResult<AggregateVerdict> {
        if self.settings.skip {
            log::info!("Skipping dart2js");
            return Ok(AggregateVerdict::skipped());
        }

        prepare_output_root(&self.settings.output_root, self.settings.force)?;

        let candidates = self.candidates()?;
        if candidates.is_empty() {
            log::info!("Nothing to compile - all dart javascripts are up to date");
            return Ok(AggregateVerdict::fold(Vec::new(), self.settings.ignore_failures));
        }

        let units = candidates
            .iter()
            .map(|source| self.unit_for(source))
            .collect::<BuildResult<Vec<_>>>()?;

        let mut outcomes = Vec::with_capacity(units.len());
        for unit in &units {
            let outcome = match self.compile_unit(template, unit) {
                Ok(outcome) => outcome,
                Err(e) => return Err(e.with_completed(outcomes)),
            };
            log_outcome(&outcome);
            outcomes.push(outcome);
        }

        let verdict = AggregateVerdict::fold(outcomes, self.settings.ignore_failures);
        log::info!("dart2js: {}", verdict.summary());
        Ok(verdict)
    }

    fn compile_unit(&self, template: &CommandTemplate, unit: &CompilationUnit) -> BuildResult<RunOutcome> {
        if let Some(parent) = unit.output.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BuildSystemError::io(format!("Unable to create '{}'", parent.display()), e)
            })?;
        }

        let relative = unit
            .source
            .strip_prefix(&self.settings.source_root)
            .unwrap_or(&unit.source);
        log::info!("compiling {}", relative.display());

        let mut output_arg = OsString::from(&self.settings.output_flag);
        output_arg.push(unit.output.as_os_str());
        let invocation = template.invocation([unit.source.as_os_str(), output_arg.as_os_str()]);
        log::debug!("Execute dart2js: {}", invocation);

        let output = self
            .runner
            .run(&invocation)
            .map_err(|source| BuildSystemError::Launch {
                candidate: unit.source.clone(),
                completed: Vec::new(),
                source,
            })?;
        log::debug!("dart2js return code: {}", output.exit_code);

        Ok(RunOutcome::from_output(&unit.source, Some(unit.output.clone()), output))
    }
}

fn log_outcome(outcome: &RunOutcome) {
    if outcome.succeeded() {
        log::info!("compiled {}", outcome.candidate.display());
    } else {
        log::warn!(
            "dart2js exited with {} for {}",
            outcome.exit_code,
            outcome.candidate.display()
        );
    }
}

/// Create the output root if missing. With `force`, empty it first; the root itself is kept.
pub fn prepare_output_root(output_root: &Path, force: bool) -> BuildResult<()> {
    if output_root.exists() && !output_root.is_dir() {
        return Err(BuildSystemError::OutputNotDirectory(output_root.to_path_buf()));
    }

    if force && output_root.is_dir() {
        log::info!("Cleaning output directory '{}'", output_root.display());
        clear_directory(output_root)?;
    }

    fs::create_dir_all(output_root).map_err(|e| {
        BuildSystemError::io(format!("Unable to create '{}'", output_root.display()), e)
    })
}

fn clear_directory(dir: &Path) -> BuildResult<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| BuildSystemError::io(format!("Unable to read '{}'", dir.display()), e))?;

    for entry in entries {
        let entry =
            entry.map_err(|e| BuildSystemError::io(format!("Unable to read '{}'", dir.display()), e))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| BuildSystemError::io(format!("Unable to stat '{}'", path.display()), e))?;

        let removed = if file_type.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| BuildSystemError::io(format!("Unable to delete '{}'", path.display()), e))?;
    }

    Ok(())
}
