// Source discovery and staleness detection
// Walks a source root under include/exclude globs and finds sources whose output is out of date

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::build_system::error::{BuildResult, BuildSystemError};

/// Version-control, editor and package-manager artifacts that are never sources
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/*~",
    "**/#*#",
    "**/.#*",
    "**/%*%",
    "**/._*",
    "**/CVS",
    "**/CVS/**",
    "**/.cvsignore",
    "**/RCS",
    "**/RCS/**",
    "**/SCCS",
    "**/SCCS/**",
    "**/vssver.scc",
    "**/.svn",
    "**/.svn/**",
    "**/.arch-ids",
    "**/.arch-ids/**",
    "**/.bzr",
    "**/.bzr/**",
    "**/.hg",
    "**/.hg/**",
    "**/_darcs",
    "**/_darcs/**",
    "**/.git",
    "**/.git/**",
    "**/.gitignore",
    "**/.gitattributes",
    "**/.DS_Store",
    "**/.dart_tool",
    "**/.dart_tool/**",
    "**/.pub",
    "**/.pub/**",
];

// `*` stays within one path segment, `**` crosses segments, dotfiles are not special.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Pick the effective pattern list for a configured value.
///
/// `None` means the value was never set and the defaults apply. `Some(&[])`
/// was set explicitly to nothing and stays empty, so an include list built
/// from it matches no file at all.
pub fn resolve_patterns(configured: Option<&[String]>, defaults: &[&str]) -> Vec<String> {
    match configured {
        None => defaults.iter().map(|p| p.to_string()).collect(),
        Some(patterns) => patterns.to_vec(),
    }
}

/// A root directory plus the glob filters that select files beneath it
#[derive(Debug, Clone)]
pub struct SourceSet {
    root: PathBuf,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
    // Excludes of the form `<dir>/**` also exclude `<dir>` itself, so the walk
    // never descends into it.
    excluded_dirs: Vec<Pattern>,
}

impl SourceSet {
    /// Build a source set. `DEFAULT_EXCLUDES` are always added to `excludes`.
    ///
    /// The patterns are taken as given: an unset configuration value is
    /// replaced by its caller-supplied default earlier, in `resolve_patterns`.
    pub fn new(
        root: impl Into<PathBuf>,
        includes: Vec<String>,
        excludes: Vec<String>,
    ) -> BuildResult<Self> {
        let mut exclude_patterns = excludes;
        for default in DEFAULT_EXCLUDES {
            if !exclude_patterns.iter().any(|p| p == default) {
                exclude_patterns.push(default.to_string());
            }
        }

        let includes_compiled = includes
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<BuildResult<Vec<_>>>()?;
        let excludes_compiled = exclude_patterns
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<BuildResult<Vec<_>>>()?;
        let excluded_dirs = exclude_patterns
            .iter()
            .filter_map(|p| {
                let normalized = normalize_pattern(p);
                normalized
                    .strip_suffix("/**")
                    .filter(|prefix| !prefix.is_empty())
                    .map(|prefix| compile_pattern(prefix))
            })
            .collect::<BuildResult<Vec<_>>>()?;

        Ok(Self {
            root: root.into(),
            include_patterns: includes,
            exclude_patterns,
            includes: includes_compiled,
            excludes: excludes_compiled,
            excluded_dirs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    /// Whether a root-relative path (using `/` separators) is selected
    pub fn matches(&self, relative: &str) -> bool {
        self.includes
            .iter()
            .any(|p| p.matches_with(relative, MATCH_OPTIONS))
            && !self.is_excluded(relative)
    }

    fn is_excluded(&self, relative: &str) -> bool {
        self.excludes
            .iter()
            .any(|p| p.matches_with(relative, MATCH_OPTIONS))
    }

    fn is_excluded_dir(&self, relative: &str) -> bool {
        self.is_excluded(relative)
            || self
                .excluded_dirs
                .iter()
                .any(|p| p.matches_with(relative, MATCH_OPTIONS))
    }

    /// Every selected file under the root, sorted, as paths joined onto the root.
    /// A missing root yields an empty set.
    pub fn files(&self) -> BuildResult<BTreeSet<PathBuf>> {
        let mut files = BTreeSet::new();

        if !self.root.is_dir() {
            log::warn!(
                "source root '{}' does not exist, nothing to scan",
                self.root.display()
            );
            return Ok(files);
        }
        if self.includes.is_empty() {
            log::debug!("no include patterns for '{}'", self.root.display());
            return Ok(files);
        }

        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() {
                    return true;
                }
                match entry.path().strip_prefix(&self.root) {
                    Ok(relative) => !self.is_excluded_dir(&pattern_path(relative)),
                    Err(_) => true,
                }
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.loop_ancestor().is_some() => {
                    log::debug!("skipping symlink loop: {}", err);
                    continue;
                }
                Err(err) => {
                    return Err(BuildSystemError::Scan {
                        root: self.root.clone(),
                        message: err.to_string(),
                    })
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if self.matches(&pattern_path(relative)) {
                files.insert(entry.path().to_path_buf());
            }
        }

        Ok(files)
    }
}

/// Maps a source file name to the artifact name it is expected to produce.
/// Only used to test staleness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixMapping {
    source_suffix: String,
    target_suffix: String,
}

impl SuffixMapping {
    pub fn new(source_suffix: impl Into<String>, target_suffix: impl Into<String>) -> Self {
        Self {
            source_suffix: source_suffix.into(),
            target_suffix: target_suffix.into(),
        }
    }

    /// `a/b.dart` with `("dart", "dart.js")` maps to `a/b.dart.js`.
    /// Names without the source suffix have no target.
    pub fn target_for(&self, relative: &Path) -> Option<PathBuf> {
        let name = relative.file_name()?.to_str()?;
        let base = name.strip_suffix(self.source_suffix.as_str())?;
        Some(relative.with_file_name(format!("{}{}", base, self.target_suffix)))
    }
}

/// Staleness of one source relative to its expected output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessDecision {
    MissingOutput,
    OutOfDate,
    UpToDate,
}

impl StalenessDecision {
    pub fn is_stale(self) -> bool {
        !matches!(self, StalenessDecision::UpToDate)
    }
}

/// Compare modification times. The source is stale when the output is missing
/// or the source is newer than the output by more than `tolerance`.
pub fn staleness(source: &Path, output: &Path, tolerance: Duration) -> io::Result<StalenessDecision> {
    let output_modified = match std::fs::metadata(output) {
        Ok(metadata) => metadata.modified()?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(StalenessDecision::MissingOutput)
        }
        Err(err) => return Err(err),
    };
    let source_modified = std::fs::metadata(source)?.modified()?;

    let stale = match output_modified.checked_add(tolerance) {
        Some(threshold) => source_modified > threshold,
        None => false,
    };

    Ok(if stale {
        StalenessDecision::OutOfDate
    } else {
        StalenessDecision::UpToDate
    })
}

/// Selects the sources of a `SourceSet` that need recompiling
#[derive(Debug, Clone)]
pub struct StaleSourceScanner {
    tolerance: Duration,
    mapping: SuffixMapping,
}

impl StaleSourceScanner {
    pub fn new(tolerance: Duration, mapping: SuffixMapping) -> Self {
        Self { tolerance, mapping }
    }

    /// Stale sources, sorted by path. Computed fresh on every call.
    pub fn stale_sources(
        &self,
        sources: &SourceSet,
        output_root: &Path,
    ) -> BuildResult<BTreeSet<PathBuf>> {
        let mut stale = BTreeSet::new();

        for source in sources.files()? {
            let Ok(relative) = source.strip_prefix(sources.root()) else {
                continue;
            };
            let Some(target) = self.mapping.target_for(relative) else {
                log::debug!("no output mapping for '{}'", relative.display());
                continue;
            };

            let output = output_root.join(target);
            let decision =
                staleness(&source, &output, self.tolerance).map_err(|e| BuildSystemError::Scan {
                    root: sources.root().to_path_buf(),
                    message: format!("cannot stat '{}': {}", source.display(), e),
                })?;

            log::debug!("{}: {:?}", relative.display(), decision);
            if decision.is_stale() {
                stale.insert(source);
            }
        }

        Ok(stale)
    }
}

fn normalize_pattern(pattern: &str) -> String {
    let mut normalized = pattern.trim().replace('\\', "/");
    if normalized.ends_with('/') {
        normalized.push_str("**");
    }
    normalized
}

fn compile_pattern(pattern: &str) -> BuildResult<Pattern> {
    Pattern::new(&normalize_pattern(pattern)).map_err(|e| BuildSystemError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Root-relative path rendered with `/` separators for glob matching
fn pattern_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
