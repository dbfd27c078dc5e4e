// Output path derivation for compiled sources
// Maps a source file under one of the compile roots onto the output tree

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::build_system::error::{BuildResult, BuildSystemError};

/// Derives output paths by re-rooting a source path and appending a suffix.
///
/// The suffix is appended to the full file name, so `web/main.dart` with the
/// suffix `.js` becomes `<output>/web/main.dart.js`; the existing extension
/// is preserved, never replaced.
#[derive(Debug, Clone)]
pub struct PathMapper {
    compile_roots: Vec<PathBuf>,
    output_root: PathBuf,
    suffix: String,
}

impl PathMapper {
    pub fn new(
        compile_roots: Vec<PathBuf>,
        output_root: impl Into<PathBuf>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            compile_roots,
            output_root: output_root.into(),
            suffix: suffix.into(),
        }
    }

    /// Map `source` to its output file. The first compile root that contains
    /// the source wins; a source outside every root is a configuration error.
    pub fn output_path(&self, source: &Path) -> BuildResult<PathBuf> {
        for root in &self.compile_roots {
            if let Some(relative) = relative_to_root(source, root) {
                let output = self.output_root.join(append_suffix(&relative, &self.suffix));
                log::debug!(
                    "mapped '{}' to output '{}'",
                    source.display(),
                    output.display()
                );
                return Ok(output);
            }
        }

        log::error!(
            "Unable to find compile source root for '{}'",
            source.display()
        );
        for root in &self.compile_roots {
            log::error!("  compile source root: {}", root.display());
        }

        Err(BuildSystemError::SourceOutsideRoots {
            source_file: source.to_path_buf(),
            roots: self
                .compile_roots
                .iter()
                .map(|r| r.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

/// Path of `source` relative to `root`, compared component by component.
/// `None` when `source` is not strictly below `root`.
fn relative_to_root(source: &Path, root: &Path) -> Option<PathBuf> {
    let relative = source.strip_prefix(root).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(relative.to_path_buf())
}

fn append_suffix(relative: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = relative
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    relative.with_file_name(name)
}
