// SDK environment validation for the dartbuild build system
// Locates the Dart SDK, reads its version and resolves the tool executables

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable consulted when no SDK directory is configured
pub const SDK_ENV_VAR: &str = "DART_SDK";

/// Toolchain errors. All of them are configuration errors.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("Dart SDK required: set toolchain.sdk or DART_SDK, or put dart on PATH")]
    SdkNotConfigured,

    #[error("Dart SDK is not a directory: {}", .0.display())]
    SdkNotDirectory(PathBuf),

    #[error("Dart version file missing: {}", .0.display())]
    VersionFileMissing(PathBuf),

    #[error("Unable to read Dart version from {}: {reason}", .path.display())]
    VersionUnreadable { path: PathBuf, reason: String },

    #[error("{tool} not executable: {}", .path.display())]
    NotExecutable { tool: SdkTool, path: PathBuf },
}

/// Executables shipped in the SDK `bin` directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkTool {
    Dart,
    Dart2Js,
    Pub,
}

impl SdkTool {
    fn file_name(self) -> String {
        let (name, windows_ext) = match self {
            SdkTool::Dart => ("dart", ".exe"),
            SdkTool::Dart2Js => ("dart2js", ".bat"),
            SdkTool::Pub => ("pub", ".bat"),
        };
        if cfg!(windows) {
            format!("{}{}", name, windows_ext)
        } else {
            name.to_string()
        }
    }
}

impl fmt::Display for SdkTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdkTool::Dart => write!(f, "Dart"),
            SdkTool::Dart2Js => write!(f, "Dart2js"),
            SdkTool::Pub => write!(f, "Pub"),
        }
    }
}

/// A validated SDK installation
#[derive(Debug, Clone)]
pub struct DartSdk {
    root: PathBuf,
    version: String,
}

impl DartSdk {
    /// Find the SDK: configured directory, then `DART_SDK`, then `dart` on `PATH`.
    pub fn locate(configured: Option<&Path>) -> Result<Self, ToolchainError> {
        log::debug!("Check for DART_SDK.");

        let root = match configured {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(SDK_ENV_VAR) {
                Some(value) if !value.is_empty() => PathBuf::from(value),
                _ => Self::from_path_lookup().ok_or(ToolchainError::SdkNotConfigured)?,
            },
        };

        let sdk = Self::at(&root)?;
        log::info!("Dart-sdk configured to {}", sdk.root.display());
        log::info!("Version: {}", sdk.version);
        Ok(sdk)
    }

    /// Validate an SDK rooted at `root`
    pub fn at(root: &Path) -> Result<Self, ToolchainError> {
        if !root.is_dir() {
            return Err(ToolchainError::SdkNotDirectory(root.to_path_buf()));
        }
        let version = read_version(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            version,
        })
    }

    // `<sdk>/bin/dart` -> `<sdk>`
    fn from_path_lookup() -> Option<PathBuf> {
        let dart = which::which("dart").ok()?;
        let dart = dart.canonicalize().unwrap_or(dart);
        let sdk = dart.parent()?.parent()?.to_path_buf();
        log::debug!("derived Dart SDK from PATH: {}", sdk.display());
        Some(sdk)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Path of a tool inside the SDK, without checking it
    pub fn executable(&self, tool: SdkTool) -> PathBuf {
        self.root.join("bin").join(tool.file_name())
    }

    /// Path of a tool that must exist and be executable
    pub fn require(&self, tool: SdkTool) -> Result<PathBuf, ToolchainError> {
        let path = self.executable(tool);
        if !is_executable(&path) {
            return Err(ToolchainError::NotExecutable { tool, path });
        }
        log::debug!("Using {} '{}'.", tool, path.display());
        Ok(path)
    }
}

fn read_version(root: &Path) -> Result<String, ToolchainError> {
    let path = root.join("version");
    if !path.is_file() {
        return Err(ToolchainError::VersionFileMissing(path));
    }
    let content = fs::read_to_string(&path).map_err(|e| ToolchainError::VersionUnreadable {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    match content.lines().next().map(str::trim) {
        Some(line) if !line.is_empty() => Ok(line.to_string()),
        _ => Err(ToolchainError::VersionUnreadable {
            path,
            reason: "first line is empty".to_string(),
        }),
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
