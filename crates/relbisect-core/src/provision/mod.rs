//! Per-version artifact provisioning.
//!
//! A [`Provisioner`] materializes a runnable release into a local directory
//! and returns the directory holding its executables. [`ArtifactCache`] fixes
//! the on-disk layout:
//!
//! ```text
//! <root>/installer/<installer file>      downloaded once, reused
//! <root>/<tool>/<canonical version>/     HOME for that version's install
//! <root>/<tool>/<canonical version>/<bin subdir>/
//! ```
//!
//! Presence of the executable directory is the cache hit test. Entries are
//! never evicted. There is no locking: concurrent runs sharing a cache root
//! are unsupported.

mod installer;

use std::io;
use std::path::{Path, PathBuf};

pub use installer::InstallerProvisioner;
use thiserror::Error;

use crate::version::Version;

/// Errors produced while provisioning an artifact.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProvisionError {
    /// Filesystem or process-spawn failure.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The installer script could not be downloaded.
    #[error("failed to download installer from {url}: {reason}")]
    Download {
        /// Installer URL.
        url: String,
        /// Failure description.
        reason: String,
    },

    /// The installer ran and reported failure.
    #[error("installer failed for version {version} (exit code: {})", exit_code_display(.code))]
    InstallerFailed {
        /// Canonical version being installed.
        version: String,
        /// Installer exit code, `None` if killed by a signal.
        code: Option<i32>,
    },

    /// The installer succeeded but the executable directory is missing.
    #[error("installer for version {version} did not produce {}", .path.display())]
    ArtifactMissing {
        /// Canonical version being installed.
        version: String,
        /// Expected executable directory.
        path: PathBuf,
    },
}

#[allow(clippy::ref_option)]
fn exit_code_display(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |code| code.to_string())
}

impl ProvisionError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Materializes runnable artifacts for versions.
pub trait Provisioner {
    /// Returns the executable directory if `version` is already provisioned.
    ///
    /// Has no side effects.
    fn cached(&self, version: &Version) -> Option<PathBuf>;

    /// Ensures `version` is provisioned and returns its executable directory.
    ///
    /// Idempotent: a cached version is returned without reinstalling.
    ///
    /// # Errors
    ///
    /// Returns a [`ProvisionError`] when installation fails; the run cannot
    /// continue.
    fn provision(&self, version: &Version) -> Result<PathBuf, ProvisionError>;

    /// Name of the provisioned tool, for progress output.
    fn tool(&self) -> &str;
}

impl<P: Provisioner + ?Sized> Provisioner for &P {
    fn cached(&self, version: &Version) -> Option<PathBuf> {
        (**self).cached(version)
    }

    fn provision(&self, version: &Version) -> Result<PathBuf, ProvisionError> {
        (**self).provision(version)
    }

    fn tool(&self) -> &str {
        (**self).tool()
    }
}

/// Filesystem layout of provisioned artifacts, keyed by canonical version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCache {
    root: PathBuf,
    tool: String,
    bin_subdir: PathBuf,
    installer_file: String,
}

impl ArtifactCache {
    /// Creates a cache layout rooted at `root`.
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        tool: impl Into<String>,
        bin_subdir: impl Into<PathBuf>,
        installer_file: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            tool: tool.into(),
            bin_subdir: bin_subdir.into(),
            installer_file: installer_file.into(),
        }
    }

    /// Cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Tool name; also the directory grouping per-version installs.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// HOME directory used while installing `version`.
    #[must_use]
    pub fn version_home(&self, version: &Version) -> PathBuf {
        self.root.join(&self.tool).join(version.canonical())
    }

    /// Executable directory of `version`.
    #[must_use]
    pub fn bin_dir(&self, version: &Version) -> PathBuf {
        self.version_home(version).join(&self.bin_subdir)
    }

    /// Location of the downloaded installer script.
    #[must_use]
    pub fn installer_path(&self) -> PathBuf {
        self.root.join("installer").join(&self.installer_file)
    }

    /// Returns the executable directory of `version` if it exists.
    #[must_use]
    pub fn lookup(&self, version: &Version) -> Option<PathBuf> {
        let bin = self.bin_dir(version);
        bin.is_dir().then_some(bin)
    }
}
