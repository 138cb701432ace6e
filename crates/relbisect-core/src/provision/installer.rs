//! Provisioning through a downloaded installer script.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use super::{ArtifactCache, ProvisionError, Provisioner};
use crate::version::Version;

/// Installs releases by running the project's installer script.
///
/// The script is fetched once into the cache and invoked as
/// `<installer> --version <canonical version>` with `HOME` pointed at the
/// version's cache directory. The installer's output is passed through.
#[derive(Debug)]
pub struct InstallerProvisioner {
    cache: ArtifactCache,
    installer_url: String,
    http: Client,
}

impl InstallerProvisioner {
    /// Creates a provisioner over `cache` that downloads from
    /// `installer_url` when the installer is not cached yet.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Download`] if the HTTP client cannot be
    /// built.
    pub fn new(
        cache: ArtifactCache,
        installer_url: impl Into<String>,
    ) -> Result<Self, ProvisionError> {
        let installer_url = installer_url.into();
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| ProvisionError::Download {
                url: installer_url.clone(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            cache,
            installer_url,
            http,
        })
    }

    /// The cache layout this provisioner installs into.
    #[must_use]
    pub const fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Returns the cached installer path, downloading it first if absent.
    fn ensure_installer(&self) -> Result<PathBuf, ProvisionError> {
        let path = self.cache.installer_path();
        if path.is_file() {
            return Ok(path);
        }

        info!(url = %self.installer_url, "downloading installer");
        let script = self.download_installer()?;
        write_executable(&path, &script)?;
        Ok(path)
    }

    fn download_installer(&self) -> Result<Vec<u8>, ProvisionError> {
        let download_err = |reason: String| ProvisionError::Download {
            url: self.installer_url.clone(),
            reason,
        };
        let response = self
            .http
            .get(&self.installer_url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|err| download_err(err.to_string()))?;
        let bytes = response
            .bytes()
            .map_err(|err| download_err(err.to_string()))?;
        if bytes.is_empty() {
            return Err(download_err("empty response body".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

impl Provisioner for InstallerProvisioner {
    fn cached(&self, version: &Version) -> Option<PathBuf> {
        self.cache.lookup(version)
    }

    fn provision(&self, version: &Version) -> Result<PathBuf, ProvisionError> {
        if let Some(bin) = self.cache.lookup(version) {
            debug!(%version, bin = %bin.display(), "artifact already cached");
            return Ok(bin);
        }

        let installer = self.ensure_installer()?;
        let home = self.cache.version_home(version);
        fs::create_dir_all(&home).map_err(|err| {
            ProvisionError::io(format!("failed to create {}", home.display()), err)
        })?;

        info!(%version, home = %home.display(), "running installer");
        let status = Command::new(&installer)
            .arg("--version")
            .arg(version.canonical())
            .env("HOME", &home)
            .status()
            .map_err(|err| {
                ProvisionError::io(format!("failed to run {}", installer.display()), err)
            });
        let status = match status {
            Ok(status) => status,
            Err(err) => {
                discard_partial_install(&home);
                return Err(err);
            },
        };
        if !status.success() {
            discard_partial_install(&home);
            return Err(ProvisionError::InstallerFailed {
                version: version.canonical(),
                code: status.code(),
            });
        }

        let bin = self.cache.bin_dir(version);
        if !bin.is_dir() {
            discard_partial_install(&home);
            return Err(ProvisionError::ArtifactMissing {
                version: version.canonical(),
                path: bin,
            });
        }
        Ok(bin)
    }

    fn tool(&self) -> &str {
        self.cache.tool()
    }
}

/// Removes a version home left behind by a failed install so the presence
/// check never reports it as cached.
fn discard_partial_install(home: &Path) {
    if let Err(err) = fs::remove_dir_all(home) {
        warn!(home = %home.display(), error = %err, "failed to remove partial install");
    }
}

/// Writes `contents` to `path` with mode 0755 via a sibling temp file.
fn write_executable(path: &Path, contents: &[u8]) -> Result<(), ProvisionError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            ProvisionError::io(format!("failed to create {}", parent.display()), err)
        })?;
    }
    let partial = path.with_extension("partial");
    fs::write(&partial, contents).map_err(|err| {
        ProvisionError::io(format!("failed to write {}", partial.display()), err)
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&partial, fs::Permissions::from_mode(0o755)).map_err(|err| {
            ProvisionError::io(format!("failed to chmod {}", partial.display()), err)
        })?;
    }

    fs::rename(&partial, path).map_err(|err| {
        ProvisionError::io(format!("failed to install {}", path.display()), err)
    })
}
