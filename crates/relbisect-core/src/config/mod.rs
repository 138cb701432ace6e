//! Configuration parsing and management.
//!
//! Configuration is optional: every field has a default that targets the
//! `pulumi/pulumi` releases and the `get.pulumi.com` installer. A TOML file
//! may override any of them, and the CLI may override a few again.
//!
//! ```toml
//! [release]
//! owner = "pulumi"
//! repo = "pulumi"
//! per_page = 25
//! rate_limit_backoff = "1s"
//!
//! [provision]
//! tool = "pulumi"
//! installer_url = "https://get.pulumi.com"
//! installer_file = "install-pulumi.sh"
//! bin_subdir = ".pulumi/bin"
//!
//! [check]
//! verify_monotonic = false
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::release::DEFAULT_API_BASE_URL;

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "RELBISECT_CACHE_DIR";

/// Directory under the user cache dir used when nothing else is configured.
pub const DEFAULT_CACHE_SUBDIR: &str = ".pulumi-bisect";

/// Credential variables consulted, in order, for the release listing token.
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// GitHub's maximum page size for release listings.
const MAX_PER_PAGE: u32 = 100;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BisectConfig {
    /// Release listing configuration.
    #[serde(default)]
    pub release: ReleaseConfig,

    /// Artifact provisioning configuration.
    #[serde(default)]
    pub provision: ProvisionConfig,

    /// Check/oracle configuration.
    #[serde(default)]
    pub check: CheckConfig,
}

impl BisectConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails [`Self::validate`].
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Checks cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let release = &self.release;
        if release.owner.trim().is_empty() || release.repo.trim().is_empty() {
            return Err(ConfigError::Validation(
                "release.owner and release.repo must not be empty".to_string(),
            ));
        }
        if release.per_page == 0 || release.per_page > MAX_PER_PAGE {
            return Err(ConfigError::Validation(format!(
                "release.per_page must be between 1 and {MAX_PER_PAGE}, got {}",
                release.per_page
            )));
        }

        let provision = &self.provision;
        if provision.tool.trim().is_empty() || provision.tool.contains(['/', '\\']) {
            return Err(ConfigError::Validation(format!(
                "provision.tool must be a plain directory name, got {:?}",
                provision.tool
            )));
        }
        if provision.installer_file.trim().is_empty()
            || provision.installer_file.contains(['/', '\\'])
        {
            return Err(ConfigError::Validation(format!(
                "provision.installer_file must be a plain file name, got {:?}",
                provision.installer_file
            )));
        }
        if provision.bin_subdir.is_absolute() {
            return Err(ConfigError::Validation(format!(
                "provision.bin_subdir must be relative to the version home, got {}",
                provision.bin_subdir.display()
            )));
        }
        Ok(())
    }

    /// Replaces the release repository with an `owner/name` slug.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for a malformed slug.
    pub fn set_repository(&mut self, slug: &str) -> Result<(), ConfigError> {
        let (owner, repo) = parse_repo_slug(slug)?;
        self.release.owner = owner;
        self.release.repo = repo;
        Ok(())
    }

    /// Resolves the artifact cache root.
    ///
    /// Order: `provision.cache_dir`, then `$RELBISECT_CACHE_DIR`, then the
    /// user cache directory joined with [`DEFAULT_CACHE_SUBDIR`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when no home directory can be
    /// determined for the fallback.
    pub fn resolve_cache_dir(&self) -> Result<PathBuf, ConfigError> {
        self.resolve_cache_dir_with(std::env::var_os(CACHE_DIR_ENV))
    }

    fn resolve_cache_dir_with(
        &self,
        env_override: Option<OsString>,
    ) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.provision.cache_dir {
            return Ok(dir.clone());
        }
        if let Some(dir) = env_override.filter(|dir| !dir.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        let base_dirs = directories::BaseDirs::new().ok_or_else(|| {
            ConfigError::Validation(format!(
                "could not resolve a user cache directory; set {CACHE_DIR_ENV} or provision.cache_dir"
            ))
        })?;
        Ok(base_dirs.cache_dir().join(DEFAULT_CACHE_SUBDIR))
    }
}

/// Release listing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// Repository owner.
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Repository name.
    #[serde(default = "default_repo")]
    pub repo: String,

    /// Releases requested per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// API endpoint.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Fixed wait before retrying a rate-limited page.
    #[serde(default = "default_rate_limit_backoff")]
    #[serde(with = "humantime_serde")]
    pub rate_limit_backoff: Duration,
}

fn default_owner() -> String {
    "pulumi".to_string()
}

fn default_repo() -> String {
    "pulumi".to_string()
}

const fn default_per_page() -> u32 {
    25
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

const fn default_rate_limit_backoff() -> Duration {
    Duration::from_secs(1)
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            repo: default_repo(),
            per_page: default_per_page(),
            api_base_url: default_api_base_url(),
            rate_limit_backoff: default_rate_limit_backoff(),
        }
    }
}

/// Artifact provisioning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Tool name; groups per-version installs in the cache.
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Cache root override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Where the installer script is downloaded from.
    #[serde(default = "default_installer_url")]
    pub installer_url: String,

    /// File name of the cached installer script.
    #[serde(default = "default_installer_file")]
    pub installer_file: String,

    /// Executable directory relative to the version home.
    #[serde(default = "default_bin_subdir")]
    pub bin_subdir: PathBuf,
}

fn default_tool() -> String {
    "pulumi".to_string()
}

fn default_installer_url() -> String {
    "https://get.pulumi.com".to_string()
}

fn default_installer_file() -> String {
    "install-pulumi.sh".to_string()
}

fn default_bin_subdir() -> PathBuf {
    PathBuf::from(".pulumi/bin")
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            cache_dir: None,
            installer_url: default_installer_url(),
            installer_file: default_installer_file(),
            bin_subdir: default_bin_subdir(),
        }
    }
}

/// Check/oracle configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CheckConfig {
    /// Re-run the oracle on every candidate after bisecting and warn if the
    /// failures are not a contiguous suffix.
    #[serde(default)]
    pub verify_monotonic: bool,
}

/// Splits an `owner/name` repository slug.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] unless the slug has exactly two
/// non-empty parts.
pub fn parse_repo_slug(slug: &str) -> Result<(String, String), ConfigError> {
    match slug.trim().split('/').collect::<Vec<_>>().as_slice() {
        [owner, repo] if !owner.is_empty() && !repo.is_empty() => {
            Ok(((*owner).to_string(), (*repo).to_string()))
        },
        _ => Err(ConfigError::Validation(format!(
            "repository must be `owner/name`, got {slug:?}"
        ))),
    }
}

/// Reads the release listing token from the process environment.
///
/// `GITHUB_TOKEN` is preferred over `GH_TOKEN`; empty values are ignored.
#[must_use]
pub fn resolve_github_token() -> Option<SecretString> {
    resolve_github_token_with(|name| std::env::var(name).ok())
}

fn resolve_github_token_with(lookup: impl Fn(&str) -> Option<String>) -> Option<SecretString> {
    TOKEN_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.trim().is_empty())
        .map(SecretString::from)
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = BisectConfig::from_toml("").unwrap();
        assert_eq!(config.release.owner, "pulumi");
        assert_eq!(config.release.repo, "pulumi");
        assert_eq!(config.release.per_page, 25);
        assert_eq!(config.release.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.release.rate_limit_backoff, Duration::from_secs(1));
        assert_eq!(config.provision.installer_url, "https://get.pulumi.com");
        assert_eq!(config.provision.bin_subdir, PathBuf::from(".pulumi/bin"));
        assert!(config.provision.cache_dir.is_none());
        assert!(!config.check.verify_monotonic);
    }

    #[test]
    fn parses_full_config() {
        let toml = r#"
            [release]
            owner = "hashicorp"
            repo = "terraform"
            per_page = 100
            rate_limit_backoff = "2s 500ms"

            [provision]
            tool = "terraform"
            cache_dir = "/tmp/relbisect"
            installer_url = "https://example.com/install.sh"
            installer_file = "install-terraform.sh"
            bin_subdir = "bin"

            [check]
            verify_monotonic = true
        "#;

        let config = BisectConfig::from_toml(toml).unwrap();
        assert_eq!(config.release.owner, "hashicorp");
        assert_eq!(config.release.per_page, 100);
        assert_eq!(
            config.release.rate_limit_backoff,
            Duration::from_millis(2500)
        );
        assert_eq!(config.provision.tool, "terraform");
        assert_eq!(
            config.provision.cache_dir,
            Some(PathBuf::from("/tmp/relbisect"))
        );
        assert!(config.check.verify_monotonic);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = BisectConfig::default();
        let rendered = config.to_toml().unwrap();
        let parsed = BisectConfig::from_toml(&rendered).unwrap();
        assert_eq!(parsed.release.rate_limit_backoff, config.release.rate_limit_backoff);
        assert_eq!(parsed.provision.installer_file, config.provision.installer_file);
    }

    #[test]
    fn rejects_out_of_range_page_size() {
        for per_page in [0, 101] {
            let toml = format!("[release]\nper_page = {per_page}\n");
            match BisectConfig::from_toml(&toml) {
                Err(ConfigError::Validation(msg)) => assert!(msg.contains("per_page"), "{msg}"),
                other => panic!("expected Validation, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_absolute_bin_subdir() {
        let toml = "[provision]\nbin_subdir = \"/usr/bin\"\n";
        assert!(matches!(
            BisectConfig::from_toml(toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_path_like_installer_file() {
        let toml = "[provision]\ninstaller_file = \"../evil.sh\"\n";
        assert!(matches!(
            BisectConfig::from_toml(toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            BisectConfig::from_toml("[release\nowner = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relbisect.toml");
        std::fs::write(&path, "[release]\nrepo = \"pulumi-aws\"\n").unwrap();
        let config = BisectConfig::from_file(&path).unwrap();
        assert_eq!(config.release.repo, "pulumi-aws");

        assert!(matches!(
            BisectConfig::from_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn parses_repository_slug() {
        assert_eq!(
            parse_repo_slug("pulumi/pulumi-aws").unwrap(),
            ("pulumi".to_string(), "pulumi-aws".to_string())
        );
        for bad in ["pulumi", "/pulumi", "pulumi/", "a/b/c", ""] {
            assert!(parse_repo_slug(bad).is_err(), "{bad} should be rejected");
        }

        let mut config = BisectConfig::default();
        config.set_repository("hashicorp/terraform").unwrap();
        assert_eq!(config.release.owner, "hashicorp");
        assert_eq!(config.release.repo, "terraform");
    }

    #[test]
    fn cache_dir_resolution_order() {
        let mut config = BisectConfig::default();
        let from_env = config
            .resolve_cache_dir_with(Some(OsString::from("/env/cache")))
            .unwrap();
        assert_eq!(from_env, PathBuf::from("/env/cache"));

        config.provision.cache_dir = Some(PathBuf::from("/explicit"));
        let explicit = config
            .resolve_cache_dir_with(Some(OsString::from("/env/cache")))
            .unwrap();
        assert_eq!(explicit, PathBuf::from("/explicit"));
    }

    #[test]
    fn cache_dir_falls_back_to_user_cache() {
        let config = BisectConfig::default();
        if let Ok(dir) = config.resolve_cache_dir_with(Some(OsString::new())) {
            assert!(dir.ends_with(DEFAULT_CACHE_SUBDIR));
        }
    }

    #[test]
    fn token_prefers_github_token() {
        let env: HashMap<&str, &str> = [("GITHUB_TOKEN", "primary"), ("GH_TOKEN", "secondary")]
            .into_iter()
            .collect();
        let token = resolve_github_token_with(|name| env.get(name).map(|v| (*v).to_string()));
        assert_eq!(token.unwrap().expose_secret(), "primary");
    }

    #[test]
    fn token_skips_empty_values() {
        let env: HashMap<&str, &str> = [("GITHUB_TOKEN", "  "), ("GH_TOKEN", "secondary")]
            .into_iter()
            .collect();
        let token = resolve_github_token_with(|name| env.get(name).map(|v| (*v).to_string()));
        assert_eq!(token.unwrap().expose_secret(), "secondary");

        assert!(resolve_github_token_with(|_| None).is_none());
    }
}
