//! relbisect - release bisection
//!
//! Finds the first published release of a project for which a check command
//! fails, installing each probed release into a local cache.

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use relbisect_core::config::{BisectConfig, resolve_github_token};
use relbisect_core::{
    ArtifactCache, CheckCommand, CheckEnv, Driver, DriverSettings, GitHubReleaseLister,
    InstallerProvisioner, ProcessRunner, VersionRange,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// relbisect - find the first release that fails a check
#[derive(Parser, Debug)]
#[command(name = "relbisect")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Lower bound of the release range (inclusive)
    #[arg(long, value_name = "VERSION")]
    from: String,

    /// Upper bound of the release range (inclusive)
    #[arg(long, value_name = "VERSION")]
    to: String,

    /// Check command; exits 0 for a good release, non-zero for a bad one
    #[arg(long, value_name = "CMD")]
    cmd: OsString,

    /// Arguments passed to the check command (after `--`)
    #[arg(last = true, value_name = "ARGS")]
    args: Vec<OsString>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Repository to list releases from, as `owner/name`
    #[arg(long, value_name = "OWNER/NAME")]
    repo: Option<String>,

    /// Cache directory for installers and installed releases
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Check every release in the range afterwards and report
    /// non-monotonic results
    #[arg(long)]
    verify_monotonic: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    /// Loads the configuration file, if any, and applies flag overrides.
    fn load_config(&self) -> Result<BisectConfig> {
        let mut config = match &self.config {
            Some(path) => BisectConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => BisectConfig::default(),
        };
        if let Some(slug) = &self.repo {
            config
                .set_repository(slug)
                .context("invalid --repo value")?;
        }
        if let Some(dir) = &self.cache_dir {
            config.provision.cache_dir = Some(dir.clone());
        }
        if self.verify_monotonic {
            config.check.verify_monotonic = true;
        }
        Ok(config)
    }

    fn check_command(&self) -> CheckCommand {
        CheckCommand::new(self.cmd.clone()).with_args(self.args.iter().cloned())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let range = VersionRange::parse(&cli.from, &cli.to).context("invalid version bound")?;
    let config = cli.load_config()?;
    let cache_dir = config
        .resolve_cache_dir()
        .context("failed to resolve cache directory")?;

    let token = resolve_github_token();
    info!(
        repo = %format!("{}/{}", config.release.owner, config.release.repo),
        cache_dir = %cache_dir.display(),
        authenticated = token.is_some(),
        "starting bisection"
    );

    let lister = GitHubReleaseLister::new(
        config.release.owner.clone(),
        config.release.repo.clone(),
        config.release.per_page,
        token,
    )
    .context("failed to set up release listing")?
    .with_api_base_url(config.release.api_base_url.clone());

    let cache = ArtifactCache::new(
        cache_dir,
        config.provision.tool.clone(),
        config.provision.bin_subdir.clone(),
        config.provision.installer_file.clone(),
    );
    let provisioner = InstallerProvisioner::new(cache, config.provision.installer_url.clone())
        .context("failed to set up provisioning")?;

    let settings = DriverSettings {
        check: cli.check_command(),
        env: CheckEnv::from_process(),
        rate_limit_backoff: config.release.rate_limit_backoff,
        verify_monotonic: config.check.verify_monotonic,
    };
    let driver = Driver::new(lister, provisioner, ProcessRunner, settings);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    driver.run(&range, &mut out).context("bisection failed")?;
    Ok(())
}
