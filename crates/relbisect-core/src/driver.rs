//! End-to-end bisection run.
//!
//! [`Driver`] wires the release lister, provisioner and command runner into a
//! single run:
//!
//! 1. list every release tag (retrying rate-limited pages),
//! 2. build the candidate sequence for the requested range,
//! 3. bisect it with an oracle that provisions each probed release and runs
//!    the check command against it,
//! 4. report the verdict.
//!
//! Progress lines go to the caller-supplied writer; diagnostics go through
//! `tracing`. Everything runs sequentially on the calling thread.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bisect::{BisectionResult, find_first_bad, verify_monotonic};
use crate::provision::{ProvisionError, Provisioner};
use crate::release::{ReleaseError, ReleaseLister, collect_release_tags};
use crate::runner::{CheckCommand, CheckEnv, CommandRunner, RunnerError};
use crate::version::{Version, VersionRange, build_range};

/// Fatal errors that abort a run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DriverError {
    /// Listing releases failed with a non-retryable error.
    #[error(transparent)]
    Release(#[from] ReleaseError),

    /// Provisioning a candidate failed.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// The check invocation could not be prepared.
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// Writing progress output failed.
    #[error("failed to write progress output: {0}")]
    Output(#[from] io::Error),
}

/// Per-run settings for [`Driver`].
#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// The oracle command.
    pub check: CheckCommand,
    /// Environment the check runs under.
    pub env: CheckEnv,
    /// Fixed wait before retrying a rate-limited release page.
    pub rate_limit_backoff: Duration,
    /// Full-scan the candidates after bisecting and report non-monotonic
    /// oracle results.
    pub verify_monotonic: bool,
}

/// Composes the collaborators into one bisection run.
#[derive(Debug)]
pub struct Driver<L, P, R> {
    lister: L,
    provisioner: P,
    runner: R,
    settings: DriverSettings,
}

type Verdicts = BTreeMap<Version, bool>;

impl<L, P, R> Driver<L, P, R>
where
    L: ReleaseLister,
    P: Provisioner,
    R: CommandRunner,
{
    /// Creates a driver.
    pub const fn new(lister: L, provisioner: P, runner: R, settings: DriverSettings) -> Self {
        Self {
            lister,
            provisioner,
            runner,
            settings,
        }
    }

    /// Runs the bisection over `range`, writing progress to `out`.
    ///
    /// An empty range and "no bad release" are successful outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] for any fatal collaborator failure.
    pub fn run(
        &self,
        range: &VersionRange,
        out: &mut dyn Write,
    ) -> Result<BisectionResult<Version>, DriverError> {
        self.run_with_sleep(range, out, std::thread::sleep)
    }

    /// [`Self::run`] with an injectable rate-limit sleep.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] for any fatal collaborator failure.
    pub fn run_with_sleep<S>(
        &self,
        range: &VersionRange,
        out: &mut dyn Write,
        sleep: S,
    ) -> Result<BisectionResult<Version>, DriverError>
    where
        S: FnMut(Duration),
    {
        info!(
            source = %self.lister.source(),
            lower = %range.lower(),
            upper = %range.upper(),
            "listing releases"
        );
        let tags = collect_release_tags(&self.lister, self.settings.rate_limit_backoff, sleep)?;
        let candidates = build_range(&tags, range);
        info!(
            tags = tags.len(),
            candidates = candidates.len(),
            "resolved release range"
        );

        let (Some(first), Some(last)) = (candidates.first(), candidates.last()) else {
            return report(out, BisectionResult::EmptyRange);
        };
        writeln!(out, ">>> checking {first}..{last}")?;
        out.flush()?;

        let mut verdicts = Verdicts::new();
        let found = find_first_bad(candidates.as_slice(), |version| {
            self.evaluate(version, &mut verdicts, &mut *out)
        })?
        .cloned();

        if self.settings.verify_monotonic {
            let report = verify_monotonic(candidates.as_slice(), |version| {
                self.evaluate(version, &mut verdicts, &mut *out)
            })?;
            if !report.is_monotonic() {
                let passed_after: Vec<String> =
                    report.violations.iter().map(ToString::to_string).collect();
                warn!(
                    first_bad = ?report.first_bad.map(Version::canonical),
                    violations = passed_after.len(),
                    "check results are not monotonic"
                );
                writeln!(
                    out,
                    "!!! check results are not monotonic: releases passed after a failure: {}",
                    passed_after.join(", ")
                )?;
            }
            if report.first_bad != found.as_ref() {
                warn!(
                    bisected = ?found.as_ref().map(Version::canonical),
                    scanned = ?report.first_bad.map(Version::canonical),
                    "bisection and full scan disagree on the first bad release"
                );
                writeln!(
                    out,
                    "!!! full scan found first failure at {}; bisection reported {}",
                    display_or_none(report.first_bad),
                    display_or_none(found.as_ref())
                )?;
            }
        }

        let result = found.map_or(BisectionResult::NoBadFound, BisectionResult::FirstBad);
        report(out, result)
    }

    /// The oracle: provisions `version`, runs the check against it, and
    /// memoizes the verdict for the rest of the run.
    fn evaluate(
        &self,
        version: &Version,
        verdicts: &mut Verdicts,
        out: &mut dyn Write,
    ) -> Result<bool, DriverError> {
        if let Some(&bad) = verdicts.get(version) {
            debug!(%version, bad, "reusing verdict");
            return Ok(bad);
        }

        let bin_dir = if let Some(dir) = self.provisioner.cached(version) {
            dir
        } else {
            writeln!(out, "=== Installing {} {version}", self.provisioner.tool())?;
            out.flush()?;
            self.provisioner.provision(version)?
        };

        writeln!(
            out,
            "=== Running {} with {}",
            self.settings.check,
            bin_dir.display()
        )?;
        out.flush()?;
        let outcome = self
            .runner
            .run_check(&self.settings.check, &self.settings.env, &bin_dir)?;
        let bad = outcome.is_bad();
        info!(%version, bad, ?outcome, "candidate evaluated");

        verdicts.insert(version.clone(), bad);
        Ok(bad)
    }
}

fn display_or_none(version: Option<&Version>) -> String {
    version.map_or_else(|| "none".to_string(), Version::canonical)
}

fn report(
    out: &mut dyn Write,
    result: BisectionResult<Version>,
) -> Result<BisectionResult<Version>, DriverError> {
    writeln!(out, "{result}")?;
    out.flush()?;
    Ok(result)
}
