//! Check command execution.
//!
//! The operator's check command is the bisection oracle. It runs with the
//! candidate's executable directory prepended to `PATH`; a zero exit is good
//! and anything else is bad. Output is passed through untouched.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced while preparing a check invocation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    /// The artifact directory cannot be placed on `PATH`.
    #[error("cannot add {} to PATH: {source}", .dir.display())]
    InvalidPath {
        /// Offending directory.
        dir: PathBuf,
        /// Underlying error.
        #[source]
        source: std::env::JoinPathsError,
    },
}

/// The operator-supplied check: a program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl CheckCommand {
    /// Creates a check command with no arguments.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program name or path.
    #[must_use]
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

impl fmt::Display for CheckCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Environment context for check invocations.
///
/// The base `PATH` is captured once and passed explicitly rather than read
/// from the process environment at each call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckEnv {
    base_path: Option<OsString>,
}

impl CheckEnv {
    /// Uses `base_path` as the `PATH` the artifact directory is prepended to.
    #[must_use]
    pub const fn new(base_path: Option<OsString>) -> Self {
        Self { base_path }
    }

    /// Captures the current process `PATH`.
    #[must_use]
    pub fn from_process() -> Self {
        Self::new(std::env::var_os("PATH"))
    }

    /// `PATH` with `dir` first, followed by the base entries.
    ///
    /// An unset or empty base yields just `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidPath`] if `dir` contains the platform
    /// path separator.
    pub fn path_with(&self, dir: &Path) -> Result<OsString, RunnerError> {
        let mut entries = vec![dir.to_path_buf()];
        if let Some(base) = self.base_path.as_deref().filter(|base| !base.is_empty()) {
            entries.extend(std::env::split_paths(base));
        }
        std::env::join_paths(entries).map_err(|source| RunnerError::InvalidPath {
            dir: dir.to_path_buf(),
            source,
        })
    }
}

/// Result of one check invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Exited with status zero.
    Passed,
    /// Exited non-zero; `code` is `None` when killed by a signal.
    Failed {
        /// Exit code.
        code: Option<i32>,
    },
    /// The command could not be started at all.
    LaunchFailed {
        /// Spawn error.
        reason: String,
    },
}

impl CheckOutcome {
    /// Whether this outcome marks the candidate bad.
    ///
    /// A launch failure counts as bad, the same as a non-zero exit.
    #[must_use]
    pub const fn is_bad(&self) -> bool {
        !matches!(self, Self::Passed)
    }
}

/// Runs check commands against a provisioned artifact.
pub trait CommandRunner {
    /// Runs `check` to completion with `bin_dir` prepended to `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] only when the invocation cannot be prepared;
    /// failures of the command itself are reported through [`CheckOutcome`].
    fn run_check(
        &self,
        check: &CheckCommand,
        env: &CheckEnv,
        bin_dir: &Path,
    ) -> Result<CheckOutcome, RunnerError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run_check(
        &self,
        check: &CheckCommand,
        env: &CheckEnv,
        bin_dir: &Path,
    ) -> Result<CheckOutcome, RunnerError> {
        (**self).run_check(check, env, bin_dir)
    }
}

/// Runs checks as child processes, inheriting stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run_check(
        &self,
        check: &CheckCommand,
        env: &CheckEnv,
        bin_dir: &Path,
    ) -> Result<CheckOutcome, RunnerError> {
        let path = env.path_with(bin_dir)?;
        let status = Command::new(check.program())
            .args(check.args())
            .env("PATH", path)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status();

        let outcome = match status {
            Ok(status) if status.success() => CheckOutcome::Passed,
            Ok(status) => CheckOutcome::Failed {
                code: status.code(),
            },
            Err(err) => {
                warn!(
                    command = %check,
                    error = %err,
                    "check command failed to start; counting candidate as bad"
                );
                CheckOutcome::LaunchFailed {
                    reason: err.to_string(),
                }
            },
        };
        debug!(command = %check, ?outcome, "check finished");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_artifact_dir_to_path() {
        let env = CheckEnv::new(Some(OsString::from("/usr/local/bin:/usr/bin")));
        let path = env.path_with(Path::new("/cache/pulumi/3.0.0/.pulumi/bin")).unwrap();
        let entries: Vec<PathBuf> = std::env::split_paths(&path).collect();
        assert_eq!(
            entries,
            [
                PathBuf::from("/cache/pulumi/3.0.0/.pulumi/bin"),
                PathBuf::from("/usr/local/bin"),
                PathBuf::from("/usr/bin"),
            ]
        );
    }

    #[test]
    fn empty_or_missing_base_path_yields_only_artifact_dir() {
        for env in [CheckEnv::new(None), CheckEnv::new(Some(OsString::new()))] {
            let path = env.path_with(Path::new("/artifact/bin")).unwrap();
            assert_eq!(path, OsString::from("/artifact/bin"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn rejects_dir_containing_separator() {
        let env = CheckEnv::new(Some(OsString::from("/usr/bin")));
        assert!(matches!(
            env.path_with(Path::new("/odd:dir")),
            Err(RunnerError::InvalidPath { .. })
        ));
    }

    #[test]
    fn only_passed_is_good() {
        assert!(!CheckOutcome::Passed.is_bad());
        assert!(CheckOutcome::Failed { code: Some(1) }.is_bad());
        assert!(CheckOutcome::Failed { code: None }.is_bad());
        assert!(
            CheckOutcome::LaunchFailed {
                reason: "not found".to_string()
            }
            .is_bad()
        );
    }

    #[test]
    fn displays_command_line() {
        let check = CheckCommand::new("./repro.sh").with_args(["--stack", "dev"]);
        assert_eq!(check.to_string(), "./repro.sh --stack dev");
        assert_eq!(check.args().len(), 2);
    }

    #[cfg(unix)]
    mod process {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        use super::*;

        fn system_env() -> CheckEnv {
            CheckEnv::new(Some(OsString::from("/usr/bin:/bin")))
        }

        #[cfg_attr(miri, ignore)] // Miri can't spawn processes
        #[test]
        fn exit_codes_map_to_outcomes() {
            let dir = tempfile::tempdir().unwrap();
            let pass = CheckCommand::new("sh").with_args(["-c", "exit 0"]);
            let fail = CheckCommand::new("sh").with_args(["-c", "exit 7"]);

            let runner = ProcessRunner;
            assert_eq!(
                runner.run_check(&pass, &system_env(), dir.path()).unwrap(),
                CheckOutcome::Passed
            );
            assert_eq!(
                runner.run_check(&fail, &system_env(), dir.path()).unwrap(),
                CheckOutcome::Failed { code: Some(7) }
            );
        }

        #[cfg_attr(miri, ignore)] // Miri can't spawn processes
        #[test]
        fn missing_command_is_launch_failure() {
            let dir = tempfile::tempdir().unwrap();
            let check = CheckCommand::new("relbisect-no-such-command-12345");
            let outcome = ProcessRunner
                .run_check(&check, &system_env(), dir.path())
                .unwrap();
            assert!(matches!(outcome, CheckOutcome::LaunchFailed { .. }));
            assert!(outcome.is_bad());
        }

        #[cfg_attr(miri, ignore)] // Miri can't spawn processes
        #[test]
        fn artifact_dir_shadows_system_path() {
            let dir = tempfile::tempdir().unwrap();
            let tool = dir.path().join("tool");
            fs::write(&tool, "#!/bin/sh\nexit 5\n").unwrap();
            fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

            let check = CheckCommand::new("sh").with_args(["-c", "tool"]);
            let outcome = ProcessRunner
                .run_check(&check, &system_env(), dir.path())
                .unwrap();
            assert_eq!(outcome, CheckOutcome::Failed { code: Some(5) });
        }
    }
}
