//! # relbisect-core
//!
//! Finds the first release of a project for which a user-supplied check
//! fails, by binary search over the project's published releases.
//!
//! The pieces compose as follows:
//!
//! - [`version`]: lenient version parsing and [`version::build_range`], which
//!   turns raw release tags into a sorted, de-duplicated candidate sequence
//! - [`bisect`]: the generic first-bad search over any ordered slice
//! - [`release`]: paginated release listing with rate-limit retry
//! - [`provision`]: per-version installs in a local artifact cache
//! - [`runner`]: runs the check command with an artifact on `PATH`
//! - [`driver`]: wires the collaborators into a single run
//! - [`config`]: TOML configuration and environment resolution
//!
//! ## Example
//!
//! ```rust
//! use relbisect_core::bisect::find_first_bad;
//! use relbisect_core::version::{VersionRange, build_range};
//!
//! let range = VersionRange::parse("1.0.0", "1.3.0").unwrap();
//! let candidates = build_range(["v1.3.0", "v1.0.0", "1.2.0", "v1.1.0", "junk"], &range);
//!
//! let first_bad = find_first_bad(candidates.as_slice(), |v| {
//!     Ok::<_, std::convert::Infallible>(v.minor() >= 2)
//! })
//! .unwrap();
//! assert_eq!(first_bad.map(ToString::to_string).as_deref(), Some("1.2.0"));
//! ```
//!
//! ## Assumptions
//!
//! The search assumes the check is monotone over the candidates: once a
//! release fails, every later one fails too. [`bisect::verify_monotonic`]
//! can be used to detect violations at the cost of one check per candidate.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bisect;
pub mod config;
pub mod driver;
pub mod provision;
pub mod release;
pub mod runner;
pub mod version;

pub use bisect::{BisectionResult, MonotonicityReport, find_first_bad, verify_monotonic};
pub use config::{BisectConfig, ConfigError};
pub use driver::{Driver, DriverError, DriverSettings};
pub use provision::{ArtifactCache, InstallerProvisioner, ProvisionError, Provisioner};
pub use release::{GitHubReleaseLister, ReleaseError, ReleaseLister};
pub use runner::{CheckCommand, CheckEnv, CheckOutcome, CommandRunner, ProcessRunner, RunnerError};
pub use version::{CandidateSequence, Version, VersionError, VersionRange, build_range};
