//! Release version parsing and ordering.
//!
//! Release listings carry tags in loosely semantic shapes (`v1.2.3`, `1.2`,
//! `v3.0.0-beta.1`). [`Version`] accepts those shapes and normalizes them to a
//! canonical `MAJOR.MINOR.PATCH[-pre][+build]` string. The canonical string is
//! the deduplication key for release ranges, the artifact cache key, and the
//! value handed to installers.
//!
//! # Ordering
//!
//! Versions order by semantic-version precedence: release components compare
//! numerically (`1.2.10 > 1.2.9`) and a pre-release sorts below its release.
//! Build metadata is the final tiebreaker, so `Eq` and `Ord` agree with
//! canonical-string equality.

mod set;

use std::fmt;
use std::str::FromStr;

pub use set::{CandidateSequence, VersionRange, build_range};
use thiserror::Error;

/// Maximum number of dot-separated release components (`MAJOR.MINOR.PATCH`).
const MAX_RELEASE_COMPONENTS: usize = 3;

/// Errors produced while parsing a version string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum VersionError {
    /// The input was empty (or only a `v` prefix).
    #[error("version string is empty")]
    Empty,

    /// A release component is empty, non-numeric, or overflows.
    #[error("invalid version component {component:?} in {input:?}")]
    InvalidComponent {
        /// The raw input.
        input: String,
        /// The offending component.
        component: String,
    },

    /// More release components than `MAJOR.MINOR.PATCH`.
    #[error("version {input:?} has {count} release components (max: 3)")]
    TooManyComponents {
        /// The raw input.
        input: String,
        /// Number of components found.
        count: usize,
    },

    /// The pre-release or build suffix is malformed.
    #[error("invalid version {input:?}: {reason}")]
    Semver {
        /// The raw input.
        input: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// A parsed, totally ordered release version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    inner: semver::Version,
}

impl Version {
    /// Parses a version tag leniently.
    ///
    /// Surrounding whitespace and a single leading `v`/`V` are ignored.
    /// Missing minor/patch components default to zero and leading zeros in
    /// release components are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] when the input is empty, has more than three
    /// release components, has a non-numeric component, or carries a malformed
    /// pre-release/build suffix.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let body = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
        if body.is_empty() {
            return Err(VersionError::Empty);
        }

        let suffix_start = body.find(['-', '+']).unwrap_or(body.len());
        let (core, suffix) = body.split_at(suffix_start);

        let components: Vec<&str> = core.split('.').collect();
        if components.len() > MAX_RELEASE_COMPONENTS {
            return Err(VersionError::TooManyComponents {
                input: input.to_string(),
                count: components.len(),
            });
        }

        let mut release = [0u64; MAX_RELEASE_COMPONENTS];
        for (slot, component) in release.iter_mut().zip(&components) {
            *slot = parse_component(component).ok_or_else(|| VersionError::InvalidComponent {
                input: input.to_string(),
                component: (*component).to_string(),
            })?;
        }

        let normalized = format!("{}.{}.{}{suffix}", release[0], release[1], release[2]);
        let inner = semver::Version::parse(&normalized).map_err(|err| VersionError::Semver {
            input: input.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self { inner })
    }

    /// Major release component.
    #[must_use]
    pub const fn major(&self) -> u64 {
        self.inner.major
    }

    /// Minor release component.
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.inner.minor
    }

    /// Patch release component.
    #[must_use]
    pub const fn patch(&self) -> u64 {
        self.inner.patch
    }

    /// Returns `true` when the version carries a pre-release suffix.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        !self.inner.pre.is_empty()
    }

    /// Canonical string form, without a `v` prefix.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.inner.to_string()
    }
}

fn parse_component(component: &str) -> Option<u64> {
    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    component.parse().ok()
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(input: &str) -> Version {
        Version::parse(input).unwrap()
    }

    #[test]
    fn parses_prefixed_and_bare_tags() {
        assert_eq!(v("v1.2.3").canonical(), "1.2.3");
        assert_eq!(v("1.2.3").canonical(), "1.2.3");
        assert_eq!(v("V1.2.3").canonical(), "1.2.3");
        assert_eq!(v("  v1.2.3\n").canonical(), "1.2.3");
    }

    #[test]
    fn pads_missing_components() {
        assert_eq!(v("v3").canonical(), "3.0.0");
        assert_eq!(v("3.1").canonical(), "3.1.0");
        assert_eq!(v("3.1-rc.1").canonical(), "3.1.0-rc.1");
    }

    #[test]
    fn drops_leading_zeros_in_release_components() {
        assert_eq!(v("v01.002.0003").canonical(), "1.2.3");
        assert_eq!(v("1.02.3"), v("1.2.3"));
    }

    #[test]
    fn keeps_prerelease_and_build_suffixes() {
        let version = v("v3.0.0-beta.1+build.7");
        assert_eq!(version.canonical(), "3.0.0-beta.1+build.7");
        assert!(version.is_prerelease());
        assert_eq!(
            (version.major(), version.minor(), version.patch()),
            (3, 0, 0)
        );
    }

    #[test]
    fn orders_semantically_not_lexically() {
        assert!(v("1.2.10") > v("1.2.9"));
        assert!(v("1.10.0") > v("1.9.9"));
        assert!(v("2.0.0") > v("1.99.99"));
    }

    #[test]
    fn prerelease_sorts_below_release() {
        assert!(v("1.0.0-alpha") < v("1.0.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
        assert!(v("1.0.0-beta.2") < v("1.0.0-beta.11"));
    }

    #[test]
    fn identical_canonical_forms_compare_equal() {
        assert_eq!(v("v1.0.0"), v("1.0"));
        assert_eq!(v("1").cmp(&v("v1.0.0")), std::cmp::Ordering::Equal);
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(Version::parse(""), Err(VersionError::Empty));
        assert_eq!(Version::parse("  "), Err(VersionError::Empty));
        assert_eq!(Version::parse("v"), Err(VersionError::Empty));
    }

    #[test]
    fn rejects_non_version_tags() {
        for tag in ["notaversion", "latest", "v1.x.0", "1..2", ".1", "-beta", "1.2.3.4"] {
            assert!(Version::parse(tag).is_err(), "{tag} should not parse");
        }
    }

    #[test]
    fn reports_too_many_components() {
        match Version::parse("1.2.3.4") {
            Err(VersionError::TooManyComponents { count, .. }) => assert_eq!(count, 4),
            other => panic!("expected TooManyComponents, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_prerelease() {
        assert!(matches!(
            Version::parse("1.0.0-"),
            Err(VersionError::Semver { .. })
        ));
    }

    #[test]
    fn from_str_matches_parse() {
        let parsed: Version = "v2.4.0".parse().unwrap();
        assert_eq!(parsed, v("2.4.0"));
        assert_eq!(parsed.to_string(), "2.4.0");
    }
}
