//! Candidate sequence construction from raw release tags.

use std::collections::HashSet;

use tracing::trace;

use super::{Version, VersionError};

/// Inclusive `[lower, upper]` version bounds supplied by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    lower: Version,
    upper: Version,
}

impl VersionRange {
    /// Creates a range from already parsed bounds.
    ///
    /// `lower > upper` is accepted; such a range contains nothing.
    #[must_use]
    pub const fn new(lower: Version, upper: Version) -> Self {
        Self { lower, upper }
    }

    /// Parses both bound strings.
    ///
    /// # Errors
    ///
    /// Returns the [`VersionError`] of the first bound that fails to parse.
    pub fn parse(lower: &str, upper: &str) -> Result<Self, VersionError> {
        Ok(Self::new(Version::parse(lower)?, Version::parse(upper)?))
    }

    /// Lower bound (inclusive).
    #[must_use]
    pub const fn lower(&self) -> &Version {
        &self.lower
    }

    /// Upper bound (inclusive).
    #[must_use]
    pub const fn upper(&self) -> &Version {
        &self.upper
    }

    /// Returns `true` when `lower <= version <= upper`.
    #[must_use]
    pub fn contains(&self, version: &Version) -> bool {
        &self.lower <= version && version <= &self.upper
    }
}

/// Strictly ascending, duplicate-free versions inside a [`VersionRange`].
///
/// Only [`build_range`] constructs this type, so the ordering and bounds
/// invariants always hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSequence {
    versions: Vec<Version>,
}

impl CandidateSequence {
    /// The candidates as a slice, lowest first.
    #[must_use]
    pub fn as_slice(&self) -> &[Version] {
        &self.versions
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Returns `true` when no version fell inside the range.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Lowest candidate.
    #[must_use]
    pub fn first(&self) -> Option<&Version> {
        self.versions.first()
    }

    /// Highest candidate.
    #[must_use]
    pub fn last(&self) -> Option<&Version> {
        self.versions.last()
    }
}

/// Builds the sorted candidate sequence for `range` from raw release tags.
///
/// Tags that do not parse as versions are skipped. Only the first occurrence
/// of each canonical version string is considered; the seen-set is tracked
/// over the whole stream before range filtering. The result is sorted by
/// version order and may be empty.
pub fn build_range<I, S>(raw_tags: I, range: &VersionRange) -> CandidateSequence
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut versions = Vec::new();

    for raw in raw_tags {
        let raw = raw.as_ref();
        let version = match Version::parse(raw) {
            Ok(version) => version,
            Err(err) => {
                trace!(tag = raw, error = %err, "skipping non-version tag");
                continue;
            },
        };
        if !seen.insert(version.canonical()) {
            continue;
        }
        if range.contains(&version) {
            versions.push(version);
        }
    }

    versions.sort_unstable();
    CandidateSequence { versions }
}
