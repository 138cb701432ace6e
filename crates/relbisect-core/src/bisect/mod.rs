//! Binary search for the first failing candidate.
//!
//! [`find_first_bad`] narrows an ascending sequence with a boolean oracle and
//! returns the leftmost element the oracle reports as bad. It relies on the
//! *monotonic failure assumption*: once a candidate is bad, every later
//! candidate is bad too. The assumption is not checked by the search itself;
//! [`verify_monotonic`] is an opt-in full scan that reports violations.
//!
//! Oracle calls are the dominant cost (each may install a release and run an
//! external command), so the search never probes the same index twice and
//! performs at most `floor(log2(n)) + 1` calls.

use std::fmt;


/// Final outcome of a bisection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BisectionResult<V> {
    /// No candidate fell inside the requested range.
    EmptyRange,
    /// Every probed candidate was good.
    NoBadFound,
    /// The leftmost candidate reported bad.
    FirstBad(V),
}

impl<V> BisectionResult<V> {
    /// Returns the first bad candidate, if one was found.
    #[must_use]
    pub const fn first_bad(&self) -> Option<&V> {
        match self {
            Self::FirstBad(v) => Some(v),
            Self::EmptyRange | Self::NoBadFound => None,
        }
    }
}

impl<V: fmt::Display> fmt::Display for BisectionResult<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRange => f.write_str(">>> empty release range"),
            Self::NoBadFound => f.write_str(">>> No bad releases found"),
            Self::FirstBad(v) => write!(f, ">>> First bad release found: {v}"),
        }
    }
}

/// Finds the leftmost element of `candidates` for which `is_bad` is true.
///
/// `candidates` must be sorted so that the oracle's bad set is a contiguous
/// suffix. An empty slice returns `Ok(None)` without calling the oracle.
///
/// # Errors
///
/// The first oracle error aborts the search and is returned unchanged.
pub fn find_first_bad<T, E, F>(candidates: &[T], mut is_bad: F) -> Result<Option<&T>, E>
where
    F: FnMut(&T) -> Result<bool, E>,
{
    // Leftmost bad element probed so far; everything after it is excluded.
    let mut best = None;
    let mut remaining = candidates;
    loop {
        match remaining {
            [] => return Ok(best),
            [only] => return Ok(if is_bad(only)? { Some(only) } else { best }),
            _ => {
                let mid = remaining.len() / 2;
                let (below, rest) = remaining.split_at(mid);
                let probe = &rest[0];
                remaining = if is_bad(probe)? {
                    best = Some(probe);
                    below
                } else {
                    &rest[1..]
                };
            },
        }
    }
}

/// Result of a full monotonicity scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonotonicityReport<T> {
    /// Leftmost element reported bad by the full scan.
    pub first_bad: Option<T>,
    /// Elements reported good after an earlier bad element.
    pub violations: Vec<T>,
}

impl<T> MonotonicityReport<T> {
    /// Returns `true` when the oracle's bad set is a contiguous suffix.
    #[must_use]
    pub fn is_monotonic(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Evaluates the oracle on every candidate and reports monotonicity
/// violations.
///
/// This costs one oracle call per candidate and is intended as a debugging
/// aid; it does not change what [`find_first_bad`] returns.
///
/// # Errors
///
/// The first oracle error aborts the scan and is returned unchanged.
pub fn verify_monotonic<T, E, F>(
    candidates: &[T],
    mut is_bad: F,
) -> Result<MonotonicityReport<&T>, E>
where
    F: FnMut(&T) -> Result<bool, E>,
{
    let mut report = MonotonicityReport {
        first_bad: None,
        violations: Vec::new(),
    };
    for candidate in candidates {
        let bad = is_bad(candidate)?;
        match (bad, report.first_bad) {
            (true, None) => report.first_bad = Some(candidate),
            (false, Some(_)) => report.violations.push(candidate),
            _ => {},
        }
    }
    Ok(report)
}
