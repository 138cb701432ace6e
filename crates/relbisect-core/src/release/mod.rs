//! Release listing.
//!
//! A [`ReleaseLister`] yields one page of release tag names at a time. The
//! listing is exhausted by the first empty page. Listers report throttling as
//! [`ReleaseError::RateLimited`], which [`collect_release_tags`] retries on
//! the same page after a fixed backoff, indefinitely; every other error is
//! fatal.

mod github;

use std::time::Duration;

pub use github::{DEFAULT_API_BASE_URL, GitHubReleaseLister};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced while listing releases.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReleaseError {
    /// The release source throttled the request; retry the same page.
    #[error("release listing rate limited")]
    RateLimited {
        /// Server-suggested wait, when one was provided.
        retry_after: Option<Duration>,
    },

    /// The request could not be sent or the response could not be read.
    #[error("release listing transport error: {0}")]
    Transport(String),

    /// The release source answered with a non-success status.
    #[error("release listing API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response message.
        message: String,
    },

    /// The response body was not the expected shape.
    #[error("release listing parse error: {0}")]
    Parse(String),

    /// The lister could not be configured.
    #[error("release listing configuration error: {0}")]
    Configuration(String),
}

impl ReleaseError {
    /// Returns `true` for the retryable throttling condition.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// A paginated source of release tag names.
pub trait ReleaseLister {
    /// Returns the tag names on `page` (1-based). An empty page marks the end.
    ///
    /// Pages may contain duplicates and tags that are not versions.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::RateLimited`] when throttled, or another
    /// [`ReleaseError`] on failure.
    fn list_page(&self, page: u32) -> Result<Vec<String>, ReleaseError>;

    /// Human-readable identity of the source, for progress output.
    fn source(&self) -> String;
}

impl<L: ReleaseLister + ?Sized> ReleaseLister for &L {
    fn list_page(&self, page: u32) -> Result<Vec<String>, ReleaseError> {
        (**self).list_page(page)
    }

    fn source(&self) -> String {
        (**self).source()
    }
}

/// Collects every tag from `lister`, sleeping with `sleep(backoff)` before
/// retrying a rate-limited page.
///
/// Empty tag names are dropped.
///
/// # Errors
///
/// Returns the first non-rate-limit [`ReleaseError`].
pub fn collect_release_tags<L, S>(
    lister: &L,
    backoff: Duration,
    mut sleep: S,
) -> Result<Vec<String>, ReleaseError>
where
    L: ReleaseLister + ?Sized,
    S: FnMut(Duration),
{
    let mut tags = Vec::new();
    let mut page = 1;
    loop {
        let entries = match lister.list_page(page) {
            Ok(entries) => entries,
            Err(ReleaseError::RateLimited { retry_after }) => {
                warn!(
                    page,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    retry_after_secs = retry_after.map(|d| d.as_secs()),
                    "release listing rate limited, retrying page"
                );
                sleep(backoff);
                continue;
            },
            Err(err) => return Err(err),
        };
        if entries.is_empty() {
            debug!(pages = page - 1, tags = tags.len(), "release listing complete");
            return Ok(tags);
        }
        debug!(page, count = entries.len(), "fetched release page");
        tags.extend(entries.into_iter().filter(|tag| !tag.is_empty()));
        page += 1;
    }
}
