//! GitHub releases API lister.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, RETRY_AFTER, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{ReleaseError, ReleaseLister};

/// Public GitHub REST API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";
const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
const CLIENT_USER_AGENT: &str = concat!("relbisect/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ReleaseEntry {
    #[serde(default)]
    tag_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

/// Lists release tags of one GitHub repository.
///
/// The optional token only raises the API rate limit; anonymous listing
/// works for public repositories. The token never appears in `Debug` output.
#[derive(Debug)]
pub struct GitHubReleaseLister {
    owner: String,
    repo: String,
    per_page: u32,
    api_base_url: String,
    token: Option<SecretString>,
    http: Client,
}

impl GitHubReleaseLister {
    /// Creates a lister for `owner/repo` against the public API.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Configuration`] when `owner`, `repo`, or
    /// `per_page` is empty, or the HTTP client cannot be built.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        per_page: u32,
        token: Option<SecretString>,
    ) -> Result<Self, ReleaseError> {
        let owner = owner.into();
        let repo = repo.into();
        if owner.trim().is_empty() || repo.trim().is_empty() {
            return Err(ReleaseError::Configuration(
                "repository owner and name must not be empty".to_string(),
            ));
        }
        if per_page == 0 {
            return Err(ReleaseError::Configuration(
                "per_page must be at least 1".to_string(),
            ));
        }

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| ReleaseError::Configuration(err.to_string()))?;

        Ok(Self {
            owner,
            repo,
            per_page,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token,
            http,
        })
    }

    /// Overrides the API endpoint (GitHub Enterprise, test servers).
    #[must_use]
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    fn releases_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases",
            self.api_base_url.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }
}

impl ReleaseLister for GitHubReleaseLister {
    fn list_page(&self, page: u32) -> Result<Vec<String>, ReleaseError> {
        let mut request = self
            .http
            .get(self.releases_url())
            .query(&[("per_page", self.per_page), ("page", page)])
            .header(ACCEPT, "application/vnd.github+json")
            .header(API_VERSION_HEADER, API_VERSION)
            .header(USER_AGENT, CLIENT_USER_AGENT);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .map_err(|err| ReleaseError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let headers = response.headers();
        let remaining = headers
            .get(RATE_LIMIT_REMAINING_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response
            .text()
            .map_err(|err| ReleaseError::Transport(err.to_string()))?;

        if let Some(err) = classify_failure(status, remaining.as_deref(), retry_after, &body) {
            return Err(err);
        }
        parse_release_page(&body)
    }

    fn source(&self) -> String {
        format!("github.com/{}/{}", self.owner, self.repo)
    }
}

/// Maps a non-success response to the matching [`ReleaseError`].
///
/// Throttling is recognised from HTTP 429, from HTTP 403 with an exhausted
/// `x-ratelimit-remaining`, and from any error message mentioning a rate
/// limit (secondary limits).
fn classify_failure(
    status: u16,
    rate_limit_remaining: Option<&str>,
    retry_after: Option<Duration>,
    body: &str,
) -> Option<ReleaseError> {
    if (200..300).contains(&status) {
        return None;
    }
    let message = serde_json::from_str::<ApiMessage>(body)
        .map(|m| m.message)
        .unwrap_or_else(|_| body.trim().to_string());

    let exhausted = rate_limit_remaining.is_some_and(|remaining| remaining.trim() == "0");
    if status == 429
        || (status == 403 && exhausted)
        || message.to_ascii_lowercase().contains("rate limit")
    {
        return Some(ReleaseError::RateLimited { retry_after });
    }
    Some(ReleaseError::Api { status, message })
}

fn parse_release_page(body: &str) -> Result<Vec<String>, ReleaseError> {
    let entries: Vec<ReleaseEntry> =
        serde_json::from_str(body).map_err(|err| ReleaseError::Parse(err.to_string()))?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| entry.tag_name)
        .collect())
}
