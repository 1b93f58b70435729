//! Latest-release lookup on the GitHub REST API.

use super::BumpError;
use crate::fetch::USER_AGENT;
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Public GitHub API root.
pub const GITHUB_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const ACCEPT: &str = "application/vnd.github.v3+json";

/// Source of upstream release versions.
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseSource: Send + Sync {
    /// Latest release version of `owner/repo`, without a leading `v`.
    ///
    /// Returns `Ok(None)` when the release has no tag.
    ///
    /// # Errors
    ///
    /// Returns [`BumpError::Github`] when the request fails or the response
    /// cannot be decoded.
    fn latest_version(&self, owner: &str, repo: &str) -> Result<Option<String>, BumpError>;
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    tag_name: Option<String>,
}

/// Token-authenticated GitHub API client.
pub struct GithubClient {
    agent: ureq::Agent,
    server_url: String,
    token: String,
}

impl GithubClient {
    /// Create a client for `server_url` authenticating with `token`.
    #[must_use]
    pub fn new(server_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            server_url: server_url.into(),
            token: token.into(),
        }
    }
}

impl ReleaseSource for GithubClient {
    fn latest_version(&self, owner: &str, repo: &str) -> Result<Option<String>, BumpError> {
        let url = format!("{}/repos/{owner}/{repo}/releases/latest", self.server_url);
        log::info!("fetching latest release for {owner}/{repo} from {url}");
        let start = Instant::now();
        let github_error = |reason: String| BumpError::Github {
            repo: format!("{owner}/{repo}"),
            reason,
        };

        let response = self
            .agent
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT)
            .header("Authorization", &format!("token {}", self.token))
            .header("X-GitHub-Api-Version", API_VERSION)
            .call()
            .map_err(|err| github_error(err.to_string()))?;
        log::info!(
            "request completed in {}ms with status {}",
            start.elapsed().as_millis(),
            response.status()
        );

        let body = response
            .into_body()
            .read_to_string()
            .map_err(|err| github_error(err.to_string()))?;
        log::debug!("response body size: {} bytes", body.len());
        parse_release(&body).map_err(|err| github_error(err.to_string()))
    }
}

fn parse_release(body: &str) -> Result<Option<String>, serde_json::Error> {
    let release: ReleaseResponse = serde_json::from_str(body)?;
    let Some(tag) = release.tag_name else {
        log::info!("release found but no tag_name present");
        return Ok(None);
    };
    Ok(Some(tag.trim_start_matches('v').to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::prefixed(r#"{"tag_name": "v1.2.3"}"#, Some("1.2.3"))]
    #[case::bare(r#"{"tag_name": "14.1.0", "name": "ripgrep 14.1.0"}"#, Some("14.1.0"))]
    #[case::missing(r#"{"name": "untagged"}"#, None)]
    fn parses_release_tag(#[case] body: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            parse_release(body).expect("valid json").as_deref(),
            expected
        );
    }

    #[test]
    fn rejects_non_json_body() {
        assert!(parse_release("<html>").is_err());
    }
}
