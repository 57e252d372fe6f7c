use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::pagination::Pages;
use crate::config::{Config, TOKEN_VAR};
use crate::error::{ContributionError, Result};
use crate::models::{is_substantive, ContributionEvent, ContributionKind, DateWindow, LineChanges};

const PER_PAGE: &str = "100";
const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub REST client for contribution queries
pub struct GitHubClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

#[derive(Debug, Deserialize)]
struct SearchIssue {
    repository_url: String,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    number: u64,
    user: Option<User>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct PullCommit {
    sha: String,
    commit: CommitData,
}

#[derive(Debug, Deserialize)]
struct CommitData {
    author: Option<GitSignature>,
    committer: Option<GitSignature>,
}

#[derive(Debug, Deserialize)]
struct GitSignature {
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    stats: Option<CommitStats>,
}

#[derive(Debug, Default, Deserialize)]
struct CommitStats {
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

#[derive(Debug, Deserialize)]
struct Review {
    user: Option<User>,
    body: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct IssueComment {
    user: Option<User>,
    body: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

impl GitHubClient {
    /// Create a client for the host, token and TLS policy in `config`
    pub fn new(config: &Config) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| ContributionError::config(TOKEN_VAR, "contains characters not valid in a header"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        let mut builder = Client::builder()
            .default_headers(headers)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT);

        if !config.verify_ssl {
            warn!("Accepting invalid TLS certificates; only use this with self-signed enterprise hosts");
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.api_base_url(),
        })
    }

    /// Collect every contribution event by `config.username` that may fall in the window
    #[instrument(skip(self, config), fields(user = %config.username))]
    pub async fn fetch_contributions(&self, config: &Config) -> Result<Vec<ContributionEvent>> {
        info!("Fetching contributions");

        let repositories = self
            .involved_repositories(&config.username, &config.window)
            .await?;

        info!(count = repositories.len(), "Found repositories with activity");

        let mut events = Vec::new();
        for repository in &repositories {
            let found = self
                .repository_contributions(repository, &config.username, &config.window)
                .await?;
            debug!(repository = %repository, events = found.len(), "Collected repository events");
            events.extend(found);
        }

        info!(count = events.len(), "Contribution fetch complete");

        Ok(events)
    }

    /// Repositories with issues or pull requests involving `username`, first-seen order
    pub async fn involved_repositories(
        &self,
        username: &str,
        window: &DateWindow,
    ) -> Result<Vec<String>> {
        let query = format!(
            "involves:{} updated:{}..{}",
            username, window.start, window.end
        );
        let url = self.endpoint("/search/issues", &[("q", query.as_str())])?;

        let mut repositories: Vec<String> = Vec::new();
        let mut pages = Pages::<SearchIssue>::new(self, url);
        while let Some(page) = pages.next_page().await? {
            for issue in page {
                let repository = repository_from_url(&self.base_url, &issue.repository_url).ok_or_else(|| {
                    ContributionError::unexpected(
                        &issue.repository_url,
                        "repository_url does not name an owner/repo",
                    )
                })?;
                if !repositories.contains(&repository) {
                    repositories.push(repository);
                }
            }
        }

        Ok(repositories)
    }

    #[instrument(skip(self, username, window))]
    async fn repository_contributions(
        &self,
        repository: &str,
        username: &str,
        window: &DateWindow,
    ) -> Result<Vec<ContributionEvent>> {
        let url = self.endpoint(
            &format!("/repos/{}/pulls", repository),
            &[("state", "all"), ("sort", "updated"), ("direction", "desc")],
        )?;

        let mut events = Vec::new();
        let mut pages = Pages::<PullRequest>::new(self, url);

        'pages: while let Some(page) = pages.next_page().await? {
            for pr in page {
                // Sorted by last update, so nothing further can reach into the window
                if pr.updated_at.date_naive() < window.start {
                    break 'pages;
                }

                let authored = pr
                    .user
                    .as_ref()
                    .map_or(false, |u| same_login(&u.login, username));

                if authored {
                    events.push(ContributionEvent::new(
                        repository,
                        ContributionKind::PullRequest,
                        pr.created_at,
                        username,
                    ));
                    events.extend(self.pull_commits(repository, pr.number, username, window).await?);
                }

                events.extend(self.pull_reviews(repository, pr.number, username).await?);
                events.extend(self.pull_comments(repository, pr.number, username).await?);
            }
        }

        Ok(events)
    }

    async fn pull_commits(
        &self,
        repository: &str,
        number: u64,
        username: &str,
        window: &DateWindow,
    ) -> Result<Vec<ContributionEvent>> {
        let url = self.endpoint(&format!("/repos/{}/pulls/{}/commits", repository, number), &[])?;
        let commits: Vec<PullCommit> = Pages::new(self, url).collect_all().await?;

        let mut events = Vec::new();
        for commit in commits {
            let timestamp = commit
                .commit
                .author
                .as_ref()
                .and_then(|s| s.date)
                .or_else(|| commit.commit.committer.as_ref().and_then(|s| s.date));

            let Some(timestamp) = timestamp else {
                debug!(sha = %commit.sha, "Skipping commit without a date");
                continue;
            };

            // Stats cost one request per commit; skip commits the report would drop
            if !window.contains(&timestamp) {
                continue;
            }

            let lines = self.commit_lines(repository, &commit.sha).await?;
            events.push(
                ContributionEvent::new(repository, ContributionKind::Commit, timestamp, username)
                    .with_lines(lines),
            );
        }

        Ok(events)
    }

    async fn commit_lines(&self, repository: &str, sha: &str) -> Result<LineChanges> {
        let url = self.endpoint(&format!("/repos/{}/commits/{}", repository, sha), &[])?;
        let detail: CommitDetail = self.get_json(url).await?;
        let stats = detail.stats.unwrap_or_default();

        Ok(LineChanges {
            additions: stats.additions,
            deletions: stats.deletions,
        })
    }

    async fn pull_reviews(
        &self,
        repository: &str,
        number: u64,
        username: &str,
    ) -> Result<Vec<ContributionEvent>> {
        let url = self.endpoint(&format!("/repos/{}/pulls/{}/reviews", repository, number), &[])?;
        let reviews: Vec<Review> = Pages::new(self, url).collect_all().await?;

        Ok(reviews
            .into_iter()
            .filter(|r| r.user.as_ref().map_or(false, |u| same_login(&u.login, username)))
            // Pending reviews have no submission time yet
            .filter_map(|r| {
                let submitted_at = r.submitted_at?;
                Some(
                    ContributionEvent::new(repository, ContributionKind::Review, submitted_at, username)
                        .with_substantive(is_substantive(r.body.as_deref())),
                )
            })
            .collect())
    }

    async fn pull_comments(
        &self,
        repository: &str,
        number: u64,
        username: &str,
    ) -> Result<Vec<ContributionEvent>> {
        let url = self.endpoint(&format!("/repos/{}/issues/{}/comments", repository, number), &[])?;
        let comments: Vec<IssueComment> = Pages::new(self, url).collect_all().await?;

        Ok(comments
            .into_iter()
            .filter(|c| c.user.as_ref().map_or(false, |u| same_login(&u.login, username)))
            .map(|c| {
                ContributionEvent::new(repository, ContributionKind::Comment, c.created_at, username)
                    .with_substantive(is_substantive(c.body.as_deref()))
            })
            .collect())
    }

    /// Issue a GET and map non-success statuses onto the error taxonomy
    pub(crate) async fn get(&self, url: Url) -> Result<Response> {
        debug!(url = %url, "GET");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(status_error(url.as_str(), status, &headers, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.get(url.clone()).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ContributionError::unexpected(url.as_str(), format!("invalid JSON: {}", e)))
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let raw = format!("{}{}", self.base_url, path);
        let mut params = params.to_vec();
        params.push(("per_page", PER_PAGE));
        Url::parse_with_params(&raw, &params)
            .map_err(|e| ContributionError::unexpected(raw.as_str(), format!("invalid URL: {}", e)))
    }
}

fn status_error(url: &str, status: StatusCode, headers: &HeaderMap, body: &str) -> ContributionError {
    let message = serde_json::from_str::<ApiMessage>(body)
        .map(|m| m.message)
        .unwrap_or_else(|_| excerpt(body));

    let remaining = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    // Primary limits zero the remaining quota; secondary limits send retry-after
    let rate_limited = remaining == Some("0")
        || headers.contains_key(header::RETRY_AFTER)
        || message.to_ascii_lowercase().contains("rate limit");

    match status {
        StatusCode::TOO_MANY_REQUESTS => ContributionError::RateLimit {
            reset_at: rate_limit_reset(headers),
        },
        StatusCode::FORBIDDEN if rate_limited => ContributionError::RateLimit {
            reset_at: rate_limit_reset(headers),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ContributionError::Authentication { status, message }
        }
        _ => ContributionError::unexpected(url, format!("status {}: {}", status, message)),
    }
}

/// Reset time from `x-ratelimit-reset` (epoch seconds), else `retry-after` (seconds)
fn rate_limit_reset(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let header_secs = |name: &str| -> Option<i64> { headers.get(name)?.to_str().ok()?.trim().parse().ok() };

    if let Some(epoch) = header_secs("x-ratelimit-reset") {
        return DateTime::from_timestamp(epoch, 0);
    }
    let delay = chrono::Duration::try_seconds(header_secs("retry-after")?)?;
    Utc::now().checked_add_signed(delay)
}

fn excerpt(body: &str) -> String {
    const MAX: usize = 200;
    let body = body.trim();
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    }
}

fn same_login(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Pull `owner/name` out of an API `repository_url` under `base_url`
pub fn repository_from_url(base_url: &str, url: &str) -> Option<String> {
    let prefix = format!("{}/repos/", base_url.trim_end_matches('/'));
    let rest = match url.strip_prefix(&prefix) {
        Some(rest) => rest,
        None => url.split_once("/repos/")?.1,
    };
    let rest = rest.trim_end_matches('/');
    let (owner, name) = rest.split_once('/')?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some(format!("{}/{}", owner, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_from_url() {
        let public = "https://api.github.com";
        let enterprise = "https://ghe.example.com/api/v3";

        assert_eq!(
            repository_from_url(public, "https://api.github.com/repos/octocat/hello-world").as_deref(),
            Some("octocat/hello-world")
        );
        assert_eq!(
            repository_from_url(enterprise, "https://ghe.example.com/api/v3/repos/team/service/")
                .as_deref(),
            Some("team/service")
        );
        assert!(repository_from_url(public, "https://api.github.com/repos/octocat").is_none());
        assert!(repository_from_url(public, "https://api.github.com/users/octocat").is_none());
    }

    #[test]
    fn test_repository_from_url_owner_named_repos() {
        assert_eq!(
            repository_from_url("https://api.github.com", "https://api.github.com/repos/repos/tool")
                .as_deref(),
            Some("repos/tool")
        );
        assert_eq!(
            repository_from_url(
                "https://ghe.example.com/repos/api/v3",
                "https://ghe.example.com/repos/api/v3/repos/team/repos"
            )
            .as_deref(),
            Some("team/repos")
        );
        // Host spelled differently from the configured base
        assert_eq!(
            repository_from_url("https://api.github.com", "https://API.github.com/repos/repos/tool")
                .as_deref(),
            Some("repos/tool")
        );
    }

    #[test]
    fn test_status_error_mapping() {
        let headers = HeaderMap::new();

        let err = status_error("u", StatusCode::UNAUTHORIZED, &headers, r#"{"message": "Bad credentials"}"#);
        match err {
            ContributionError::Authentication { status, message } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(message, "Bad credentials");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = status_error("u", StatusCode::FORBIDDEN, &headers, "forbidden");
        assert!(matches!(err, ContributionError::Authentication { .. }));

        let err = status_error("u", StatusCode::TOO_MANY_REQUESTS, &headers, "");
        assert!(matches!(err, ContributionError::RateLimit { reset_at: None }));

        let err = status_error("u", StatusCode::INTERNAL_SERVER_ERROR, &headers, "boom");
        assert!(matches!(err, ContributionError::UnexpectedResponse { .. }));
    }

    #[test]
    fn test_forbidden_with_exhausted_quota_is_rate_limit() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1736080200"));

        let err = status_error("u", StatusCode::FORBIDDEN, &headers, "");
        match err {
            ContributionError::RateLimit { reset_at } => {
                assert_eq!(reset_at, DateTime::from_timestamp(1_736_080_200, 0));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_secondary_rate_limit_is_rate_limit() {
        let mut headers = HeaderMap::new();
        headers.insert(header::RETRY_AFTER, HeaderValue::from_static("60"));
        let body = r#"{"message": "You have exceeded a secondary rate limit. Please wait a few minutes before you try again."}"#;

        let before = Utc::now();
        let err = status_error("u", StatusCode::FORBIDDEN, &headers, body);
        match err {
            ContributionError::RateLimit { reset_at: Some(at) } => {
                assert!(at >= before + chrono::Duration::seconds(60));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // Message alone is enough when no retry-after is sent
        let err = status_error("u", StatusCode::FORBIDDEN, &HeaderMap::new(), body);
        assert!(matches!(err, ContributionError::RateLimit { reset_at: None }));
    }

    #[test]
    fn test_huge_retry_after_does_not_overflow() {
        let mut headers = HeaderMap::new();
        headers.insert(header::RETRY_AFTER, HeaderValue::from_static("100000000000000"));

        let err = status_error("u", StatusCode::TOO_MANY_REQUESTS, &headers, "");
        assert!(matches!(err, ContributionError::RateLimit { reset_at: None }));

        headers.insert(header::RETRY_AFTER, HeaderValue::from_static("9223372036854775807"));
        assert_eq!(rate_limit_reset(&headers), None);
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(500);
        let short = excerpt(&long);
        assert_eq!(short.len(), 203);
        assert!(short.ends_with("..."));
        assert_eq!(excerpt("  short  "), "short");
    }

    #[test]
    fn test_same_login_ignores_case() {
        assert!(same_login("OctoCat", "octocat"));
        assert!(!same_login("octocat", "octodog"));
    }
}
