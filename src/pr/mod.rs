pub mod diff;
pub mod types;

pub use types::{ChangedFile, PrUrl};

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::analysis::FileFilter;

const USER_AGENT: &str = "pr-helper";
const GITHUB_JSON: &str = "application/vnd.github+json";
/// Largest page size the files endpoint accepts.
const FILES_PER_PAGE: usize = 100;

#[derive(Debug, Error)]
pub enum PrError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("GitHub API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid PR URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to parse diff: {0}")]
    DiffParse(String),
}

/// Where changed files come from.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// Every changed file of the pull request, in the order the host lists them.
    async fn changed_files(&self, target: &PrUrl) -> Result<Vec<ChangedFile>, PrError>;
}

/// Where the finished report goes.
#[async_trait]
pub trait CommentSink: Send + Sync {
    async fn post_comment(&self, target: &PrUrl, body: &str) -> Result<(), PrError>;
}

/// Parse a GitHub PR URL into its component parts.
///
/// Expected format: https://github.com/{owner}/{repo}/pull/{number}
pub fn parse_pr_url(url: &str) -> Result<PrUrl, PrError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| PrError::InvalidUrl(url.to_string()))?;

    if parsed.host_str() != Some("github.com") {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let segments: Vec<_> = parsed
        .path_segments()
        .ok_or_else(|| PrError::InvalidUrl(url.to_string()))?
        .filter(|segment| !segment.is_empty())
        .collect();

    // Links to a PR tab (".../pull/42/files") still name the PR.
    if segments.len() < 4 || segments[2] != "pull" {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let pr_number = segments[3]
        .parse::<u64>()
        .map_err(|_| PrError::InvalidUrl(url.to_string()))?;

    Ok(PrUrl {
        owner: segments[0].to_string(),
        repo: segments[1].to_string(),
        pr_number,
    })
}

/// Fetch the changed files of a pull request and keep only those the
/// analyzers care about.
pub async fn collect_changed_files(
    source: &dyn PullRequestSource,
    target: &PrUrl,
    filter: &FileFilter,
) -> Result<Vec<ChangedFile>, PrError> {
    let files = source.changed_files(target).await?;
    let total = files.len();
    let relevant: Vec<ChangedFile> = files
        .into_iter()
        .filter(|f| filter.is_relevant(&f.filename))
        .collect();
    info!(total, relevant = relevant.len(), "collected changed files");
    Ok(relevant)
}

/// GitHub REST API client acting as both PR source and comment sink.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self, PrError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            token: token.into(),
        })
    }

    fn files_url(&self, target: &PrUrl) -> String {
        format!(
            "{}/repos/{}/{}/pulls/{}/files",
            self.api_url, target.owner, target.repo, target.pr_number
        )
    }

    fn comments_url(&self, target: &PrUrl) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_url, target.owner, target.repo, target.pr_number
        )
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PrError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PrError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    #[instrument(skip(self), fields(owner = %target.owner, repo = %target.repo, pr = target.pr_number))]
    async fn changed_files(&self, target: &PrUrl) -> Result<Vec<ChangedFile>, PrError> {
        let url = self.files_url(target);
        let mut files = Vec::new();
        let mut page = 1usize;

        loop {
            debug!(page, "fetching PR files page");
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.token)
                .header(ACCEPT, GITHUB_JSON)
                .query(&[("per_page", FILES_PER_PAGE), ("page", page)])
                .send()
                .await?;
            let batch: Vec<ChangedFile> = check_status(response).await?.json().await?;
            let batch_len = batch.len();
            files.extend(batch);

            if batch_len < FILES_PER_PAGE {
                break;
            }
            page += 1;
        }

        debug!(files = files.len(), "received PR files");
        Ok(files)
    }
}

#[async_trait]
impl CommentSink for GitHubClient {
    #[instrument(skip(self, body), fields(owner = %target.owner, repo = %target.repo, pr = target.pr_number))]
    async fn post_comment(&self, target: &PrUrl, body: &str) -> Result<(), PrError> {
        let response = self
            .http
            .post(self.comments_url(target))
            .bearer_auth(&self.token)
            .header(ACCEPT, GITHUB_JSON)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;
        check_status(response).await?;
        info!("posted comment to pull request");
        Ok(())
    }
}
