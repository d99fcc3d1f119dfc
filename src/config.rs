use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::storage::TokenStorage;
use crate::pr::types::PrUrl;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const TOKEN_VAR: &str = "GITHUB_TOKEN";
const REPOSITORY_VAR: &str = "GITHUB_REPOSITORY";
const PR_NUMBER_VAR: &str = "GITHUB_PULL_REQUEST_NUMBER";
const EVENT_PATH_VAR: &str = "GITHUB_EVENT_PATH";
const CLIENT_ID_VAR: &str = "PR_HELPER_CLIENT_ID";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse event payload: {0}")]
    EventPayload(#[from] serde_json::Error),

    #[error("Missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Top-level configuration loaded from .pr-helper.toml.
/// All fields are optional; the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN, then to the
    /// token saved by `pr-helper login`.
    pub token: Option<String>,
    /// REST API base URL, for GitHub Enterprise installs.
    pub api_url: Option<String>,
    /// OAuth app client id used by `pr-helper login`.
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Suffixes of files scanned for test declarations and deleted methods
    pub source_extensions: Vec<String>,
    /// Suffixes of project manifests scanned for reference changes
    pub manifest_extensions: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            source_extensions: vec![".cs".to_string()],
            manifest_extensions: vec![".csproj".to_string()],
        }
    }
}

/// Everything the GitHub Action mode needs before it can talk to the API.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub token: String,
    pub target: PrUrl,
}

#[derive(Deserialize)]
struct EventPayload {
    number: Option<u64>,
    pull_request: Option<EventPullRequest>,
}

#[derive(Deserialize)]
struct EventPullRequest {
    number: u64,
}

impl Config {
    /// Load configuration from .pr-helper.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(".pr-helper.toml");
        if path.exists() {
            debug!(path = %path.display(), "reading config file");
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn api_url(&self) -> &str {
        self.github
            .api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
    }

    pub fn client_id(&self) -> Option<String> {
        self.github
            .client_id
            .clone()
            .or_else(|| std::env::var(CLIENT_ID_VAR).ok())
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// then GITHUB_TOKEN, then the stored login token.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| non_empty(std::env::var(TOKEN_VAR).ok()))
            .or_else(stored_token)
    }

    /// Resolve the Action-mode run configuration from the process environment.
    pub fn run_config(&self) -> Result<RunConfig, ConfigError> {
        self.run_config_from(self.github_token(), |name| std::env::var(name).ok())
    }

    /// Resolve the run configuration from an explicit token and variable
    /// lookup. Every missing item is reported at once.
    pub fn run_config_from<F>(&self, token: Option<String>, lookup: F) -> Result<RunConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = non_empty(token);
        let repository = non_empty(lookup(REPOSITORY_VAR));
        let pr_number = match non_empty(lookup(PR_NUMBER_VAR)) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: PR_NUMBER_VAR,
                value: raw.clone(),
            })?),
            None => match non_empty(lookup(EVENT_PATH_VAR)) {
                Some(path) => read_event_pr_number(Path::new(&path))?,
                None => None,
            },
        };

        let mut missing = Vec::new();
        if token.is_none() {
            missing.push(TOKEN_VAR);
        }
        if repository.is_none() {
            missing.push(REPOSITORY_VAR);
        }
        if pr_number.is_none() {
            missing.push(PR_NUMBER_VAR);
        }

        let (Some(token), Some(repository), Some(pr_number)) = (token, repository, pr_number) else {
            return Err(ConfigError::Missing(missing));
        };

        let (owner, repo) = repository
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
            .ok_or_else(|| ConfigError::Invalid {
                name: REPOSITORY_VAR,
                value: repository.clone(),
            })?;

        Ok(RunConfig {
            token,
            target: PrUrl {
                owner: owner.to_string(),
                repo: repo.to_string(),
                pr_number,
            },
        })
    }
}

/// Read the pull request number from a GitHub event payload, if it has one.
pub fn read_event_pr_number(path: &Path) -> Result<Option<u64>, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let payload: EventPayload = serde_json::from_str(&contents)?;
    Ok(payload.pull_request.map(|pr| pr.number).or(payload.number))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn stored_token() -> Option<String> {
    let storage = TokenStorage::default_location()?;
    match storage.load() {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable stored token");
            None
        }
    }
}
