//! GitHub Actions context and repository metadata lookup.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use size_tracker_core::{TrackerError, TriggerEvent};
use tracing::{debug, info, warn};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Event metadata exported by the Actions runner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionsContext {
    pub event_name: String,
    pub git_ref: String,
    pub ref_type: String,
    pub sha: Option<String>,
    /// `owner/name`.
    pub repository: Option<String>,
    pub event_path: Option<PathBuf>,
    pub api_url: String,
}

impl ActionsContext {
    pub fn trigger_event(&self) -> TriggerEvent {
        TriggerEvent::new(&self.event_name, &self.ref_type, &self.git_ref)
    }
}

/// Whether the process runs inside a GitHub Actions job.
pub fn in_actions() -> bool {
    std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true")
}

/// Split `owner/name`.
pub fn split_repository(repository: &str) -> Option<(&str, &str)> {
    let (owner, name) = repository.split_once('/')?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((owner, name))
}

/// `repository.default_branch` from a webhook payload, when present.
pub fn default_branch_from_payload(payload: &Value) -> Option<String> {
    payload
        .get("repository")?
        .get("default_branch")?
        .as_str()
        .filter(|b| !b.is_empty())
        .map(str::to_string)
}

fn read_payload(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read event payload {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("event payload {} is not valid JSON", path.display()))
}

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    default_branch: String,
}

/// Minimal REST client for the repository endpoint.
pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
}

impl GithubClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("GITHUB_TOKEN contains characters not allowed in a header")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .user_agent(concat!("size-tracker/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn default_branch(&self, repository: &str) -> Result<String> {
        let Some((owner, name)) = split_repository(repository) else {
            bail!("repository {repository:?} is not in owner/name form");
        };
        let url = format!("{}/repos/{owner}/{name}", self.api_url);
        debug!(%url, "looking up default branch");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("GitHub API returned {status} for {url}");
        }
        let info: RepositoryInfo = response
            .json()
            .await
            .context("unexpected repository response")?;
        Ok(info.default_branch)
    }
}

/// Resolve the default branch: override, then the event payload, then the
/// REST API.
///
/// Falling back to the API needs `GITHUB_REPOSITORY` and `GITHUB_TOKEN`. A
/// missing input or a failed lookup is an error, never a guess.
pub async fn resolve_default_branch(
    ctx: &ActionsContext,
    explicit: Option<&str>,
    token: Option<&str>,
) -> Result<String> {
    if let Some(branch) = explicit.filter(|b| !b.is_empty()) {
        return Ok(branch.to_string());
    }

    if let Some(path) = &ctx.event_path {
        match read_payload(path) {
            Ok(payload) => {
                if let Some(branch) = default_branch_from_payload(&payload) {
                    debug!(%branch, "default branch from event payload");
                    return Ok(branch);
                }
            }
            Err(e) => warn!("{e:#}"),
        }
    }

    let token = token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| TrackerError::MissingInput("GITHUB_TOKEN".to_string()))?;
    let repository = ctx
        .repository
        .as_deref()
        .ok_or_else(|| TrackerError::MissingInput("GITHUB_REPOSITORY".to_string()))?;

    let branch = GithubClient::new(&ctx.api_url, token)?
        .default_branch(repository)
        .await
        .context("getting repository")?;
    info!("Default branch of {repository} is {branch}");
    Ok(branch)
}
