//! GitHub connector.
//!
//! Fetches pull requests for an organization's repositories through the REST
//! listing API. The listing endpoint supports server-side state/sort
//! parameters but cannot filter by author, so author filtering (and the
//! `since` cutoff on creation time) happens client-side while paginating
//! newest-first until a short page ends the loop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::connector::{Connector, ConnectorError, Pacing, PAGE_SIZE};
use crate::models::{ChangeState, CodeChange};

pub struct GithubConnector {
    client: Client,
    token: String,
    organization: String,
    base_url: String,
    pacing: Pacing,
}

impl GithubConnector {
    pub fn new(token: String, organization: String, pacing: Pacing) -> Result<Self, ConnectorError> {
        Self::with_base_url(token, organization, pacing, "https://api.github.com".to_string())
    }

    /// Point the connector at a non-default API root. Used by tests.
    pub fn with_base_url(
        token: String,
        organization: String,
        pacing: Pacing,
        base_url: String,
    ) -> Result<Self, ConnectorError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("teampulse/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            token,
            organization,
            base_url: base_url.trim_end_matches('/').to_string(),
            pacing,
        })
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response, ConnectorError> {
        debug!(url = %url, "GitHub API request");

        let response = self
            .client
            .get(url)
            .query(query)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => {
                Err(ConnectorError::Auth("invalid GitHub token".to_string()))
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(ConnectorError::Api {
                    platform: "github",
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl Connector for GithubConnector {
    type Record = CodeChange;

    fn platform(&self) -> &'static str {
        "github"
    }

    fn pacing(&self) -> Pacing {
        self.pacing
    }

    async fn validate_access(&self, scope: &str) -> Result<(), ConnectorError> {
        let url = format!("{}/repos/{}/{}", self.base_url, self.organization, scope);
        match self.get(&url, &[]).await {
            Ok(_) => Ok(()),
            Err(ConnectorError::Api { status, message, .. }) => {
                Err(ConnectorError::AccessDenied {
                    scope: format!("{}/{}", self.organization, scope),
                    message: format!("HTTP {}: {}", status, message),
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn fetch_for_identity(
        &self,
        scope: &str,
        identity: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<CodeChange>, ConnectorError> {
        let url = format!("{}/repos/{}/{}/pulls", self.base_url, self.organization, scope);
        let mut page = 1u32;
        let mut changes = Vec::new();

        loop {
            if page > 1 {
                tokio::time::sleep(self.pacing.page_delay).await;
            }

            let query = [
                ("state", "all".to_string()),
                ("sort", "created".to_string()),
                ("direction", "desc".to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ];

            let body = self.get(&url, &query).await?.text().await?;
            let batch: Vec<WirePullRequest> = serde_json::from_str(&body)?;
            let batch_len = batch.len();

            for pr in batch {
                if pr.user.as_ref().map(|u| u.login.as_str()) != Some(identity) {
                    continue;
                }
                if let Some(cutoff) = since {
                    if pr.created_at < cutoff {
                        continue;
                    }
                }
                changes.push(map_pull_request(pr, scope));
            }

            if batch_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(changes)
    }
}

#[derive(Debug, Deserialize)]
struct WirePullRequest {
    number: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    user: Option<WireUser>,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    additions: Option<i64>,
    #[serde(default)]
    deletions: Option<i64>,
    #[serde(default)]
    comments: Option<i64>,
    #[serde(default)]
    commits: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    login: String,
}

fn map_pull_request(pr: WirePullRequest, repository: &str) -> CodeChange {
    // A closed PR with a merge timestamp is merged; the listing API never
    // reports "merged" as a state itself.
    let state = match ChangeState::parse(&pr.state) {
        ChangeState::Closed if pr.merged_at.is_some() => ChangeState::Merged,
        other => other,
    };

    CodeChange {
        id: None,
        external_id: pr.number,
        repository: repository.to_string(),
        title: pr.title,
        description: pr.body.unwrap_or_default(),
        author: pr.user.map(|u| u.login).unwrap_or_default(),
        created_at: pr.created_at,
        merged_at: pr.merged_at,
        lines_added: pr.additions.unwrap_or(0),
        lines_deleted: pr.deletions.unwrap_or(0),
        comments_count: pr.comments.unwrap_or(0),
        commits_count: pr.commits.unwrap_or(0),
        state,
    }
}
