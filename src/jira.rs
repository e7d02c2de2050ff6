//! Jira connector.
//!
//! Fetches issues through the search API with a composed JQL query (project,
//! assignee, optional status/type, and a `created >=` lower bound), paginated
//! with `startAt`/`maxResults` until a short page ends the loop. When no
//! clause applies, the query floors to "created in the last 30 days" so an
//! unfiltered search can never walk the whole tracker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::connector::{Connector, ConnectorError, Pacing, PAGE_SIZE};
use crate::models::{is_resolved_status, WorkItem};

/// Default story-points field on Jira Cloud.
const STORY_POINTS_FIELD: &str = "customfield_10016";

pub struct JiraConnector {
    client: Client,
    base_url: String,
    username: String,
    api_token: String,
    pacing: Pacing,
}

/// Filter clauses compiled into one JQL query.
#[derive(Debug, Default)]
pub struct IssueFilter<'a> {
    pub project: &'a str,
    pub assignee: &'a str,
    pub status: &'a str,
    pub item_type: &'a str,
    pub since: Option<DateTime<Utc>>,
}

impl JiraConnector {
    pub fn new(
        base_url: String,
        username: String,
        api_token: String,
        pacing: Pacing,
    ) -> Result<Self, ConnectorError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("teampulse/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            api_token,
            pacing,
        })
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, ConnectorError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Jira API request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .basic_auth(&self.username, Some(&self.api_token))
            .header("Accept", "application/json")
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => {
                Err(ConnectorError::Auth("invalid Jira credentials".to_string()))
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(ConnectorError::Api {
                    platform: "jira",
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl Connector for JiraConnector {
    type Record = WorkItem;

    fn platform(&self) -> &'static str {
        "jira"
    }

    fn pacing(&self) -> Pacing {
        self.pacing
    }

    async fn validate_access(&self, scope: &str) -> Result<(), ConnectorError> {
        match self.get(&format!("/rest/api/2/project/{}", scope), &[]).await {
            Ok(_) => Ok(()),
            Err(ConnectorError::Api { status, message, .. }) => {
                Err(ConnectorError::AccessDenied {
                    scope: scope.to_string(),
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
    ) -> Result<Vec<WorkItem>, ConnectorError> {
        let jql = build_jql(&IssueFilter {
            project: scope,
            assignee: identity,
            since,
            ..Default::default()
        });

        let mut start_at = 0usize;
        let mut items = Vec::new();

        loop {
            if start_at > 0 {
                tokio::time::sleep(self.pacing.page_delay).await;
            }

            let query = [
                ("jql", jql.clone()),
                ("startAt", start_at.to_string()),
                ("maxResults", PAGE_SIZE.to_string()),
                ("fields", "*all".to_string()),
            ];

            let body = self.get("/rest/api/2/search", &query).await?.text().await?;
            let page: WireSearchResult = serde_json::from_str(&body)?;
            let page_len = page.issues.len();

            for issue in page.issues {
                items.push(map_issue(issue, scope));
            }

            if page_len < PAGE_SIZE {
                break;
            }
            start_at += PAGE_SIZE;
        }

        Ok(items)
    }
}

/// Compose the JQL for a filter. Clauses are ANDed; an empty filter floors
/// to the last 30 days of created issues.
pub fn build_jql(filter: &IssueFilter<'_>) -> String {
    let mut conditions = Vec::new();

    if !filter.project.is_empty() {
        conditions.push(format!("project = \"{}\"", filter.project));
    }
    if !filter.assignee.is_empty() {
        conditions.push(format!("assignee = \"{}\"", filter.assignee));
    }
    if !filter.status.is_empty() {
        conditions.push(format!("status = \"{}\"", filter.status));
    }
    if !filter.item_type.is_empty() {
        conditions.push(format!("type = \"{}\"", filter.item_type));
    }
    if let Some(since) = filter.since {
        conditions.push(format!("created >= \"{}\"", since.format("%Y-%m-%d")));
    }

    let jql = if conditions.is_empty() {
        "created >= -30d".to_string()
    } else {
        conditions.join(" AND ")
    };

    format!("{} ORDER BY updated DESC", jql)
}

#[derive(Debug, Deserialize)]
struct WireSearchResult {
    #[serde(default)]
    issues: Vec<WireIssue>,
}

#[derive(Debug, Deserialize)]
struct WireIssue {
    key: String,
    fields: WireFields,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WireFields {
    summary: Option<String>,
    description: Option<String>,
    status: Option<WireNamed>,
    priority: Option<WireNamed>,
    assignee: Option<WireUser>,
    reporter: Option<WireUser>,
    issuetype: Option<WireNamed>,
    labels: Vec<String>,
    #[serde(rename = "customfield_10016")]
    story_points: Option<f64>,
    created: Option<String>,
    updated: Option<String>,
    resolutiondate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "displayName", default)]
    display_name: Option<String>,
}

impl WireUser {
    fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.display_name.clone())
            .unwrap_or_default()
    }
}

/// Jira timestamps arrive as `2024-03-01T09:00:00.000+0000`; RFC 3339 is
/// accepted too for tolerance.
fn parse_jira_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.3f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn map_issue(issue: WireIssue, project: &str) -> WorkItem {
    let fields = issue.fields;
    let created_at = fields
        .created
        .as_deref()
        .and_then(parse_jira_time)
        .unwrap_or_default();
    let updated_at = fields
        .updated
        .as_deref()
        .and_then(parse_jira_time)
        .unwrap_or(created_at);

    let status = fields.status.map(|s| s.name).unwrap_or_default();
    let mut resolved_at = fields.resolutiondate.as_deref().and_then(parse_jira_time);

    // Trackers frequently close items without filling the resolution field;
    // a resolved-vocabulary status still counts, dated at the last update.
    if resolved_at.is_none() && is_resolved_status(&status) {
        resolved_at = Some(updated_at);
    }

    WorkItem {
        id: None,
        external_key: issue.key,
        project: project.to_string(),
        title: fields.summary.unwrap_or_default(),
        description: fields.description.unwrap_or_default(),
        status,
        priority: fields.priority.map(|p| p.name).unwrap_or_default(),
        assignee: fields.assignee.map(|u| u.label()).unwrap_or_default(),
        reporter: fields.reporter.map(|u| u.label()).unwrap_or_default(),
        item_type: fields.issuetype.map(|t| t.name).unwrap_or_default(),
        labels: fields.labels,
        story_points: fields.story_points.map(|p| p.round() as i64),
        created_at,
        updated_at,
        resolved_at,
    }
}
