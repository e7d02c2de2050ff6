//! Sync orchestration.
//!
//! Drives the end-to-end run: resolves teams and identities from config,
//! decides the effective `since` cutoff per scope, fans fetch tasks out
//! through the worker pool, drains the results, upserts records, and
//! advances watermarks. One canonical pipeline handles both platforms;
//! whichever connector is absent is simply skipped.
//!
//! Failure granularity: a scope access failure skips the scope, an identity
//! fetch failure skips that identity's contribution, a record save failure
//! skips that record. All three warn and keep the run going.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, Team, WatermarkPolicy};
use crate::connector::Connector;
use crate::db;
use crate::models::{CodeChange, WorkItem};
use crate::pool::WorkerPool;
use crate::store::{CodeChangeStore, WorkItemStore};

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Case-insensitive exact-match team filter; `None` syncs every team.
    pub team: Option<String>,
    /// Explicit lower bound; wins over any stored watermark.
    pub since: Option<DateTime<Utc>>,
    /// Resolve and print the plan without fetching or writing.
    pub dry_run: bool,
}

/// Where a scope's effective `since` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinceSource {
    Override(DateTime<Utc>),
    Watermark(DateTime<Utc>),
    FullHistory,
}

impl SinceSource {
    pub fn cutoff(&self) -> Option<DateTime<Utc>> {
        match self {
            SinceSource::Override(t) | SinceSource::Watermark(t) => Some(*t),
            SinceSource::FullHistory => None,
        }
    }
}

impl std::fmt::Display for SinceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinceSource::Override(t) => write!(f, "override {}", t.format("%Y-%m-%d")),
            SinceSource::Watermark(t) => write!(f, "watermark {}", t.format("%Y-%m-%d %H:%M")),
            SinceSource::FullHistory => write!(f, "full history"),
        }
    }
}

/// End-of-run totals. Warnings are also emitted as log lines as they occur.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub code_changes: u64,
    pub work_items: u64,
    pub warnings: Vec<String>,
}

impl SyncReport {
    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

/// Case-insensitive exact-match team filter; empty filter keeps all teams.
pub fn filter_teams(teams: &[Team], filter: Option<&str>) -> Vec<Team> {
    match filter {
        None => teams.to_vec(),
        Some(name) => teams
            .iter()
            .filter(|t| t.name.eq_ignore_ascii_case(name))
            .cloned()
            .collect(),
    }
}

/// Union of one platform's identities across the selected teams, in
/// configuration order, plus a warning per member lacking one.
fn collect_identities(
    teams: &[Team],
    platform: &str,
    pick: impl Fn(&crate::config::Member) -> &str,
) -> (Vec<String>, Vec<String>) {
    let mut identities: Vec<String> = Vec::new();
    let mut warnings = Vec::new();

    for team in teams {
        for member in &team.members {
            let identity = pick(member);
            if identity.is_empty() {
                warnings.push(format!(
                    "member {} ({}) has no {} identity, skipping for this platform",
                    member.name, team.name, platform
                ));
            } else if !identities.iter().any(|i| i == identity) {
                identities.push(identity.to_string());
            }
        }
    }

    (identities, warnings)
}

/// Outcome of fanning one scope's identities through the pool.
struct ScopeFetch<R> {
    records: Vec<R>,
    failed_identities: usize,
    warnings: Vec<String>,
}

/// Fan out one fetch task per identity, then drain every handle. Submission
/// alone blocks on pool capacity; results are only collected once all tasks
/// are dispatched, so the pool's full width stays in use.
async fn fetch_scope<C>(
    connector: &Arc<C>,
    scope: &str,
    identities: &[String],
    since: Option<DateTime<Utc>>,
    pool: &WorkerPool,
) -> ScopeFetch<C::Record>
where
    C: Connector + 'static,
{
    let mut handles = Vec::with_capacity(identities.len());
    for identity in identities {
        let connector = Arc::clone(connector);
        let scope = scope.to_string();
        let identity = identity.clone();
        let handle = pool
            .spawn(async move {
                let result = connector.fetch_for_identity(&scope, &identity, since).await;
                (identity, result)
            })
            .await;
        handles.push(handle);
    }

    let mut fetch = ScopeFetch {
        records: Vec::new(),
        failed_identities: 0,
        warnings: Vec::new(),
    };

    for handle in handles {
        match handle.await {
            Ok((_, Ok(records))) => fetch.records.extend(records),
            Ok((identity, Err(err))) => {
                fetch.failed_identities += 1;
                fetch
                    .warnings
                    .push(format!("fetch failed for {} in {}: {}", identity, scope, err));
            }
            Err(join_err) => {
                fetch.failed_identities += 1;
                fetch
                    .warnings
                    .push(format!("fetch task panicked for {}: {}", scope, join_err));
            }
        }
    }

    fetch
}

fn watermark_may_advance(policy: WatermarkPolicy, failed_identities: usize) -> bool {
    match policy {
        WatermarkPolicy::Always => true,
        WatermarkPolicy::OnFullSuccess => failed_identities == 0,
    }
}

/// Run the sync engine.
///
/// Connectors are passed in explicitly (as is the pool) so tests can drive
/// the pipeline with mock platforms. `None` for a connector skips that
/// platform's scopes; the CLI only constructs connectors whose scopes are
/// configured and whose credentials are present.
pub async fn run_sync<G, J>(
    config: &Config,
    github: Option<Arc<G>>,
    jira: Option<Arc<J>>,
    pool: &WorkerPool,
    opts: &SyncOptions,
) -> Result<SyncReport>
where
    G: Connector<Record = CodeChange> + 'static,
    J: Connector<Record = WorkItem> + 'static,
{
    let teams = filter_teams(&config.teams, opts.team.as_deref());
    if teams.is_empty() {
        anyhow::bail!(
            "no teams found matching filter: {}",
            opts.team.as_deref().unwrap_or("<none>")
        );
    }

    let sqlite = db::connect(config).await?;
    crate::migrate::apply(&sqlite).await?;
    let change_store = CodeChangeStore::new(sqlite.clone());
    let item_store = WorkItemStore::new(sqlite.clone());

    let mut report = SyncReport::default();

    let (gh_identities, gh_warnings) =
        collect_identities(&teams, "github", |m| &m.github_username);
    let (jira_identities, jira_warnings) =
        collect_identities(&teams, "jira", |m| &m.jira_username);
    for w in gh_warnings.into_iter().chain(jira_warnings) {
        report.warn(w);
    }

    if opts.dry_run {
        print_plan(config, &teams, &gh_identities, &jira_identities, opts, &change_store, &item_store)
            .await?;
        sqlite.close().await;
        return Ok(report);
    }

    let policy = config.sync.watermark_policy;

    // Repository scopes, in configuration order
    if let Some(github) = github.as_ref() {
        for repo in &config.github.repositories {
            if gh_identities.is_empty() {
                report.warn(format!("no github identities configured, skipping {}", repo));
                continue;
            }

            if let Err(err) = github.validate_access(repo).await {
                report.warn(format!("cannot access repository {}: {}", repo, err));
                continue;
            }

            let since = match opts.since {
                Some(t) => SinceSource::Override(t),
                None => match change_store.last_sync(repo).await? {
                    Some(t) => SinceSource::Watermark(t),
                    None => SinceSource::FullHistory,
                },
            };
            info!(repository = %repo, since = %since, "syncing repository");

            let fetch = fetch_scope(github, repo, &gh_identities, since.cutoff(), pool).await;
            for w in fetch.warnings {
                report.warn(w);
            }

            let mut saved = 0u64;
            for change in &fetch.records {
                match change_store.upsert(change).await {
                    Ok(()) => saved += 1,
                    Err(err) => report.warn(format!(
                        "failed to save change #{} in {}: {}",
                        change.external_id, repo, err
                    )),
                }
            }
            report.code_changes += saved;
            info!(repository = %repo, saved, "repository synced");

            if watermark_may_advance(policy, fetch.failed_identities) {
                if let Err(err) = change_store.set_last_sync(repo, Utc::now()).await {
                    report.warn(format!("failed to update watermark for {}: {}", repo, err));
                }
            } else {
                report.warn(format!(
                    "watermark for {} held back: {} identity fetch(es) failed",
                    repo, fetch.failed_identities
                ));
            }
        }
    }

    // Project scopes
    if let Some(jira) = jira.as_ref() {
        for project in &config.jira.projects {
            if jira_identities.is_empty() {
                report.warn(format!("no jira identities configured, skipping {}", project));
                continue;
            }

            if let Err(err) = jira.validate_access(project).await {
                report.warn(format!("cannot access project {}: {}", project, err));
                continue;
            }

            let since = match opts.since {
                Some(t) => SinceSource::Override(t),
                None => match item_store.last_sync(project).await? {
                    Some(t) => SinceSource::Watermark(t),
                    None => SinceSource::FullHistory,
                },
            };
            info!(project = %project, since = %since, "syncing project");

            let fetch = fetch_scope(jira, project, &jira_identities, since.cutoff(), pool).await;
            for w in fetch.warnings {
                report.warn(w);
            }

            let mut saved = 0u64;
            for item in &fetch.records {
                match item_store.upsert(item).await {
                    Ok(()) => saved += 1,
                    Err(err) => report.warn(format!(
                        "failed to save item {} in {}: {}",
                        item.external_key, project, err
                    )),
                }
            }
            report.work_items += saved;
            info!(project = %project, saved, "project synced");

            if watermark_may_advance(policy, fetch.failed_identities) {
                if let Err(err) = item_store.set_last_sync(project, Utc::now()).await {
                    report.warn(format!("failed to update watermark for {}: {}", project, err));
                }
            } else {
                report.warn(format!(
                    "watermark for {} held back: {} identity fetch(es) failed",
                    project, fetch.failed_identities
                ));
            }
        }
    }

    sqlite.close().await;

    println!("sync completed");
    println!("  code changes: {}", report.code_changes);
    println!("  work items:   {}", report.work_items);
    if !report.warnings.is_empty() {
        println!("  warnings:     {}", report.warnings.len());
    }

    Ok(report)
}

/// Print stored watermarks and row counts for `pulse status`.
pub async fn run_status(config: &Config) -> Result<()> {
    let sqlite = db::connect(config).await?;
    crate::migrate::apply(&sqlite).await?;
    let change_store = CodeChangeStore::new(sqlite.clone());
    let item_store = WorkItemStore::new(sqlite.clone());

    println!("database: {}", config.db.path.display());
    println!("code changes: {}", change_store.count().await?);
    println!("work items:   {}", item_store.count().await?);

    let repo_marks = change_store.watermarks().await?;
    let project_marks = item_store.watermarks().await?;

    if repo_marks.is_empty() && project_marks.is_empty() {
        println!("no sync runs recorded yet");
    }
    for (repository, at) in repo_marks {
        println!("repository {:24} last synced {}", repository, at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    for (project, at) in project_marks {
        println!("project    {:24} last synced {}", project, at.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    sqlite.close().await;
    Ok(())
}

/// Print the resolved plan without touching the network. Watermark reads
/// are allowed; they are what makes the printed `since` values real.
async fn print_plan(
    config: &Config,
    teams: &[Team],
    gh_identities: &[String],
    jira_identities: &[String],
    opts: &SyncOptions,
    change_store: &CodeChangeStore,
    item_store: &WorkItemStore,
) -> Result<()> {
    println!("sync plan (dry-run)");
    println!(
        "  teams: {}",
        teams.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
    );

    for repo in &config.github.repositories {
        let since = match opts.since {
            Some(t) => SinceSource::Override(t),
            None => match change_store.last_sync(repo).await? {
                Some(t) => SinceSource::Watermark(t),
                None => SinceSource::FullHistory,
            },
        };
        println!("  repository {}/{}", config.github.organization, repo);
        println!("    since: {}", since);
        println!("    identities: {}", gh_identities.join(", "));
    }

    for project in &config.jira.projects {
        let since = match opts.since {
            Some(t) => SinceSource::Override(t),
            None => match item_store.last_sync(project).await? {
                Some(t) => SinceSource::Watermark(t),
                None => SinceSource::FullHistory,
            },
        };
        println!("  project {}", project);
        println!("    since: {}", since);
        println!("    identities: {}", jira_identities.join(", "));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DbConfig, GithubConfig, JiraConfig, SyncConfig};
    use crate::connector::{ConnectorError, Pacing};
    use crate::models::ChangeState;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn test_config(dir: &tempfile::TempDir) -> Config {
        Config {
            db: DbConfig {
                path: dir.path().join("pulse.sqlite"),
            },
            github: GithubConfig {
                organization: "acme".to_string(),
                repositories: vec!["platform".to_string(), "mobile-app".to_string()],
            },
            jira: JiraConfig {
                url: "https://acme.atlassian.net".to_string(),
                projects: vec!["PLAT".to_string()],
            },
            sync: SyncConfig::default(),
            teams: vec![Team {
                name: "Backend Team".to_string(),
                members: vec![
                    crate::config::Member {
                        name: "Ada".to_string(),
                        email: String::new(),
                        github_username: "ada".to_string(),
                        jira_username: "ada@acme.dev".to_string(),
                    },
                    crate::config::Member {
                        name: "Lin".to_string(),
                        email: String::new(),
                        github_username: "lin-dev".to_string(),
                        jira_username: String::new(),
                    },
                ],
            }],
        }
    }

    fn sample_change(external_id: i64, repo: &str, author: &str) -> CodeChange {
        CodeChange {
            id: None,
            external_id,
            repository: repo.to_string(),
            title: format!("change {}", external_id),
            description: String::new(),
            author: author.to_string(),
            created_at: Utc::now(),
            merged_at: None,
            lines_added: 1,
            lines_deleted: 1,
            comments_count: 0,
            commits_count: 1,
            state: ChangeState::Open,
        }
    }

    fn sample_item(key: &str, project: &str, assignee: &str) -> WorkItem {
        WorkItem {
            id: None,
            external_key: key.to_string(),
            project: project.to_string(),
            title: key.to_string(),
            description: String::new(),
            status: "Open".to_string(),
            priority: String::new(),
            assignee: assignee.to_string(),
            reporter: String::new(),
            item_type: "Task".to_string(),
            labels: Vec::new(),
            story_points: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// In-memory platform double: canned records per (scope, identity),
    /// scripted access/fetch failures, and a log of every fetch call.
    struct MockPlatform<R> {
        records: Mutex<Vec<(String, String, Vec<R>)>>,
        deny_scopes: HashSet<String>,
        fail_identities: HashSet<String>,
        calls: Mutex<Vec<(String, String, Option<DateTime<Utc>>)>>,
    }

    impl<R> MockPlatform<R> {
        fn new() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                deny_scopes: HashSet::new(),
                fail_identities: HashSet::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_records(self, scope: &str, identity: &str, records: Vec<R>) -> Self {
            self.records
                .lock()
                .unwrap()
                .push((scope.to_string(), identity.to_string(), records));
            self
        }

        fn deny(mut self, scope: &str) -> Self {
            self.deny_scopes.insert(scope.to_string());
            self
        }

        fn fail_identity(mut self, identity: &str) -> Self {
            self.fail_identities.insert(identity.to_string());
            self
        }

        fn calls(&self) -> Vec<(String, String, Option<DateTime<Utc>>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<R: Clone + Send + Sync + 'static> Connector for MockPlatform<R> {
        type Record = R;

        fn platform(&self) -> &'static str {
            "mock"
        }

        fn pacing(&self) -> Pacing {
            Pacing::from_millis(0, 0)
        }

        async fn validate_access(&self, scope: &str) -> Result<(), ConnectorError> {
            if self.deny_scopes.contains(scope) {
                return Err(ConnectorError::AccessDenied {
                    scope: scope.to_string(),
                    message: "denied by test".to_string(),
                });
            }
            Ok(())
        }

        async fn fetch_for_identity(
            &self,
            scope: &str,
            identity: &str,
            since: Option<DateTime<Utc>>,
        ) -> Result<Vec<R>, ConnectorError> {
            self.calls
                .lock()
                .unwrap()
                .push((scope.to_string(), identity.to_string(), since));

            if self.fail_identities.contains(identity) {
                return Err(ConnectorError::Api {
                    platform: "mock",
                    status: 500,
                    message: "scripted failure".to_string(),
                });
            }

            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, i, _)| s == scope && i == identity)
                .flat_map(|(_, _, records)| records.clone())
                .collect())
        }
    }

    type MockGithub = MockPlatform<CodeChange>;
    type MockJira = MockPlatform<WorkItem>;

    #[test]
    fn team_filter_is_case_insensitive_exact_match() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);

        assert_eq!(filter_teams(&config.teams, None).len(), 1);
        assert_eq!(filter_teams(&config.teams, Some("backend team")).len(), 1);
        assert_eq!(filter_teams(&config.teams, Some("Backend")).len(), 0);
    }

    #[tokio::test]
    async fn persists_records_and_counts_them() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let pool = WorkerPool::new(2);

        let github = Arc::new(
            MockGithub::new()
                .with_records("platform", "ada", vec![sample_change(1, "platform", "ada")])
                .with_records("platform", "lin-dev", vec![sample_change(2, "platform", "lin")]),
        );
        let jira = Arc::new(
            MockJira::new().with_records("PLAT", "ada@acme.dev", vec![sample_item("PLAT-1", "PLAT", "ada")]),
        );

        let report = run_sync(&config, Some(github), Some(jira), &pool, &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(report.code_changes, 2);
        assert_eq!(report.work_items, 1);
        // Lin has no jira identity, reported as a warning, not an error
        assert!(report.warnings.iter().any(|w| w.contains("no jira identity")));
    }

    #[tokio::test]
    async fn run_is_idempotent_against_unchanged_upstream() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.github.repositories = vec!["platform".to_string()];
        config.jira.projects.clear();
        let pool = WorkerPool::new(2);

        for _ in 0..2 {
            let github = Arc::new(MockGithub::new().with_records(
                "platform",
                "ada",
                vec![sample_change(1, "platform", "ada")],
            ));
            // Override the watermark so the second run fetches the same window
            let opts = SyncOptions {
                since: Some(Utc::now() - chrono::Duration::days(1)),
                ..Default::default()
            };
            run_sync(&config, Some(github), None::<Arc<MockJira>>, &pool, &opts)
                .await
                .unwrap();
        }

        let sqlite = db::connect(&config).await.unwrap();
        let rows = CodeChangeStore::new(sqlite).by_repository("platform").await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn access_failure_on_one_scope_does_not_abort_the_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let pool = WorkerPool::new(2);

        let github = Arc::new(
            MockGithub::new()
                .deny("platform")
                .with_records("mobile-app", "ada", vec![sample_change(9, "mobile-app", "ada")]),
        );

        let report = run_sync(
            &config,
            Some(github),
            None::<Arc<MockJira>>,
            &pool,
            &SyncOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.code_changes, 1);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("cannot access repository platform")));

        // The denied scope never gets a watermark
        let sqlite = db::connect(&config).await.unwrap();
        let store = CodeChangeStore::new(sqlite);
        assert!(store.last_sync("platform").await.unwrap().is_none());
        assert!(store.last_sync("mobile-app").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn explicit_since_wins_over_stored_watermark() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.github.repositories = vec!["platform".to_string()];
        config.jira.projects.clear();
        let pool = WorkerPool::new(2);

        // Seed a watermark newer than the override
        let sqlite = db::connect(&config).await.unwrap();
        crate::migrate::apply(&sqlite).await.unwrap();
        let watermark = "2024-02-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        CodeChangeStore::new(sqlite.clone())
            .set_last_sync("platform", watermark)
            .await
            .unwrap();
        sqlite.close().await;

        let github = Arc::new(MockGithub::new());
        let override_since = "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let opts = SyncOptions {
            since: Some(override_since),
            ..Default::default()
        };
        run_sync(&config, Some(github.clone()), None::<Arc<MockJira>>, &pool, &opts)
            .await
            .unwrap();

        let calls = github.calls();
        assert!(!calls.is_empty());
        assert!(calls.iter().all(|(_, _, since)| *since == Some(override_since)));
    }

    #[tokio::test]
    async fn stored_watermark_used_when_no_override() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.github.repositories = vec!["platform".to_string()];
        config.jira.projects.clear();
        let pool = WorkerPool::new(2);

        let sqlite = db::connect(&config).await.unwrap();
        crate::migrate::apply(&sqlite).await.unwrap();
        let watermark = "2024-02-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        CodeChangeStore::new(sqlite.clone())
            .set_last_sync("platform", watermark)
            .await
            .unwrap();
        sqlite.close().await;

        let github = Arc::new(MockGithub::new());
        run_sync(
            &config,
            Some(github.clone()),
            None::<Arc<MockJira>>,
            &pool,
            &SyncOptions::default(),
        )
        .await
        .unwrap();

        let calls = github.calls();
        assert!(calls.iter().all(|(_, _, since)| *since == Some(watermark)));
    }

    #[tokio::test]
    async fn watermark_advances_despite_identity_failure_by_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.github.repositories = vec!["platform".to_string()];
        config.jira.projects.clear();
        let pool = WorkerPool::new(2);

        let github = Arc::new(
            MockGithub::new()
                .fail_identity("ada")
                .with_records("platform", "lin-dev", vec![sample_change(3, "platform", "lin")]),
        );

        let report = run_sync(
            &config,
            Some(github),
            None::<Arc<MockJira>>,
            &pool,
            &SyncOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.code_changes, 1);
        assert!(report.warnings.iter().any(|w| w.contains("fetch failed for ada")));

        let sqlite = db::connect(&config).await.unwrap();
        assert!(CodeChangeStore::new(sqlite)
            .last_sync("platform")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn on_full_success_policy_holds_watermark_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.github.repositories = vec!["platform".to_string()];
        config.jira.projects.clear();
        config.sync.watermark_policy = WatermarkPolicy::OnFullSuccess;
        let pool = WorkerPool::new(2);

        let github = Arc::new(MockGithub::new().fail_identity("ada"));
        let report = run_sync(
            &config,
            Some(github),
            None::<Arc<MockJira>>,
            &pool,
            &SyncOptions::default(),
        )
        .await
        .unwrap();

        assert!(report.warnings.iter().any(|w| w.contains("held back")));

        let sqlite = db::connect(&config).await.unwrap();
        assert!(CodeChangeStore::new(sqlite)
            .last_sync("platform")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn dry_run_fetches_nothing_and_writes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let pool = WorkerPool::new(2);

        let github = Arc::new(MockGithub::new().with_records(
            "platform",
            "ada",
            vec![sample_change(1, "platform", "ada")],
        ));
        let jira = Arc::new(MockJira::new());

        let opts = SyncOptions {
            dry_run: true,
            ..Default::default()
        };
        let report = run_sync(&config, Some(github.clone()), Some(jira.clone()), &pool, &opts)
            .await
            .unwrap();

        assert_eq!(report.code_changes, 0);
        assert!(github.calls().is_empty());
        assert!(jira.calls().is_empty());

        let sqlite = db::connect(&config).await.unwrap();
        let store = CodeChangeStore::new(sqlite.clone());
        assert!(store.by_repository("platform").await.unwrap().is_empty());
        assert!(store.last_sync("platform").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_team_filter_is_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = test_config(&dir);
        let pool = WorkerPool::new(2);

        let opts = SyncOptions {
            team: Some("Ghost Team".to_string()),
            ..Default::default()
        };
        let err = run_sync(
            &config,
            None::<Arc<MockGithub>>,
            None::<Arc<MockJira>>,
            &pool,
            &opts,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("no teams found"));
    }
}
