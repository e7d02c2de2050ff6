use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub jira: JiraConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub teams: Vec<Team>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GithubConfig {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub repositories: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct JiraConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub projects: Vec<String>,
}

/// Tuning knobs for the sync engine. Everything has a default so the whole
/// table can be omitted.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Worker pool capacity; defaults to available parallelism.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Delay between consecutive page requests for one identity.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Delay between identities when fetching sequentially.
    #[serde(default = "default_identity_delay_ms")]
    pub identity_delay_ms: u64,
    #[serde(default)]
    pub watermark_policy: WatermarkPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: None,
            page_delay_ms: default_page_delay_ms(),
            identity_delay_ms: default_identity_delay_ms(),
            watermark_policy: WatermarkPolicy::default(),
        }
    }
}

fn default_page_delay_ms() -> u64 {
    100
}
fn default_identity_delay_ms() -> u64 {
    200
}

/// When a scope's watermark may advance after its identity fetches finish.
///
/// `Always` matches the historical behavior: the watermark moves even when
/// some identities failed, so a later run will not re-fetch their window.
/// `OnFullSuccess` holds the watermark back until every identity succeeds.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPolicy {
    #[default]
    Always,
    OnFullSuccess,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Team {
    pub name: String,
    #[serde(default)]
    pub members: Vec<Member>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Member {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub github_username: String,
    #[serde(default)]
    pub jira_username: String,
}

impl SyncConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    if !config.github.repositories.is_empty() && config.github.organization.is_empty() {
        anyhow::bail!("github.organization is required when repositories are configured");
    }

    if !config.jira.projects.is_empty() && config.jira.url.is_empty() {
        anyhow::bail!("jira.url is required when projects are configured");
    }

    for team in &config.teams {
        if team.name.trim().is_empty() {
            anyhow::bail!("team names must not be empty");
        }
    }

    Ok(config)
}
