//! # TeamPulse CLI (`pulse`)
//!
//! The `pulse` binary syncs pull requests and work items for your configured
//! teams from GitHub and Jira into a local SQLite database.
//!
//! ## Usage
//!
//! ```bash
//! pulse --config ./pulse.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pulse init` | Create the SQLite database and run schema migrations |
//! | `pulse sync` | Sync all configured teams, incrementally from watermarks |
//! | `pulse sync --team <name>` | Sync a single team |
//! | `pulse sync --since 2024-01-01` | Override the lower bound for this run |
//! | `pulse sync --dry-run` | Print the resolved plan without fetching |
//! | `pulse status` | Show row counts and per-scope watermarks |
//!
//! ## Credentials
//!
//! Credentials are read from the environment, never from the config file:
//! `GITHUB_TOKEN` when repositories are configured, `JIRA_USERNAME` and
//! `JIRA_API_TOKEN` when projects are configured. A dry run needs neither.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use teampulse::config::{self, Config};
use teampulse::connector::Pacing;
use teampulse::github::GithubConnector;
use teampulse::jira::JiraConnector;
use teampulse::migrate;
use teampulse::pool::WorkerPool;
use teampulse::sync::{self, SyncOptions};

/// TeamPulse — sync GitHub pull requests and Jira work items for your teams
/// into a local SQLite database.
#[derive(Parser)]
#[command(
    name = "pulse",
    about = "Sync GitHub pull requests and Jira work items into a local SQLite database",
    version,
    long_about = "TeamPulse pulls engineering activity for the teams defined in your config \
    file from GitHub and Jira, normalizes it, and upserts it into SQLite. Runs are incremental: \
    each repository and project remembers when it was last synced and only newer records are \
    fetched on the next run."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./pulse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. Running it
    /// again is safe and changes nothing.
    Init,

    /// Sync configured teams from GitHub and Jira.
    ///
    /// Every configured repository and project is processed once per run,
    /// with the union of the selected teams' identities. Scopes that cannot
    /// be accessed are skipped with a warning rather than aborting the run.
    Sync {
        /// Only fetch records created on or after this date (YYYY-MM-DD).
        /// Overrides any stored watermark for this run.
        #[arg(long)]
        since: Option<String>,

        /// Sync a single team, matched by name (case-insensitive).
        #[arg(long)]
        team: Option<String>,

        /// Resolve and print the sync plan without fetching or writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show row counts and per-scope watermarks.
    Status,
}

fn parse_since(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid --since date '{}', expected YYYY-MM-DD", raw))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("invalid --since date")?;
    Ok(midnight.and_utc())
}

fn require_env(name: &str, reason: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .with_context(|| format!("{} must be set: {}", name, reason))
}

fn github_connector(config: &Config, pacing: Pacing) -> anyhow::Result<Option<Arc<GithubConnector>>> {
    if config.github.repositories.is_empty() {
        return Ok(None);
    }
    let token = require_env("GITHUB_TOKEN", "repositories are configured")?;
    let connector = GithubConnector::new(token, config.github.organization.clone(), pacing)?;
    Ok(Some(Arc::new(connector)))
}

fn jira_connector(config: &Config, pacing: Pacing) -> anyhow::Result<Option<Arc<JiraConnector>>> {
    if config.jira.projects.is_empty() {
        return Ok(None);
    }
    let username = require_env("JIRA_USERNAME", "projects are configured")?;
    let api_token = require_env("JIRA_API_TOKEN", "projects are configured")?;
    let connector = JiraConnector::new(config.jira.url.clone(), username, api_token, pacing)?;
    Ok(Some(Arc::new(connector)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Sync {
            since,
            team,
            dry_run,
        } => {
            let opts = SyncOptions {
                team,
                since: since.as_deref().map(parse_since).transpose()?,
                dry_run,
            };

            let pacing = Pacing::from_millis(cfg.sync.page_delay_ms, cfg.sync.identity_delay_ms);
            let pool = WorkerPool::new(cfg.sync.worker_count());

            // A dry run resolves the plan from config and the database alone,
            // so it must not demand credentials.
            let (github, jira) = if dry_run {
                (None, None)
            } else {
                (github_connector(&cfg, pacing)?, jira_connector(&cfg, pacing)?)
            };

            sync::run_sync(&cfg, github, jira, &pool, &opts).await?;
        }
        Commands::Status => {
            sync::run_status(&cfg).await?;
        }
    }

    Ok(())
}
