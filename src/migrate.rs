use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the schema on an already-open pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Code changes, one row per pull request per repository
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS code_changes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id INTEGER NOT NULL,
            repository TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            author TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            merged_at INTEGER,
            lines_added INTEGER NOT NULL DEFAULT 0,
            lines_deleted INTEGER NOT NULL DEFAULT 0,
            comments_count INTEGER NOT NULL DEFAULT 0,
            commits_count INTEGER NOT NULL DEFAULT 0,
            state TEXT NOT NULL,
            UNIQUE(external_id, repository)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Work items, one row per issue key per project
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_key TEXT NOT NULL,
            project TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL,
            priority TEXT,
            assignee TEXT,
            reporter TEXT,
            item_type TEXT,
            labels TEXT,
            story_points INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            resolved_at INTEGER,
            UNIQUE(external_key, project)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Per-repository watermarks
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repo_sync_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            repository TEXT NOT NULL,
            last_sync_at INTEGER NOT NULL,
            UNIQUE(repository)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Per-project watermarks
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_sync_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project TEXT NOT NULL,
            last_sync_at INTEGER NOT NULL,
            UNIQUE(project)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes for the reporting queries
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_code_changes_author ON code_changes(author)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_code_changes_created_at ON code_changes(created_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_work_items_assignee ON work_items(assignee)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_work_items_created_at ON work_items(created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
