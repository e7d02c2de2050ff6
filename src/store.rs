//! SQLite-backed record stores and watermark stores.
//!
//! Upserts key on the natural external identifier plus scope and replace
//! every mutable column, so a local row always mirrors the most recently
//! synced upstream snapshot. Watermarks record the last successful sync per
//! scope and are written only by the orchestrator.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{ChangeState, CodeChange, WorkItem};

fn to_datetime(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

/// Store for [`CodeChange`] records and per-repository watermarks.
#[derive(Clone)]
pub struct CodeChangeStore {
    pool: SqlitePool,
}

impl CodeChangeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or fully replace a record, keyed on (external_id, repository).
    pub async fn upsert(&self, change: &CodeChange) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO code_changes
                (external_id, repository, title, description, author, created_at, merged_at,
                 lines_added, lines_deleted, comments_count, commits_count, state)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id, repository) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                author = excluded.author,
                created_at = excluded.created_at,
                merged_at = excluded.merged_at,
                lines_added = excluded.lines_added,
                lines_deleted = excluded.lines_deleted,
                comments_count = excluded.comments_count,
                commits_count = excluded.commits_count,
                state = excluded.state
            "#,
        )
        .bind(change.external_id)
        .bind(&change.repository)
        .bind(&change.title)
        .bind(&change.description)
        .bind(&change.author)
        .bind(change.created_at.timestamp())
        .bind(change.merged_at.map(|t| t.timestamp()))
        .bind(change.lines_added)
        .bind(change.lines_deleted)
        .bind(change.comments_count)
        .bind(change.commits_count)
        .bind(change.state.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn by_author(&self, author: &str) -> Result<Vec<CodeChange>> {
        let rows = sqlx::query(
            "SELECT * FROM code_changes WHERE author = ? ORDER BY created_at DESC",
        )
        .bind(author)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(scan_code_change).collect()
    }

    pub async fn by_repository(&self, repository: &str) -> Result<Vec<CodeChange>> {
        let rows = sqlx::query(
            "SELECT * FROM code_changes WHERE repository = ? ORDER BY created_at DESC",
        )
        .bind(repository)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(scan_code_change).collect()
    }

    pub async fn by_date_range(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CodeChange>> {
        let rows = sqlx::query(
            "SELECT * FROM code_changes WHERE created_at >= ? AND created_at <= ? \
             ORDER BY created_at DESC",
        )
        .bind(since.timestamp())
        .bind(until.timestamp())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(scan_code_change).collect()
    }

    pub async fn last_sync(&self, repository: &str) -> Result<Option<DateTime<Utc>>> {
        let secs: Option<i64> =
            sqlx::query_scalar("SELECT last_sync_at FROM repo_sync_runs WHERE repository = ?")
                .bind(repository)
                .fetch_optional(&self.pool)
                .await?;

        Ok(secs.map(to_datetime))
    }

    pub async fn set_last_sync(&self, repository: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO repo_sync_runs (repository, last_sync_at) VALUES (?, ?)
            ON CONFLICT(repository) DO UPDATE SET last_sync_at = excluded.last_sync_at
            "#,
        )
        .bind(repository)
        .bind(at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All stored repository watermarks, for `pulse status`.
    pub async fn watermarks(&self) -> Result<Vec<(String, DateTime<Utc>)>> {
        let rows = sqlx::query(
            "SELECT repository, last_sync_at FROM repo_sync_runs ORDER BY repository",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get::<String, _>(0), to_datetime(row.get::<i64, _>(1))))
            .collect())
    }

    pub async fn count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM code_changes")
            .fetch_one(&self.pool)
            .await?)
    }
}

fn scan_code_change(row: &SqliteRow) -> Result<CodeChange> {
    Ok(CodeChange {
        id: Some(row.try_get("id")?),
        external_id: row.try_get("external_id")?,
        repository: row.try_get("repository")?,
        title: row.try_get("title")?,
        description: row.try_get::<Option<String>, _>("description")?.unwrap_or_default(),
        author: row.try_get("author")?,
        created_at: to_datetime(row.try_get("created_at")?),
        merged_at: row.try_get::<Option<i64>, _>("merged_at")?.map(to_datetime),
        lines_added: row.try_get("lines_added")?,
        lines_deleted: row.try_get("lines_deleted")?,
        comments_count: row.try_get("comments_count")?,
        commits_count: row.try_get("commits_count")?,
        state: ChangeState::parse(row.try_get::<String, _>("state")?.as_str()),
    })
}

/// Store for [`WorkItem`] records and per-project watermarks.
#[derive(Clone)]
pub struct WorkItemStore {
    pool: SqlitePool,
}

impl WorkItemStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or fully replace a record, keyed on (external_key, project).
    pub async fn upsert(&self, item: &WorkItem) -> Result<()> {
        // Labels are stored comma-joined; none of the trackers we sync from
        // allow commas inside a label.
        let labels = item.labels.join(",");

        sqlx::query(
            r#"
            INSERT INTO work_items
                (external_key, project, title, description, status, priority, assignee,
                 reporter, item_type, labels, story_points, created_at, updated_at, resolved_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_key, project) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                status = excluded.status,
                priority = excluded.priority,
                assignee = excluded.assignee,
                reporter = excluded.reporter,
                item_type = excluded.item_type,
                labels = excluded.labels,
                story_points = excluded.story_points,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                resolved_at = excluded.resolved_at
            "#,
        )
        .bind(&item.external_key)
        .bind(&item.project)
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.status)
        .bind(&item.priority)
        .bind(&item.assignee)
        .bind(&item.reporter)
        .bind(&item.item_type)
        .bind(labels)
        .bind(item.story_points)
        .bind(item.created_at.timestamp())
        .bind(item.updated_at.timestamp())
        .bind(item.resolved_at.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn by_assignee(&self, assignee: &str) -> Result<Vec<WorkItem>> {
        let rows =
            sqlx::query("SELECT * FROM work_items WHERE assignee = ? ORDER BY created_at DESC")
                .bind(assignee)
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(scan_work_item).collect()
    }

    pub async fn by_project(&self, project: &str) -> Result<Vec<WorkItem>> {
        let rows =
            sqlx::query("SELECT * FROM work_items WHERE project = ? ORDER BY created_at DESC")
                .bind(project)
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(scan_work_item).collect()
    }

    pub async fn by_date_range(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<WorkItem>> {
        let rows = sqlx::query(
            "SELECT * FROM work_items WHERE created_at >= ? AND created_at <= ? \
             ORDER BY created_at DESC",
        )
        .bind(since.timestamp())
        .bind(until.timestamp())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(scan_work_item).collect()
    }

    pub async fn last_sync(&self, project: &str) -> Result<Option<DateTime<Utc>>> {
        let secs: Option<i64> =
            sqlx::query_scalar("SELECT last_sync_at FROM project_sync_runs WHERE project = ?")
                .bind(project)
                .fetch_optional(&self.pool)
                .await?;

        Ok(secs.map(to_datetime))
    }

    pub async fn set_last_sync(&self, project: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO project_sync_runs (project, last_sync_at) VALUES (?, ?)
            ON CONFLICT(project) DO UPDATE SET last_sync_at = excluded.last_sync_at
            "#,
        )
        .bind(project)
        .bind(at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All stored project watermarks, for `pulse status`.
    pub async fn watermarks(&self) -> Result<Vec<(String, DateTime<Utc>)>> {
        let rows =
            sqlx::query("SELECT project, last_sync_at FROM project_sync_runs ORDER BY project")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get::<String, _>(0), to_datetime(row.get::<i64, _>(1))))
            .collect())
    }

    pub async fn count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM work_items")
            .fetch_one(&self.pool)
            .await?)
    }
}

fn scan_work_item(row: &SqliteRow) -> Result<WorkItem> {
    let labels: Option<String> = row.try_get("labels")?;
    let labels = labels
        .filter(|s| !s.is_empty())
        .map(|s| s.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    Ok(WorkItem {
        id: Some(row.try_get("id")?),
        external_key: row.try_get("external_key")?,
        project: row.try_get("project")?,
        title: row.try_get("title")?,
        description: row.try_get::<Option<String>, _>("description")?.unwrap_or_default(),
        status: row.try_get("status")?,
        priority: row.try_get::<Option<String>, _>("priority")?.unwrap_or_default(),
        assignee: row.try_get::<Option<String>, _>("assignee")?.unwrap_or_default(),
        reporter: row.try_get::<Option<String>, _>("reporter")?.unwrap_or_default(),
        item_type: row.try_get::<Option<String>, _>("item_type")?.unwrap_or_default(),
        labels,
        story_points: row.try_get("story_points")?,
        created_at: to_datetime(row.try_get("created_at")?),
        updated_at: to_datetime(row.try_get("updated_at")?),
        resolved_at: row.try_get::<Option<i64>, _>("resolved_at")?.map(to_datetime),
    })
}
