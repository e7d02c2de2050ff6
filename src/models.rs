//! Core domain types shared by the connectors, the stores, and the sync
//! orchestrator.
//!
//! Records are upstream snapshots: each sync pass replaces the local row
//! wholesale, so nothing here carries local-only state beyond the row id.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`CodeChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeState {
    Open,
    Closed,
    Merged,
}

impl ChangeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeState::Open => "open",
            ChangeState::Closed => "closed",
            ChangeState::Merged => "merged",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "merged" => ChangeState::Merged,
            "closed" => ChangeState::Closed,
            _ => ChangeState::Open,
        }
    }
}

/// One code-review unit (a pull request) normalized from the code-hosting
/// platform.
///
/// Invariant: `state == Merged` implies `merged_at.is_some()` — the GitHub
/// mapper only promotes `closed` to `merged` when a merge timestamp exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChange {
    /// Local row id; `None` until persisted.
    pub id: Option<i64>,
    /// Upstream identifier (PR number).
    pub external_id: i64,
    pub repository: String,
    pub title: String,
    pub description: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub lines_added: i64,
    pub lines_deleted: i64,
    pub comments_count: i64,
    pub commits_count: i64,
    pub state: ChangeState,
}

impl CodeChange {
    /// Time from creation to merge. `None` for anything not yet merged.
    pub fn cycle_time(&self) -> Option<Duration> {
        self.merged_at.map(|merged| merged - self.created_at)
    }

    /// Total churn: lines added plus lines deleted.
    pub fn size(&self) -> i64 {
        self.lines_added + self.lines_deleted
    }

    pub fn is_merged(&self) -> bool {
        self.state == ChangeState::Merged
    }
}

/// Statuses treated as "done" regardless of whether the tracker supplied an
/// explicit resolution timestamp.
const RESOLVED_STATUSES: [&str; 5] = ["done", "closed", "resolved", "complete", "completed"];

/// Returns true if `status` belongs to the resolved-status vocabulary
/// (case-insensitive).
pub fn is_resolved_status(status: &str) -> bool {
    let lower = status.to_lowercase();
    RESOLVED_STATUSES.iter().any(|s| *s == lower)
}

/// One tracked issue normalized from the issue-tracking platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Local row id; `None` until persisted.
    pub id: Option<i64>,
    /// Upstream key (e.g. `PLAT-123`).
    pub external_key: String,
    pub project: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub assignee: String,
    pub reporter: String,
    pub item_type: String,
    pub labels: Vec<String>,
    pub story_points: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    /// Time from creation to resolution. `None` while unresolved.
    pub fn cycle_time(&self) -> Option<Duration> {
        self.resolved_at.map(|resolved| resolved - self.created_at)
    }

    pub fn is_resolved(&self) -> bool {
        is_resolved_status(&self.status)
    }

    /// Whole days from creation until resolution, or until now for items
    /// still in flight.
    pub fn days_in_progress(&self) -> i64 {
        let end = self.resolved_at.unwrap_or_else(Utc::now);
        (end - self.created_at).num_days()
    }
}
