//! # TeamPulse
//!
//! A local-first sync engine that pulls engineering activity from GitHub and
//! Jira into a SQLite database, one pull request and one work item at a time.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │ Connectors  │──▶│ Sync engine   │──▶│  SQLite  │
//! │ GitHub/Jira │   │ pool+watermark│   │ upserts  │
//! └─────────────┘   └──────────────┘   └──────────┘
//! ```
//!
//! Each configured repository and project is a *scope*. A run resolves the
//! team members to sync, fans one fetch task per (scope, identity) pair out
//! through a bounded worker pool, and upserts the normalized records so that
//! re-running a sync never duplicates data. Per-scope watermarks keep
//! subsequent runs incremental.
//!
//! ## Quick Start
//!
//! ```bash
//! pulse init                       # create database
//! pulse sync                       # sync all teams
//! pulse sync --team "Backend Team" # sync one team
//! pulse sync --since 2024-01-01    # explicit lower bound
//! pulse status                     # watermarks and row counts
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration: db path, platforms, teams, tuning |
//! | [`models`] | Domain records: [`models::CodeChange`], [`models::WorkItem`] |
//! | [`db`] | SQLite pool construction |
//! | [`migrate`] | Schema creation |
//! | [`store`] | Idempotent upserts, queries, watermarks |
//! | [`connector`] | The platform seam: [`connector::Connector`] |
//! | [`github`] | GitHub pull request connector |
//! | [`jira`] | Jira work item connector |
//! | [`pool`] | Bounded worker pool |
//! | [`sync`] | Run orchestration |

pub mod config;
pub mod connector;
pub mod db;
pub mod github;
pub mod jira;
pub mod migrate;
pub mod models;
pub mod pool;
pub mod store;
pub mod sync;
