//! The upstream connector seam.
//!
//! Both platform clients implement [`Connector`]: a lightweight access probe
//! plus a paginated, identity-filtered fetch that normalizes raw API payloads
//! into the domain model. Connectors never touch local state; persistence and
//! watermarks belong to the orchestrator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Records fetched per page; a short page ends the pagination loop.
pub const PAGE_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{platform} API error (HTTP {status}): {message}")]
    Api {
        platform: &'static str,
        status: u16,
        message: String,
    },

    #[error("cannot access {scope}: {message}")]
    AccessDenied { scope: String, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ConnectorError {
    /// True for failures that mean the whole scope is unreachable rather
    /// than one request going wrong.
    pub fn is_access(&self) -> bool {
        matches!(self, Self::AccessDenied { .. } | Self::Auth(_))
    }
}

/// Static pacing between upstream requests. Deliberately non-adaptive: it
/// does not read rate-limit response headers, it just spaces requests out.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Sleep between consecutive page requests for one identity.
    pub page_delay: Duration,
    /// Sleep between identities in a sequential fetch.
    pub identity_delay: Duration,
}

impl Pacing {
    pub fn from_millis(page_ms: u64, identity_ms: u64) -> Self {
        Self {
            page_delay: Duration::from_millis(page_ms),
            identity_delay: Duration::from_millis(identity_ms),
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::from_millis(100, 200)
    }
}

/// A platform client that fetches activity records for one scope
/// (repository or project) filtered to a set of identities.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Normalized record type produced by this platform.
    type Record: Send + 'static;

    /// Platform label used in logs and warnings (e.g. `"github"`).
    fn platform(&self) -> &'static str;

    fn pacing(&self) -> Pacing;

    /// Existence/permission probe, run before any bulk fetch.
    async fn validate_access(&self, scope: &str) -> Result<(), ConnectorError>;

    /// Fetch all records authored by / assigned to one identity within the
    /// scope, paginating until a page comes back short. A failed page aborts
    /// the fetch and discards anything already accumulated for the identity.
    async fn fetch_for_identity(
        &self,
        scope: &str,
        identity: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Self::Record>, ConnectorError>;

    /// Sequential fetch across identities with inter-identity pacing. The
    /// first failing identity aborts the whole call; callers wanting
    /// per-identity isolation (the orchestrator does) dispatch
    /// [`fetch_for_identity`](Connector::fetch_for_identity) tasks instead.
    async fn fetch_for_identities(
        &self,
        scope: &str,
        identities: &[String],
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Self::Record>, ConnectorError> {
        let mut all = Vec::new();
        for (i, identity) in identities.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing().identity_delay).await;
            }
            all.extend(self.fetch_for_identity(scope, identity, since).await?);
        }
        Ok(all)
    }
}
