//! Tiered freshness cache for the job-list snapshots.
//!
//! Each list category has its own staleness window tuned to how fast it
//! changes: the active list churns constantly, the older list barely moves.
//! Expiry is checked lazily on read, so a category nobody is watching is
//! never refreshed. Concurrent readers of a stale category may each trigger
//! an upstream fetch; the fetch is idempotent and the last write wins.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::api::DeadlineError;

/// Freshness window for the active-jobs list.
pub const ACTIVE_WINDOW: Duration = Duration::from_secs(3);
/// Freshness window for the recent-jobs list.
pub const RECENT_WINDOW: Duration = Duration::from_secs(60);
/// Freshness window for the older-jobs list.
pub const OLDER_WINDOW: Duration = Duration::from_secs(3600);

/// Maximum start-date age for the recent list: 48 hours.
pub const RECENT_AGE_MAX_SECS: i64 = 172_800;
/// Maximum start-date age for the older list: 483840 s (~5.6 days).
/// Intentionally kept at this value; see DESIGN.md before "fixing" it.
pub const OLDER_AGE_MAX_SECS: i64 = 483_840;

/// The three cached job-list categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobListKind {
    Active,
    Recent,
    Older,
}

impl JobListKind {
    /// Wire name, doubling as the session's `last_sent` key.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobListKind::Active => "active_jobs",
            JobListKind::Recent => "recent_jobs",
            JobListKind::Older => "older_jobs",
        }
    }

    /// How long a cached snapshot of this category stays fresh.
    pub fn window(&self) -> Duration {
        match self {
            JobListKind::Active => ACTIVE_WINDOW,
            JobListKind::Recent => RECENT_WINDOW,
            JobListKind::Older => OLDER_WINDOW,
        }
    }
}

impl std::fmt::Display for JobListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetches and normalizes a fresh snapshot for one list category.
///
/// Implemented by the upstream client; test doubles count invocations.
#[async_trait]
pub trait FreshFetch: Send + Sync {
    async fn fetch_fresh(&self, kind: JobListKind) -> Result<Map<String, Value>, DeadlineError>;
}

/// One category's cached snapshot.
struct CacheEntry {
    /// `None` until the first successful fetch.
    last_refresh: Option<Instant>,
    snapshot: Map<String, Value>,
}

impl CacheEntry {
    fn new() -> Self {
        Self {
            last_refresh: None,
            snapshot: Map::new(),
        }
    }

    fn is_fresh(&self, window: Duration) -> bool {
        match self.last_refresh {
            Some(at) => at.elapsed() <= window,
            None => false,
        }
    }
}

/// Category-keyed snapshot cache with independent staleness windows.
pub struct JobsCache<F> {
    fetcher: F,
    active: Mutex<CacheEntry>,
    recent: Mutex<CacheEntry>,
    older: Mutex<CacheEntry>,
}

impl<F: FreshFetch> JobsCache<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            active: Mutex::new(CacheEntry::new()),
            recent: Mutex::new(CacheEntry::new()),
            older: Mutex::new(CacheEntry::new()),
        }
    }

    fn entry(&self, kind: JobListKind) -> &Mutex<CacheEntry> {
        match kind {
            JobListKind::Active => &self.active,
            JobListKind::Recent => &self.recent,
            JobListKind::Older => &self.older,
        }
    }

    /// Read a category snapshot, refreshing it first when stale.
    ///
    /// The lock is not held across the upstream fetch, so two sessions
    /// hitting the same stale category can both fetch; that duplication is
    /// accepted in exchange for never blocking one session on another's
    /// slow upstream call.
    pub async fn read(&self, kind: JobListKind) -> Result<Map<String, Value>, DeadlineError> {
        {
            let entry = self.entry(kind).lock().await;
            if entry.is_fresh(kind.window()) {
                return Ok(entry.snapshot.clone());
            }
        }

        let fresh = self.fetcher.fetch_fresh(kind).await?;

        let mut entry = self.entry(kind).lock().await;
        entry.snapshot = fresh.clone();
        entry.last_refresh = Some(Instant::now());
        Ok(fresh)
    }

    /// Fetch all three categories once at startup so the first viewer of
    /// each list gets an instant response.
    pub async fn prewarm(&self) -> Result<(), DeadlineError> {
        for kind in [JobListKind::Active, JobListKind::Recent, JobListKind::Older] {
            let snapshot = self.read(kind).await?;
            tracing::info!(category = %kind, jobs = snapshot.len(), "Prefetched job list");
        }
        Ok(())
    }
}
