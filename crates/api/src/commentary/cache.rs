//! Process-wide cache of generated commentary.
//!
//! Keyed by (job id, status category). Written once per pair and never
//! invalidated: a job revisiting a category replays the stored text
//! instead of paying for another generation. Concurrent generations for
//! the same pair are not deduplicated; the last writer wins.

use std::collections::HashMap;

use tokio::sync::Mutex;

use farmview_core::status::JobStatus;

/// (job, category) → generated narrative text.
#[derive(Default)]
pub struct CommentaryCache {
    inner: Mutex<HashMap<String, HashMap<JobStatus, String>>>,
}

impl CommentaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Previously generated text for this job and category, if any.
    pub async fn get(&self, job_id: &str, status: JobStatus) -> Option<String> {
        self.inner
            .lock()
            .await
            .get(job_id)
            .and_then(|per_job| per_job.get(&status))
            .cloned()
    }

    /// Store generated text for this job and category.
    pub async fn put(&self, job_id: &str, status: JobStatus, text: String) {
        self.inner
            .lock()
            .await
            .entry(job_id.to_string())
            .or_default()
            .insert(status, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_returns_text_per_category() {
        let cache = CommentaryCache::new();
        cache
            .put("job-1", JobStatus::RunningWarnings, "warned".to_string())
            .await;

        assert_eq!(
            cache.get("job-1", JobStatus::RunningWarnings).await,
            Some("warned".to_string())
        );
        // A different category for the same job is a distinct key.
        assert_eq!(cache.get("job-1", JobStatus::RunningFails).await, None);
        assert_eq!(cache.get("job-2", JobStatus::RunningWarnings).await, None);
    }

    #[tokio::test]
    async fn later_writes_replace_earlier_ones() {
        let cache = CommentaryCache::new();
        cache
            .put("job-1", JobStatus::FinishedFailed, "first".to_string())
            .await;
        cache
            .put("job-1", JobStatus::FinishedFailed, "second".to_string())
            .await;

        assert_eq!(
            cache.get("job-1", JobStatus::FinishedFailed).await,
            Some("second".to_string())
        );
    }
}
