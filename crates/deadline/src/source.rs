//! The farm data seam consumed by the WebSocket sessions.
//!
//! [`FarmSource`] abstracts over "where job data comes from" so session
//! logic can be exercised against an in-memory fake. [`DeadlineFarm`] is
//! the production implementation: the REST client behind the tiered
//! freshness cache for lists, uncached for per-job detail.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};

use farmview_core::status::LogKind;

use crate::api::{DeadlineApi, DeadlineError};
use crate::cache::{FreshFetch, JobListKind, JobsCache, OLDER_AGE_MAX_SECS, RECENT_AGE_MAX_SECS};
use crate::image_path::construct_image_path;
use crate::normalize::{build_snapshot, normalize_detail, normalize_tasks, JobDetailSnapshot};

/// Scheduler states counted as "inactive" for the recent/older lists.
const INACTIVE_STATES: &[&str] = &["Suspended", "Completed", "Failed", "Pending"];

/// Everything the session layer needs from the render farm.
#[async_trait]
pub trait FarmSource: Send + Sync {
    /// Current snapshot of a job-list category (served through the
    /// freshness cache).
    async fn list_snapshot(&self, kind: JobListKind) -> Result<Map<String, Value>, DeadlineError>;

    /// Fresh detail + task list for a single job. Always bypasses the
    /// cache: the detail page refreshes every second and needs live data.
    async fn job_snapshot(&self, job_id: &str) -> Result<JobDetailSnapshot, DeadlineError>;

    /// Contents of the first task report of the given kind, or `None` when
    /// the farm has no reports for that task.
    async fn task_log(
        &self,
        job_id: &str,
        task_id: i64,
        kind: LogKind,
    ) -> Result<Option<String>, DeadlineError>;

    /// On-disk path of the first output frame of a task.
    async fn task_image_path(&self, job_id: &str, task_id: i64)
        -> Result<PathBuf, DeadlineError>;
}

#[async_trait]
impl FreshFetch for DeadlineApi {
    async fn fetch_fresh(&self, kind: JobListKind) -> Result<Map<String, Value>, DeadlineError> {
        match kind {
            JobListKind::Active => {
                let jobs = self.jobs_in_states(&["Active"]).await?;
                Ok(build_snapshot(&jobs, |_| true))
            }
            JobListKind::Recent => {
                let jobs = self.jobs_in_states(INACTIVE_STATES).await?;
                let now = Utc::now().naive_utc();
                Ok(build_snapshot(&jobs, |started| {
                    started.is_some_and(|d| (now - d).num_seconds() < RECENT_AGE_MAX_SECS)
                }))
            }
            JobListKind::Older => {
                let jobs = self.jobs_in_states(INACTIVE_STATES).await?;
                let now = Utc::now().naive_utc();
                Ok(build_snapshot(&jobs, |started| {
                    started.is_some_and(|d| {
                        let age = (now - d).num_seconds();
                        age > RECENT_AGE_MAX_SECS && age < OLDER_AGE_MAX_SECS
                    })
                }))
            }
        }
    }
}

/// Production [`FarmSource`]: Deadline REST client + tiered list cache.
pub struct DeadlineFarm {
    api: DeadlineApi,
    cache: JobsCache<DeadlineApi>,
}

impl DeadlineFarm {
    pub fn new(api: DeadlineApi) -> Self {
        Self {
            cache: JobsCache::new(api.clone()),
            api,
        }
    }

    /// Prefetch all list categories (called once at startup).
    pub async fn prewarm(&self) -> Result<(), DeadlineError> {
        self.cache.prewarm().await
    }
}

#[async_trait]
impl FarmSource for DeadlineFarm {
    async fn list_snapshot(&self, kind: JobListKind) -> Result<Map<String, Value>, DeadlineError> {
        self.cache.read(kind).await
    }

    async fn job_snapshot(&self, job_id: &str) -> Result<JobDetailSnapshot, DeadlineError> {
        let details = self.api.job_details(job_id).await?;
        let job = normalize_detail(job_id, &details)?;
        let tasks_payload = self.api.job_tasks(job_id).await?;
        let tasks = normalize_tasks(&tasks_payload)?;
        Ok(JobDetailSnapshot { job, tasks })
    }

    async fn task_log(
        &self,
        job_id: &str,
        task_id: i64,
        kind: LogKind,
    ) -> Result<Option<String>, DeadlineError> {
        let data = match kind {
            LogKind::None => return Ok(None),
            // Warnings read the full task report, errors only the error
            // reports.
            LogKind::Warning => "allcontents",
            LogKind::Error => "allerrorcontents",
        };
        let reports = self.api.task_report_contents(job_id, task_id, data).await?;
        Ok(reports.into_iter().next())
    }

    async fn task_image_path(
        &self,
        job_id: &str,
        task_id: i64,
    ) -> Result<PathBuf, DeadlineError> {
        let task = self.api.job_task(job_id, task_id).await?;
        let frames = task
            .get("Frames")
            .and_then(Value::as_str)
            .ok_or_else(|| DeadlineError::Shape("task record missing 'Frames'".to_string()))?
            .to_string();

        let details = self.api.job_details(job_id).await?;
        let record = details
            .get(job_id)
            .ok_or_else(|| DeadlineError::Shape(format!("job details missing entry for {job_id}")))?;

        let output_path = record
            .get("Output Directories")
            .and_then(|d| d.get("Output Path 1"))
            .and_then(Value::as_str)
            .ok_or(DeadlineError::MissingOutput)?;
        let file_name = record
            .get("Output Filenames")
            .and_then(|f| f.get("Output File 1"))
            .and_then(Value::as_str)
            .ok_or(DeadlineError::MissingOutput)?;

        construct_image_path(&frames, output_path, file_name).ok_or_else(|| {
            DeadlineError::Shape(format!("unsupported output file name: {file_name}"))
        })
    }
}
