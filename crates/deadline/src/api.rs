//! REST client for the Deadline Web Service HTTP endpoints.
//!
//! Wraps the job, task, and task-report endpoints using [`reqwest`]. The
//! web service has one notable quirk: a job lookup for an unknown id
//! returns a plain JSON *string* (an error message) instead of a job
//! record, so invalid ids are detected by payload shape rather than by
//! status code.

use serde_json::Value;

use crate::normalize::RawJob;

/// HTTP client for a single Deadline Web Service instance.
#[derive(Clone)]
pub struct DeadlineApi {
    client: reqwest::Client,
    base_url: String,
}

/// Errors from the Deadline REST layer.
#[derive(Debug, thiserror::Error)]
pub enum DeadlineError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.), meaning
    /// the web service is unreachable.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The web service returned a non-2xx status code.
    #[error("Deadline API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A job lookup returned the web service's string-shaped error payload,
    /// meaning the job id does not exist.
    #[error("unknown job id: {0}")]
    InvalidJobId(String),

    /// A job record has no registered output directory or file name, so no
    /// preview path can be constructed for it.
    #[error("job has no registered output path")]
    MissingOutput,

    /// A response was missing a field the normalization layer needs.
    #[error("unexpected response shape: {0}")]
    Shape(String),
}

impl DeadlineApi {
    /// Create a new API client.
    ///
    /// * `base_url` - Base HTTP URL of the web service, e.g.
    ///   `http://farm-host:8082`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch all jobs currently in any of the given scheduler states.
    ///
    /// Sends `GET /api/jobs?States=<csv>`.
    pub async fn jobs_in_states(&self, states: &[&str]) -> Result<Vec<RawJob>, DeadlineError> {
        let response = self
            .client
            .get(format!("{}/api/jobs", self.base_url))
            .query(&[("States", states.join(","))])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the detailed record for a single job.
    ///
    /// Sends `GET /api/jobs?JobID=<id>&Details=true`. Returns the raw JSON
    /// object keyed by job id; string payloads map to
    /// [`DeadlineError::InvalidJobId`].
    pub async fn job_details(&self, job_id: &str) -> Result<Value, DeadlineError> {
        let response = self
            .client
            .get(format!("{}/api/jobs", self.base_url))
            .query(&[("JobID", job_id), ("Details", "true")])
            .send()
            .await?;

        let value: Value = Self::parse_response(response).await?;
        if value.is_string() {
            return Err(DeadlineError::InvalidJobId(job_id.to_string()));
        }
        Ok(value)
    }

    /// Fetch the task list for a job.
    ///
    /// Sends `GET /api/tasks?JobID=<id>`.
    pub async fn job_tasks(&self, job_id: &str) -> Result<Value, DeadlineError> {
        let response = self
            .client
            .get(format!("{}/api/tasks", self.base_url))
            .query(&[("JobID", job_id)])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch a single task of a job.
    ///
    /// Sends `GET /api/tasks?JobID=<id>&TaskID=<id>`.
    pub async fn job_task(&self, job_id: &str, task_id: i64) -> Result<Value, DeadlineError> {
        let response = self
            .client
            .get(format!("{}/api/tasks", self.base_url))
            .query(&[("JobID", job_id.to_string()), ("TaskID", task_id.to_string())])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the contents of all reports of one kind for a task.
    ///
    /// Sends `GET /api/taskreports?JobID=&TaskID=&Data=<kind>` where `kind`
    /// is `allerrorcontents` or `allcontents`. Returns the raw list of
    /// report bodies, possibly empty.
    pub async fn task_report_contents(
        &self,
        job_id: &str,
        task_id: i64,
        data: &str,
    ) -> Result<Vec<String>, DeadlineError> {
        let response = self
            .client
            .get(format!("{}/api/taskreports", self.base_url))
            .query(&[
                ("JobID", job_id.to_string()),
                ("TaskID", task_id.to_string()),
                ("Data", data.to_string()),
            ])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, otherwise capture the
    /// status and body as a [`DeadlineError::Api`].
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, DeadlineError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(DeadlineError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DeadlineError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
