//! Normalization of raw Deadline payloads.
//!
//! The web service returns large records with dozens of fields; the
//! frontend needs a handful. These types keep only what the app consumes
//! and serialize under the exact field names the frontend already binds
//! to, so snapshots diff cleanly from one refresh to the next.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use farmview_core::status::ChunkCounts;

use crate::api::DeadlineError;

/// Job record as returned by `GET /api/jobs?States=...`, reduced to the
/// fields normalization reads.
#[derive(Debug, Clone, Deserialize)]
pub struct RawJob {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "Props")]
    pub props: RawJobProps,
    #[serde(rename = "CompletedChunks")]
    pub completed_chunks: u64,
    #[serde(rename = "QueuedChunks")]
    pub queued_chunks: u64,
    #[serde(rename = "SuspendedChunks")]
    pub suspended_chunks: u64,
    #[serde(rename = "RenderingChunks")]
    pub rendering_chunks: u64,
    #[serde(rename = "FailedChunks")]
    pub failed_chunks: u64,
    #[serde(rename = "PendingChunks")]
    pub pending_chunks: u64,
    #[serde(rename = "Errs")]
    pub errors: u64,
    #[serde(rename = "DateStart", default)]
    pub date_start: String,
}

/// Submission properties nested under a raw job's `Props` key.
#[derive(Debug, Clone, Deserialize)]
pub struct RawJobProps {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "User")]
    pub user: String,
}

/// One job's entry in a category snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "User")]
    pub user: String,
    /// Start time as a unix timestamp, used by the frontend for sorting.
    /// 0 when the start date is unparsable, which sorts the job last.
    #[serde(rename = "EpochStarted")]
    pub epoch_started: i64,
    #[serde(rename = "CompletedChunks")]
    pub completed_chunks: u64,
    #[serde(rename = "QueuedChunks")]
    pub queued_chunks: u64,
    #[serde(rename = "SuspendedChunks")]
    pub suspended_chunks: u64,
    #[serde(rename = "RenderingChunks")]
    pub rendering_chunks: u64,
    #[serde(rename = "FailedChunks")]
    pub failed_chunks: u64,
    #[serde(rename = "PendingChunks")]
    pub pending_chunks: u64,
    #[serde(rename = "Errs")]
    pub errors: u64,
}

impl JobSummary {
    /// Build a summary from a raw job record and its parsed start date.
    pub fn from_raw(raw: &RawJob, started: Option<NaiveDateTime>) -> Self {
        Self {
            name: raw.props.name.clone(),
            user: raw.props.user.clone(),
            epoch_started: started.map(|d| d.and_utc().timestamp()).unwrap_or(0),
            completed_chunks: raw.completed_chunks,
            queued_chunks: raw.queued_chunks,
            suspended_chunks: raw.suspended_chunks,
            rendering_chunks: raw.rendering_chunks,
            failed_chunks: raw.failed_chunks,
            pending_chunks: raw.pending_chunks,
            errors: raw.errors,
        }
    }
}

/// Parse Deadline's date format (`2023-03-01T14:30:00.0000000+01:00` and
/// friends) by slicing out the date and time-of-day components.
///
/// Returns `None` for the placeholder dates the scheduler emits for jobs
/// that never started.
pub fn parse_start_date(raw: &str) -> Option<NaiveDateTime> {
    // `get` rather than slicing: non-ASCII garbage in the field must read
    // as unparsable, not split a char in half.
    let date = raw.get(..10)?;
    let time = raw.get(11..19)?;
    let stitched = format!("{date} {time}");
    NaiveDateTime::parse_from_str(&stitched, "%Y-%m-%d %H:%M:%S").ok()
}

/// Build a category snapshot (job id → [`JobSummary`]) from raw jobs.
///
/// `include` receives each job's parsed start date and decides whether the
/// job belongs in this category (age windows for the recent/older lists).
pub fn build_snapshot<F>(jobs: &[RawJob], mut include: F) -> Map<String, Value>
where
    F: FnMut(Option<NaiveDateTime>) -> bool,
{
    let mut snapshot = Map::new();
    for job in jobs {
        let started = parse_start_date(&job.date_start);
        if include(started) {
            let summary = JobSummary::from_raw(job, started);
            // JobSummary serialization cannot fail: all fields are plain
            // strings and integers.
            snapshot.insert(
                job.id.clone(),
                serde_json::to_value(summary).unwrap_or(Value::Null),
            );
        }
    }
    snapshot
}

/// Detailed record of a single job, as shown on the job page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDetail {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "Submit_Date")]
    pub submit_date: String,
    #[serde(rename = "Completed")]
    pub completed: u64,
    #[serde(rename = "Failed")]
    pub failed: u64,
    #[serde(rename = "Pending")]
    pub pending: u64,
    #[serde(rename = "Queued")]
    pub queued: u64,
    #[serde(rename = "Rendering")]
    pub rendering: u64,
    #[serde(rename = "Suspended")]
    pub suspended: u64,
    #[serde(rename = "Errors")]
    pub errors: u64,
    #[serde(rename = "Estimated_Time_Remaining")]
    pub estimated_time_remaining: String,
    #[serde(rename = "Average_Task_Time")]
    pub average_task_time: String,
}

/// One task row on the job page. Field names match the upstream task
/// record, so this both deserializes the web service payload and
/// serializes into snapshots unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    #[serde(rename = "TaskID")]
    pub task_id: i64,
    #[serde(rename = "Frames")]
    pub frames: String,
    #[serde(rename = "Errs")]
    pub errors: u64,
    #[serde(rename = "Prog")]
    pub progress: String,
}

/// A job's detail record together with its ordered task list: the unit the
/// detail page watches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDetailSnapshot {
    pub job: JobDetail,
    pub tasks: Vec<TaskSummary>,
}

impl JobDetailSnapshot {
    /// Aggregate counters for the status classifier.
    pub fn counts(&self) -> ChunkCounts {
        ChunkCounts {
            completed: self.job.completed,
            failed: self.job.failed,
            pending: self.job.pending,
            queued: self.job.queued,
            rendering: self.job.rendering,
            suspended: self.job.suspended,
            errors: self.job.errors,
        }
    }

    /// Serialize to the JSON object the diff engine and WebSocket layer
    /// operate on.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Extract a [`JobDetail`] from the raw `Details=true` payload, which nests
/// everything under the job id.
pub fn normalize_detail(job_id: &str, details: &Value) -> Result<JobDetail, DeadlineError> {
    let record = details
        .get(job_id)
        .ok_or_else(|| shape(format!("job details missing entry for {job_id}")))?;

    Ok(JobDetail {
        name: text(record, &["Job", "Name"])?,
        user: text(record, &["Job", "User"])?,
        submit_date: text(record, &["Job", "Submit Date"])?,
        completed: count(record, &["Task States", "Completed"])?,
        failed: count(record, &["Task States", "Failed"])?,
        pending: count(record, &["Task States", "Pending"])?,
        queued: count(record, &["Task States", "Queued"])?,
        rendering: count(record, &["Task States", "Rendering"])?,
        suspended: count(record, &["Task States", "Suspended"])?,
        errors: count(record, &["Job", "Errors"])?,
        estimated_time_remaining: text(record, &["Statistics", "Estimated Time Remaining"])?,
        average_task_time: text(record, &["Statistics", "Average Task Time"])?,
    })
}

/// Parse the task list payload of `GET /api/tasks?JobID=...`.
pub fn normalize_tasks(payload: &Value) -> Result<Vec<TaskSummary>, DeadlineError> {
    let tasks = payload
        .get("Tasks")
        .ok_or_else(|| shape("task list payload missing 'Tasks'".to_string()))?;

    serde_json::from_value(tasks.clone())
        .map_err(|e| shape(format!("task list entry malformed: {e}")))
}

// ---- field access helpers ----

fn shape(message: String) -> DeadlineError {
    DeadlineError::Shape(message)
}

fn lookup<'a>(record: &'a Value, path: &[&str]) -> Result<&'a Value, DeadlineError> {
    let mut current = record;
    for key in path {
        current = current
            .get(key)
            .ok_or_else(|| shape(format!("missing field '{}'", path.join("."))))?;
    }
    Ok(current)
}

fn text(record: &Value, path: &[&str]) -> Result<String, DeadlineError> {
    let value = lookup(record, path)?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| shape(format!("field '{}' is not a string", path.join("."))))
}

/// Counters arrive as JSON numbers from some web service versions and as
/// decimal strings from others; accept both.
fn count(record: &Value, path: &[&str]) -> Result<u64, DeadlineError> {
    let value = lookup(record, path)?;
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| shape(format!("field '{}' is not a count", path.join(".")))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| shape(format!("field '{}' is not a count", path.join(".")))),
        _ => Err(shape(format!(
            "field '{}' is not a count",
            path.join(".")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn raw_job(id: &str, date_start: &str) -> RawJob {
        serde_json::from_value(json!({
            "_id": id,
            "Props": {"Name": "shot_010", "User": "ada"},
            "CompletedChunks": 3,
            "QueuedChunks": 2,
            "SuspendedChunks": 0,
            "RenderingChunks": 1,
            "FailedChunks": 0,
            "PendingChunks": 0,
            "Errs": 0,
            "DateStart": date_start,
        }))
        .unwrap()
    }

    #[test]
    fn parses_deadline_date_format() {
        let parsed = parse_start_date("2023-03-01T14:30:05.0000000+01:00").unwrap();
        assert_eq!(parsed.to_string(), "2023-03-01 14:30:05");
    }

    #[test]
    fn rejects_placeholder_dates() {
        assert!(parse_start_date("").is_none());
        assert!(parse_start_date("never").is_none());
        // Multi-byte characters around the slice points must read as
        // unparsable, not panic on a char boundary.
        assert!(parse_start_date("ééééééééééééééééééé").is_none());
        assert!(parse_start_date("2023-03-01é14:30:00.0000000").is_none());
    }

    #[test]
    fn unparsable_start_date_sorts_to_epoch_zero() {
        let raw = raw_job("job-1", "garbage that is long enough!");
        let summary = JobSummary::from_raw(&raw, parse_start_date(&raw.date_start));
        assert_eq!(summary.epoch_started, 0);
    }

    #[test]
    fn snapshot_keys_jobs_by_id_and_keeps_wire_names() {
        let jobs = vec![raw_job("job-1", "2023-03-01T14:30:05.0000000+01:00")];
        let snapshot = build_snapshot(&jobs, |_| true);

        let entry = snapshot.get("job-1").unwrap();
        assert_eq!(entry["Name"], "shot_010");
        assert_eq!(entry["CompletedChunks"], 3);
        assert_eq!(entry["Errs"], 0);
    }

    #[test]
    fn snapshot_respects_include_filter() {
        let jobs = vec![
            raw_job("job-1", "2023-03-01T14:30:05.0000000+01:00"),
            raw_job("job-2", "bad date value here......"),
        ];
        let snapshot = build_snapshot(&jobs, |started| started.is_some());
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("job-1"));
    }

    fn details_fixture() -> Value {
        json!({
            "job-1": {
                "Job": {
                    "Name": "shot_010",
                    "User": "ada",
                    "Submit Date": "Mar 01/23 14:28:11",
                    "Errors": 2,
                },
                "Task States": {
                    "Completed": "5",
                    "Failed": 0,
                    "Pending": 0,
                    "Queued": "2",
                    "Rendering": 1,
                    "Suspended": 0,
                },
                "Statistics": {
                    "Estimated Time Remaining": "00d 00h 12m 30s",
                    "Average Task Time": "00d 00h 02m 10s",
                },
            }
        })
    }

    #[test]
    fn normalizes_detail_with_mixed_count_encodings() {
        let detail = normalize_detail("job-1", &details_fixture()).unwrap();
        assert_eq!(detail.name, "shot_010");
        assert_eq!(detail.completed, 5);
        assert_eq!(detail.queued, 2);
        assert_eq!(detail.errors, 2);
    }

    #[test]
    fn detail_missing_field_is_a_shape_error() {
        let result = normalize_detail("job-2", &details_fixture());
        assert_matches!(result, Err(DeadlineError::Shape(_)));
    }

    #[test]
    fn normalizes_task_list() {
        let payload = json!({
            "Tasks": [
                {"TaskID": 0, "Frames": "1-10", "Errs": 0, "Prog": "100 %"},
                {"TaskID": 1, "Frames": "11-20", "Errs": 2, "Prog": "40 %"},
            ]
        });
        let tasks = normalize_tasks(&payload).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].task_id, 1);
        assert_eq!(tasks[1].errors, 2);
    }

    #[test]
    fn snapshot_counts_feed_the_classifier() {
        let detail = normalize_detail("job-1", &details_fixture()).unwrap();
        let snapshot = JobDetailSnapshot {
            job: detail,
            tasks: vec![],
        };
        let counts = snapshot.counts();
        assert_eq!(counts.total(), 8);
        assert_eq!(counts.errors, 2);
    }
}
