//! Job-status classification.
//!
//! Maps a job's aggregate task counters to one of the narrative categories
//! the commentary engine knows how to talk about. The rules form an ordered
//! decision table evaluated top to bottom; the first matching row wins.
//! Counter combinations matching no row are a classification failure
//! surfaced as [`UnclassifiedJobState`], never silently defaulted.

use serde::{Deserialize, Serialize};

/// Aggregate task-state counters for a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkCounts {
    pub completed: u64,
    pub failed: u64,
    pub pending: u64,
    pub queued: u64,
    pub rendering: u64,
    pub suspended: u64,
    /// Accumulated error-report count across the whole job. Errors do not
    /// imply failed tasks; a task can error, requeue, and still complete.
    pub errors: u64,
}

impl ChunkCounts {
    /// Total number of tasks across all states.
    pub fn total(&self) -> u64 {
        self.completed + self.failed + self.pending + self.queued + self.rendering + self.suspended
    }
}

/// Which task log the commentary prompt needs as supporting evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// No log needed (the job has nothing to explain).
    None,
    /// The full task report of the first erroring task.
    Warning,
    /// The error report of the first erroring task.
    Error,
}

/// Narrative category of a job, derived from its counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    FinishedSuccessfully,
    FinishedWarnings,
    FinishedPartially,
    FinishedFailed,
    RunningSuccessfully,
    RunningOnlyWarnings,
    RunningWarnings,
    RunningFails,
}

impl JobStatus {
    /// String representation used for prompt lookup and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::FinishedSuccessfully => "finished_successfully",
            JobStatus::FinishedWarnings => "finished_warnings",
            JobStatus::FinishedPartially => "finished_partially",
            JobStatus::FinishedFailed => "finished_failed",
            JobStatus::RunningSuccessfully => "running_successfully",
            JobStatus::RunningOnlyWarnings => "running_only_warnings",
            JobStatus::RunningWarnings => "running_warnings",
            JobStatus::RunningFails => "running_fails",
        }
    }

    /// Which task log the commentary prompt for this category requires.
    pub fn log_kind(&self) -> LogKind {
        match self {
            JobStatus::FinishedSuccessfully | JobStatus::RunningSuccessfully => LogKind::None,
            JobStatus::FinishedWarnings
            | JobStatus::RunningOnlyWarnings
            | JobStatus::RunningWarnings => LogKind::Warning,
            JobStatus::FinishedPartially | JobStatus::FinishedFailed | JobStatus::RunningFails => {
                LogKind::Error
            }
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters matched no row of the decision table.
///
/// Possible in transient upstream states (e.g. failed tasks with no error
/// reports yet). Callers log it and skip commentary for that cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error(
    "job state matched no classification rule \
     (completed={} failed={} pending={} queued={} rendering={} suspended={} errors={})",
    counts.completed, counts.failed, counts.pending, counts.queued,
    counts.rendering, counts.suspended, counts.errors
)]
pub struct UnclassifiedJobState {
    pub counts: ChunkCounts,
}

/// Classify a job's counters into a narrative category.
///
/// Ordered decision table, first match wins. Row order matters: a job whose
/// every task failed also satisfies the "finished partially" row
/// (`total == completed + failed + suspended` with zero completed), so
/// partial completion is checked before total failure, matching the shipped
/// behavior.
pub fn classify(counts: ChunkCounts) -> Result<JobStatus, UnclassifiedJobState> {
    let total = counts.total();

    // Finished, no errors anywhere.
    if total == counts.completed && counts.errors == 0 {
        return Ok(JobStatus::FinishedSuccessfully);
    }

    // Finished, but tasks errored (and recovered) along the way.
    if total == counts.completed
        && counts.errors != 0
        && counts.failed == 0
        && counts.pending == 0
    {
        return Ok(JobStatus::FinishedWarnings);
    }

    // Nothing left running or queued, but not everything completed.
    if total == counts.completed + counts.failed + counts.suspended {
        return Ok(JobStatus::FinishedPartially);
    }

    // Every single task failed.
    if total == counts.failed {
        return Ok(JobStatus::FinishedFailed);
    }

    // Still going, clean so far.
    if total != counts.completed && counts.errors == 0 && counts.failed == 0 {
        return Ok(JobStatus::RunningSuccessfully);
    }

    // Still going, nothing completed yet, only warnings.
    if total != counts.completed
        && counts.completed == 0
        && counts.errors != 0
        && counts.failed == 0
    {
        return Ok(JobStatus::RunningOnlyWarnings);
    }

    // Still going with warnings.
    if total != counts.completed && counts.errors != 0 && counts.failed == 0 {
        return Ok(JobStatus::RunningWarnings);
    }

    // Still going and tasks are failing.
    if total != counts.completed && counts.errors != 0 && counts.failed != 0 {
        return Ok(JobStatus::RunningFails);
    }

    Err(UnclassifiedJobState { counts })
}

/// Find the first task (in task order) with at least one error report.
///
/// Takes `(task_id, error_count)` pairs. Returns `None` when no task has
/// errored, which upstream occasionally reports even for jobs whose
/// aggregate error counter is non-zero.
pub fn first_error_task_id<I>(tasks: I) -> Option<i64>
where
    I: IntoIterator<Item = (i64, u64)>,
{
    tasks
        .into_iter()
        .find(|(_, errors)| *errors >= 1)
        .map(|(task_id, _)| task_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn counts(
        completed: u64,
        failed: u64,
        pending: u64,
        queued: u64,
        rendering: u64,
        suspended: u64,
        errors: u64,
    ) -> ChunkCounts {
        ChunkCounts {
            completed,
            failed,
            pending,
            queued,
            rendering,
            suspended,
            errors,
        }
    }

    #[test]
    fn all_completed_without_errors_is_finished_successfully() {
        let status = classify(counts(10, 0, 0, 0, 0, 0, 0)).unwrap();
        assert_eq!(status, JobStatus::FinishedSuccessfully);
        assert_eq!(status.log_kind(), LogKind::None);
    }

    #[test]
    fn completed_with_errors_is_finished_warnings() {
        let status = classify(counts(10, 0, 0, 0, 0, 0, 4)).unwrap();
        assert_eq!(status, JobStatus::FinishedWarnings);
        assert_eq!(status.log_kind(), LogKind::Warning);
    }

    #[test]
    fn mixed_completed_failed_is_finished_partially() {
        let status = classify(counts(3, 7, 0, 0, 0, 0, 1)).unwrap();
        assert_eq!(status, JobStatus::FinishedPartially);
        assert_eq!(status.log_kind(), LogKind::Error);
    }

    #[test]
    fn partial_row_takes_precedence_over_total_failure_row() {
        // All tasks failed: this satisfies both the partial row
        // (completed + failed + suspended == total) and the failed row
        // (failed == total). The partial row is evaluated first.
        let status = classify(counts(0, 5, 0, 0, 0, 0, 5)).unwrap();
        assert_eq!(status, JobStatus::FinishedPartially);
    }

    #[test]
    fn running_without_errors_is_running_successfully() {
        let status = classify(counts(2, 0, 0, 5, 1, 0, 0)).unwrap();
        assert_eq!(status, JobStatus::RunningSuccessfully);
        assert_eq!(status.log_kind(), LogKind::None);
    }

    #[test]
    fn running_with_errors_and_no_completions_is_only_warnings() {
        let status = classify(counts(0, 0, 0, 1, 0, 0, 2)).unwrap();
        assert_eq!(status, JobStatus::RunningOnlyWarnings);
        assert_eq!(status.log_kind(), LogKind::Warning);
    }

    #[test]
    fn running_with_errors_and_some_completions_is_running_warnings() {
        let status = classify(counts(5, 0, 0, 2, 1, 0, 3)).unwrap();
        assert_eq!(status, JobStatus::RunningWarnings);
        assert_eq!(status.log_kind(), LogKind::Warning);
    }

    #[test]
    fn running_with_failed_tasks_is_running_fails() {
        let status = classify(counts(2, 1, 0, 3, 1, 0, 4)).unwrap();
        assert_eq!(status, JobStatus::RunningFails);
        assert_eq!(status.log_kind(), LogKind::Error);
    }

    #[test]
    fn failed_tasks_without_error_reports_is_unclassified() {
        // total != completed, errors == 0, failed != 0: no row matches.
        let result = classify(counts(1, 2, 0, 3, 0, 0, 0));
        assert_matches!(result, Err(UnclassifiedJobState { .. }));
    }

    #[test]
    fn first_error_task_returns_first_in_task_order() {
        let tasks = vec![(0, 0), (1, 0), (2, 3), (3, 1)];
        assert_eq!(first_error_task_id(tasks), Some(2));
    }

    #[test]
    fn first_error_task_returns_none_when_clean() {
        let tasks = vec![(0, 0), (1, 0)];
        assert_eq!(first_error_task_id(tasks), None);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::RunningOnlyWarnings).unwrap();
        assert_eq!(json, "\"running_only_warnings\"");
    }
}
