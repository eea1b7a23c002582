//! Prompt templates for commentary generation.
//!
//! One template per job-status category, plus the system prompt and a
//! fallback used when a task log is too large to fit any model context.
//! Templates containing `[LOG]` get the relevant task report spliced in.

use serde::Deserialize;

use farmview_core::status::JobStatus;

/// Placeholder replaced with the retrieved task log.
pub const LOG_PLACEHOLDER: &str = "[LOG]";

/// The full prompt table, deserialized from `assets/prompts.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptSet {
    pub system_text: String,
    /// Used instead of the category prompt when the log blows past the
    /// largest usable context.
    pub log_too_long: String,
    pub finished_successfully: String,
    pub finished_warnings: String,
    pub finished_partially: String,
    pub finished_failed: String,
    pub running_successfully: String,
    pub running_only_warnings: String,
    pub running_warnings: String,
    pub running_fails: String,
}

impl PromptSet {
    /// The prompt table shipped with the binary.
    pub fn embedded() -> Self {
        serde_json::from_str(include_str!("../../assets/prompts.json"))
            .expect("embedded prompts.json must be valid")
    }

    /// Template for a job-status category.
    pub fn for_status(&self, status: JobStatus) -> &str {
        match status {
            JobStatus::FinishedSuccessfully => &self.finished_successfully,
            JobStatus::FinishedWarnings => &self.finished_warnings,
            JobStatus::FinishedPartially => &self.finished_partially,
            JobStatus::FinishedFailed => &self.finished_failed,
            JobStatus::RunningSuccessfully => &self.running_successfully,
            JobStatus::RunningOnlyWarnings => &self.running_only_warnings,
            JobStatus::RunningWarnings => &self.running_warnings,
            JobStatus::RunningFails => &self.running_fails,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmview_core::status::LogKind;

    const ALL_STATUSES: [JobStatus; 8] = [
        JobStatus::FinishedSuccessfully,
        JobStatus::FinishedWarnings,
        JobStatus::FinishedPartially,
        JobStatus::FinishedFailed,
        JobStatus::RunningSuccessfully,
        JobStatus::RunningOnlyWarnings,
        JobStatus::RunningWarnings,
        JobStatus::RunningFails,
    ];

    #[test]
    fn embedded_prompts_parse_and_are_nonempty() {
        let prompts = PromptSet::embedded();
        assert!(!prompts.system_text.is_empty());
        assert!(!prompts.log_too_long.is_empty());
        for status in ALL_STATUSES {
            assert!(!prompts.for_status(status).is_empty(), "{status}");
        }
    }

    #[test]
    fn log_bearing_prompts_have_a_log_placeholder() {
        let prompts = PromptSet::embedded();
        for status in ALL_STATUSES {
            if status.log_kind() != LogKind::None {
                assert!(
                    prompts.for_status(status).contains(LOG_PLACEHOLDER),
                    "{status} prompt is missing the log placeholder"
                );
            }
        }
    }
}
