//! WebSocket message types, one tagged union per direction.
//!
//! The wire shapes are fixed by the deployed frontend; field names and tag
//! values here are load-bearing. Unknown client payloads fail to parse and
//! are dropped at the boundary without tearing down the connection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use farmview_deadline::JobListKind;

/// A command received from a client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "body")]
pub enum ClientCommand {
    #[serde(rename = "get_active_jobs")]
    GetActiveJobs,
    #[serde(rename = "get_recent_jobs")]
    GetRecentJobs,
    #[serde(rename = "get_older_jobs")]
    GetOlderJobs,
    #[serde(rename = "get_job_details")]
    GetJobDetails {
        #[serde(rename = "jobId")]
        job_id: String,
    },
    #[serde(rename = "get_image_preview")]
    GetImagePreview {
        #[serde(rename = "jobId")]
        job_id: String,
        #[serde(rename = "taskId")]
        task_id: String,
    },
}

/// A message pushed to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "active_jobs")]
    ActiveJobs {
        data: Map<String, Value>,
        update: bool,
    },
    #[serde(rename = "recent_jobs")]
    RecentJobs {
        data: Map<String, Value>,
        update: bool,
    },
    #[serde(rename = "older_jobs")]
    OlderJobs {
        data: Map<String, Value>,
        update: bool,
    },
    #[serde(rename = "job_details")]
    JobDetails {
        data: Map<String, Value>,
        update: bool,
    },
    #[serde(rename = "error")]
    Error { error: &'static str },
    #[serde(rename = "image_preview")]
    ImagePreview {
        task_id: String,
        error: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    #[serde(rename = "ai_text")]
    AiText {
        job_id: String,
        reset: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        chunk: Option<String>,
    },
}

impl ServerMessage {
    /// Build the push message for a job-list category.
    pub fn list(kind: JobListKind, data: Map<String, Value>, update: bool) -> Self {
        match kind {
            JobListKind::Active => ServerMessage::ActiveJobs { data, update },
            JobListKind::Recent => ServerMessage::RecentJobs { data, update },
            JobListKind::Older => ServerMessage::OlderJobs { data, update },
        }
    }

    /// The error response for a job lookup on an id the farm doesn't know.
    pub fn invalid_job_id() -> Self {
        ServerMessage::Error {
            error: "invalid_jobId",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_commands() {
        let cmd: ClientCommand = serde_json::from_str(r#"{"body": "get_active_jobs"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::GetActiveJobs);
    }

    #[test]
    fn parses_commands_with_job_id() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"body": "get_job_details", "jobId": "abc123"}"#).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::GetJobDetails {
                job_id: "abc123".to_string()
            }
        );
    }

    #[test]
    fn parses_image_preview_command() {
        let cmd: ClientCommand = serde_json::from_str(
            r#"{"body": "get_image_preview", "jobId": "abc123", "taskId": "4"}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            ClientCommand::GetImagePreview {
                job_id: "abc123".to_string(),
                task_id: "4".to_string()
            }
        );
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!(serde_json::from_str::<ClientCommand>(r#"{"body": "drop_tables"}"#).is_err());
        assert!(serde_json::from_str::<ClientCommand>(r#"{"hello": "world"}"#).is_err());
        assert!(serde_json::from_str::<ClientCommand>("not json at all").is_err());
    }

    #[test]
    fn list_push_serializes_with_wire_tag() {
        let mut data = Map::new();
        data.insert("job-1".to_string(), json!({"Name": "shot"}));
        let msg = ServerMessage::list(JobListKind::Active, data, false);

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "active_jobs");
        assert_eq!(value["update"], false);
        assert_eq!(value["data"]["job-1"]["Name"], "shot");
    }

    #[test]
    fn invalid_job_id_has_fixed_shape() {
        let value = serde_json::to_value(ServerMessage::invalid_job_id()).unwrap();
        assert_eq!(value, json!({"type": "error", "error": "invalid_jobId"}));
    }

    #[test]
    fn ai_text_omits_absent_chunk() {
        let reset = ServerMessage::AiText {
            job_id: "abc".to_string(),
            reset: true,
            chunk: None,
        };
        let value = serde_json::to_value(&reset).unwrap();
        assert_eq!(value, json!({"type": "ai_text", "job_id": "abc", "reset": true}));
    }
}
