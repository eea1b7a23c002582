//! Commentary generation for watched jobs.
//!
//! When a client opens a job page (or the job starts erroring while
//! watched), the engine classifies the job, retrieves the relevant task
//! log, and streams an LLM-generated explanation to the client. Text is
//! generated once per (job, category) and replayed from the cache after
//! that, paced word by word so replays look identical to live streams.

pub mod cache;
pub mod openai;
pub mod prompts;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;

use farmview_core::status::{classify, first_error_task_id, JobStatus, LogKind};
use farmview_deadline::normalize::JobDetailSnapshot;
use farmview_deadline::FarmSource;

use crate::ws::messages::ServerMessage;
use cache::CommentaryCache;
use openai::{
    estimate_tokens, TextGenerator, LARGE_CONTEXT_THRESHOLD_TOKENS, MAX_PROMPT_TOKENS,
    MODEL_DEFAULT, MODEL_LARGE_CONTEXT,
};
use prompts::{PromptSet, LOG_PLACEHOLDER};

/// Chunk streamed to the client when the generation backend is down.
const GENERATOR_UNAVAILABLE: &str =
    "Error: OpenAI service couldn't be reached. Try reloading the page.";

/// Sentinel log used when a log-bearing category has no erroring task or
/// the farm has no report for it.
fn missing_log_sentinel(kind: LogKind) -> String {
    match kind {
        LogKind::None => String::new(),
        LogKind::Warning => "Error! Could not find any warning logs.".to_string(),
        LogKind::Error => "Error! Could not find any error logs.".to_string(),
    }
}

/// Classifies jobs, builds prompts, and streams commentary to clients.
pub struct CommentaryEngine {
    cache: CommentaryCache,
    generator: Arc<dyn TextGenerator>,
    prompts: PromptSet,
}

impl CommentaryEngine {
    pub fn new(generator: Arc<dyn TextGenerator>, prompts: PromptSet) -> Self {
        Self {
            cache: CommentaryCache::new(),
            generator,
            prompts,
        }
    }

    /// Produce commentary for the job's current state and stream it to the
    /// client. Runs as a detached task; a closed connection silently stops
    /// the stream without interrupting generation or caching.
    pub async fn narrate(
        &self,
        farm: Arc<dyn FarmSource>,
        tx: mpsc::UnboundedSender<ServerMessage>,
        job_id: String,
        snapshot: JobDetailSnapshot,
    ) {
        let status = match classify(snapshot.counts()) {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Skipping commentary");
                return;
            }
        };

        if let Some(text) = self.cache.get(&job_id, status).await {
            tracing::debug!(job_id = %job_id, status = %status, "Replaying cached commentary");
            replay(&tx, &job_id, &text).await;
            return;
        }

        let log = self.retrieve_log(&*farm, &job_id, &snapshot, status).await;
        let prompt = self.prompts.for_status(status).replace(LOG_PLACEHOLDER, &log);

        let (model, prompt) = match estimate_tokens(&prompt) {
            n if n > MAX_PROMPT_TOKENS => (MODEL_DEFAULT, self.prompts.log_too_long.clone()),
            n if n > LARGE_CONTEXT_THRESHOLD_TOKENS => (MODEL_LARGE_CONTEXT, prompt),
            _ => (MODEL_DEFAULT, prompt),
        };

        if send_reset(&tx, &job_id).is_err() {
            return;
        }

        // Forwarding task: relays deltas to the client while accumulating
        // the full text for the cache.
        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<String>();
        let forward_tx = tx.clone();
        let forward_job_id = job_id.clone();
        let forward = tokio::spawn(async move {
            let mut full = String::new();
            while let Some(chunk) = chunk_rx.recv().await {
                full.push_str(&chunk);
                let _ = forward_tx.send(ServerMessage::AiText {
                    job_id: forward_job_id.clone(),
                    reset: false,
                    chunk: Some(chunk),
                });
            }
            full
        });

        let result = self
            .generator
            .generate(model, &self.prompts.system_text, &prompt, chunk_tx)
            .await;
        let full = forward.await.unwrap_or_default();

        match result {
            Ok(()) => {
                if !full.is_empty() {
                    self.cache.put(&job_id, status, full).await;
                }
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Commentary generation failed");
                let _ = tx.send(ServerMessage::AiText {
                    job_id,
                    reset: false,
                    chunk: Some(GENERATOR_UNAVAILABLE.to_string()),
                });
            }
        }
    }

    /// Fetch the task log the category's prompt needs, falling back to a
    /// fixed sentinel when no erroring task or report exists.
    async fn retrieve_log(
        &self,
        farm: &dyn FarmSource,
        job_id: &str,
        snapshot: &JobDetailSnapshot,
        status: JobStatus,
    ) -> String {
        let kind = status.log_kind();
        if kind == LogKind::None {
            return String::new();
        }

        let first_erroring =
            first_error_task_id(snapshot.tasks.iter().map(|t| (t.task_id, t.errors)));
        let Some(task_id) = first_erroring else {
            return missing_log_sentinel(kind);
        };

        match farm.task_log(job_id, task_id, kind).await {
            Ok(Some(log)) => log,
            Ok(None) => missing_log_sentinel(kind),
            Err(e) => {
                tracing::warn!(job_id = %job_id, task_id, error = %e, "Task log fetch failed");
                missing_log_sentinel(kind)
            }
        }
    }
}

fn send_reset(
    tx: &mpsc::UnboundedSender<ServerMessage>,
    job_id: &str,
) -> Result<(), mpsc::error::SendError<ServerMessage>> {
    tx.send(ServerMessage::AiText {
        job_id: job_id.to_string(),
        reset: true,
        chunk: None,
    })
}

/// Stream cached text word by word with a little jitter so it renders like
/// a live generation.
async fn replay(tx: &mpsc::UnboundedSender<ServerMessage>, job_id: &str, text: &str) {
    if send_reset(tx, job_id).is_err() {
        return;
    }
    for word in text.split_whitespace() {
        let sent = tx.send(ServerMessage::AiText {
            job_id: job_id.to_string(),
            reset: false,
            chunk: Some(format!(" {word}")),
        });
        if sent.is_err() {
            return;
        }
        let delay_ms = rand::rng().random_range(100..=200);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}
