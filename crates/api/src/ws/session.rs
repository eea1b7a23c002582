//! Per-connection session state machine.
//!
//! Each WebSocket connection owns one [`Session`]. Inbound commands move
//! the session between watching job lists and watching a single job; the
//! first successful response also starts a background refresh loop that
//! re-fetches what the session is watching and pushes only the diff
//! against what was last sent. The loop lives until the connection's
//! cancellation token fires or a push fails.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use farmview_core::diff::diff;
use farmview_deadline::api::DeadlineError;
use farmview_deadline::normalize::JobDetailSnapshot;
use farmview_deadline::{FarmSource, JobListKind};

use crate::commentary::CommentaryEngine;
use crate::preview;
use crate::ws::messages::{ClientCommand, ServerMessage};

/// List refresh cadence (homepage).
const LIST_REFRESH_INTERVAL: Duration = Duration::from_secs(3);
/// Detail refresh cadence (job page).
const DETAIL_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// `last_sent` key for the detail snapshot.
const DETAIL_KEY: &str = "job_details";

/// What the session is currently watching.
#[derive(Debug, Clone, PartialEq)]
enum WatchMode {
    /// No data requested yet.
    Uninitialized,
    /// Watching one or more job-list categories.
    Lists(Vec<JobListKind>),
    /// Watching a single job's detail page.
    Detail(String),
}

/// Mutable session state shared between the command handler and the
/// refresh loop.
struct SessionInner {
    mode: WatchMode,
    /// Snapshot last pushed per key; the diff baseline.
    last_sent: HashMap<String, Map<String, Value>>,
    /// Typed copy of the last detail snapshot, for classification and the
    /// errors/failed transition checks.
    last_detail: Option<JobDetailSnapshot>,
    loop_started: bool,
}

/// One client connection's watch state and push plumbing.
#[derive(Clone)]
pub struct Session {
    farm: Arc<dyn FarmSource>,
    commentary: Arc<CommentaryEngine>,
    tx: mpsc::UnboundedSender<ServerMessage>,
    cancel: CancellationToken,
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    /// * `tx`     - outbound channel to the connection's send task.
    /// * `cancel` - fired when the connection closes; stops the loop.
    pub fn new(
        farm: Arc<dyn FarmSource>,
        commentary: Arc<CommentaryEngine>,
        tx: mpsc::UnboundedSender<ServerMessage>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            farm,
            commentary,
            tx,
            cancel,
            inner: Arc::new(Mutex::new(SessionInner {
                mode: WatchMode::Uninitialized,
                last_sent: HashMap::new(),
                last_detail: None,
                loop_started: false,
            })),
        }
    }

    /// Dispatch one inbound client command.
    pub async fn handle_command(&self, command: ClientCommand) {
        match command {
            ClientCommand::GetActiveJobs => self.watch_list(JobListKind::Active).await,
            ClientCommand::GetRecentJobs => self.watch_list(JobListKind::Recent).await,
            ClientCommand::GetOlderJobs => self.watch_list(JobListKind::Older).await,
            ClientCommand::GetJobDetails { job_id } => self.watch_detail(job_id).await,
            ClientCommand::GetImagePreview { job_id, task_id } => {
                // Side channel: doesn't touch watch state.
                tokio::spawn(preview::send_image_preview(
                    Arc::clone(&self.farm),
                    self.tx.clone(),
                    job_id,
                    task_id,
                ));
            }
        }
    }

    /// Push a message; a closed peer cancels the whole session.
    fn send(&self, message: ServerMessage) -> bool {
        if self.tx.send(message).is_err() {
            self.cancel.cancel();
            return false;
        }
        true
    }

    /// Subscribe to a list category and send its full snapshot.
    async fn watch_list(&self, kind: JobListKind) {
        let snapshot = match self.farm.list_snapshot(kind).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(category = %kind, error = %e, "List fetch failed");
                return;
            }
        };

        let mut inner = self.inner.lock().await;
        match &mut inner.mode {
            WatchMode::Lists(subscribed) => {
                if !subscribed.contains(&kind) {
                    subscribed.push(kind);
                }
            }
            _ => inner.mode = WatchMode::Lists(vec![kind]),
        }
        inner.last_detail = None;

        if self.send(ServerMessage::list(kind, snapshot.clone(), false)) {
            inner.last_sent.insert(kind.as_str().to_string(), snapshot);
            self.ensure_loop_started(&mut inner);
        }
    }

    /// Switch to watching a single job and send its full snapshot.
    async fn watch_detail(&self, job_id: String) {
        // The frontend sends the literal string "undefined" while its
        // router is still resolving; nothing useful to do with it.
        if job_id == "undefined" {
            tracing::debug!("Ignoring job details request without a job id");
            return;
        }

        match self.farm.job_snapshot(&job_id).await {
            Ok(snapshot) => {
                let data = snapshot.to_map();
                let mut inner = self.inner.lock().await;
                inner.mode = WatchMode::Detail(job_id.clone());

                let sent = self.send(ServerMessage::JobDetails {
                    data: data.clone(),
                    update: false,
                });
                if sent {
                    inner.last_sent.insert(DETAIL_KEY.to_string(), data);
                    inner.last_detail = Some(snapshot.clone());
                    self.ensure_loop_started(&mut inner);
                    drop(inner);
                    self.spawn_commentary(job_id, snapshot);
                }
            }
            Err(DeadlineError::InvalidJobId(_)) => {
                let mut inner = self.inner.lock().await;
                inner.mode = WatchMode::Uninitialized;
                inner.last_detail = None;
                drop(inner);
                self.send(ServerMessage::invalid_job_id());
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Job detail fetch failed");
            }
        }
    }

    /// Spawn the background refresh loop the first time data is sent.
    fn ensure_loop_started(&self, inner: &mut SessionInner) {
        if inner.loop_started {
            return;
        }
        inner.loop_started = true;
        let session = self.clone();
        tokio::spawn(async move { session.refresh_loop().await });
    }

    /// Periodically re-fetch whatever the session watches and push diffs.
    async fn refresh_loop(self) {
        loop {
            let interval = match &self.inner.lock().await.mode {
                WatchMode::Detail(_) => DETAIL_REFRESH_INTERVAL,
                _ => LIST_REFRESH_INTERVAL,
            };

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }

            let mode = self.inner.lock().await.mode.clone();
            match mode {
                WatchMode::Uninitialized => {}
                WatchMode::Lists(subscribed) => {
                    for kind in subscribed {
                        self.push_list_update(kind).await;
                        if self.cancel.is_cancelled() {
                            return;
                        }
                    }
                }
                WatchMode::Detail(job_id) => {
                    self.push_detail_update(&job_id).await;
                    if self.cancel.is_cancelled() {
                        return;
                    }
                }
            }
        }
    }

    /// One list-category refresh cycle: fetch, diff, push if changed.
    async fn push_list_update(&self, kind: JobListKind) {
        let fresh = match self.farm.list_snapshot(kind).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(category = %kind, error = %e, "List refresh failed");
                return;
            }
        };

        let mut inner = self.inner.lock().await;
        // The client may have navigated away while the fetch was in flight.
        let still_subscribed =
            matches!(&inner.mode, WatchMode::Lists(subscribed) if subscribed.contains(&kind));
        if !still_subscribed {
            return;
        }

        let key = kind.as_str();
        let changes = match inner.last_sent.get(key) {
            Some(previous) => diff(previous, &fresh),
            None => fresh.clone(),
        };

        if !changes.is_empty() && !self.send(ServerMessage::list(kind, changes, true)) {
            return;
        }
        // Baseline advances even when nothing was pushed, so a value that
        // flips and flips back doesn't resurface later.
        inner.last_sent.insert(key.to_string(), fresh);
    }

    /// One detail refresh cycle: fetch fresh, diff, push, re-classify.
    async fn push_detail_update(&self, job_id: &str) {
        let fresh = match self.farm.job_snapshot(job_id).await {
            Ok(snapshot) => snapshot,
            Err(DeadlineError::InvalidJobId(_)) => {
                // Job deleted while being watched; keep the page as-is.
                tracing::debug!(job_id = %job_id, "Watched job no longer exists");
                return;
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Detail refresh failed");
                return;
            }
        };

        let fresh_map = fresh.to_map();
        let mut inner = self.inner.lock().await;
        if inner.mode != WatchMode::Detail(job_id.to_string()) {
            return;
        }

        let changes = match inner.last_sent.get(DETAIL_KEY) {
            Some(previous) => diff(previous, &fresh_map),
            None => fresh_map.clone(),
        };

        if !changes.is_empty() {
            let sent = self.send(ServerMessage::JobDetails {
                data: changes,
                update: true,
            });
            if !sent {
                return;
            }
        }

        // A job that starts erroring or failing while watched gets fresh
        // commentary for its new category.
        let needs_commentary = match &inner.last_detail {
            Some(previous) => {
                (previous.job.errors == 0 && fresh.job.errors != 0)
                    || (previous.job.failed == 0 && fresh.job.failed != 0)
            }
            None => false,
        };

        inner.last_sent.insert(DETAIL_KEY.to_string(), fresh_map);
        inner.last_detail = Some(fresh.clone());
        drop(inner);

        if needs_commentary {
            self.spawn_commentary(job_id.to_string(), fresh);
        }
    }

    /// Generate commentary off the push cycle; the session doesn't wait.
    fn spawn_commentary(&self, job_id: String, snapshot: JobDetailSnapshot) {
        let engine = Arc::clone(&self.commentary);
        let farm = Arc::clone(&self.farm);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            engine.narrate(farm, tx, job_id, snapshot).await;
        });
    }
}
