//! Per-user remote import queue
//!
//! Jobs are fetched over HTTP one at a time per user, in submission order,
//! then handed to the [`TrackIngestor`]. Outcomes go out on the user's
//! broadcast stream; with nobody listening they are dropped.
//!
//! One worker task runs per user while that user's queue is non-empty. The
//! `running` flag is only read and written under the queue mutex, together
//! with the pending jobs, so an enqueue never races a worker that is about
//! to exit.

use crate::services::channels::ChannelRegistry;
use crate::services::ingest::TrackIngestor;
use audy_common::events::{AudyEvent, ImportEvent};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A remote track to fetch and ingest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: String,
    pub title: String,
    pub artist: String,
    /// Expected duration, seconds
    #[serde(default)]
    pub duration: f32,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// Job was pending and is gone; no outcome will be emitted
    Removed,
    /// Job is transferring; it will finish with a `dequeued` error
    Signalled,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub active: Option<String>,
    pub pending: Vec<ImportJob>,
    pub running: bool,
}

#[derive(Debug, Error)]
enum ImportError {
    #[error("Transfer cancelled")]
    Cancelled,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Remote returned HTTP {0}")]
    Status(u16),

    #[error("Failed to write download: {0}")]
    Write(#[from] std::io::Error),
}

impl ImportError {
    fn key(&self) -> &'static str {
        match self {
            ImportError::Cancelled => audy_common::events::DEQUEUED_KEY,
            ImportError::Request(_) | ImportError::Status(_) => "error_download",
            ImportError::Write(_) => "error_write",
        }
    }
}

struct ActiveJob {
    id: String,
    token: CancellationToken,
}

struct UserQueue {
    pending: VecDeque<ImportJob>,
    active: Option<ActiveJob>,
    running: bool,
    events: broadcast::Sender<ImportEvent>,
}

impl UserQueue {
    fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            pending: VecDeque::new(),
            active: None,
            running: false,
            events,
        }
    }

    /// Claim the worker slot if there is work and no worker
    fn claim_worker(&mut self) -> bool {
        if self.running || self.pending.is_empty() {
            return false;
        }
        self.running = true;
        true
    }
}

/// Import queue tunables
#[derive(Debug, Clone, Copy)]
pub struct ImportSettings {
    /// Delay before each job
    pub pacing: Duration,
    /// Per-user outcome buffer
    pub event_capacity: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            pacing: Duration::from_secs(1),
            event_capacity: 100,
        }
    }
}

struct QueueInner {
    queues: Mutex<HashMap<i64, UserQueue>>,
    http: reqwest::Client,
    ingestor: Arc<TrackIngestor>,
    channels: ChannelRegistry,
    settings: ImportSettings,
}

#[derive(Clone)]
pub struct ImportQueue {
    inner: Arc<QueueInner>,
}

impl ImportQueue {
    pub fn new(
        http: reqwest::Client,
        ingestor: Arc<TrackIngestor>,
        channels: ChannelRegistry,
        settings: ImportSettings,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                queues: Mutex::new(HashMap::new()),
                http,
                ingestor,
                channels,
                settings,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, UserQueue>> {
        self.inner.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_queue<T>(&self, user_id: i64, f: impl FnOnce(&mut UserQueue) -> T) -> T {
        let mut queues = self.lock();
        let queue = queues
            .entry(user_id)
            .or_insert_with(|| UserQueue::new(self.inner.settings.event_capacity));
        f(queue)
    }

    /// Append jobs and make sure a worker is draining them
    pub fn enqueue(&self, user_id: i64, jobs: Vec<ImportJob>) {
        let count = jobs.len();
        let start = self.with_queue(user_id, |queue| {
            queue.pending.extend(jobs);
            queue.claim_worker()
        });

        info!(user_id, jobs = count, "Import jobs enqueued");
        if start {
            self.spawn_worker(user_id);
        }
    }

    /// Remove a pending job or signal the transferring one
    pub fn cancel(&self, user_id: i64, job_id: &str) -> CancelOutcome {
        let mut queues = self.lock();
        let Some(queue) = queues.get_mut(&user_id) else {
            return CancelOutcome::NotFound;
        };

        if let Some(pos) = queue.pending.iter().position(|job| job.id == job_id) {
            queue.pending.remove(pos);
            debug!(user_id, job_id, "Pending import job removed");
            return CancelOutcome::Removed;
        }

        match &queue.active {
            Some(active) if active.id == job_id => {
                active.token.cancel();
                debug!(user_id, job_id, "Active import job signalled");
                CancelOutcome::Signalled
            }
            _ => CancelOutcome::NotFound,
        }
    }

    /// Listen for the user's import outcomes
    ///
    /// Also restarts an idle worker if jobs are waiting.
    pub fn attach(&self, user_id: i64) -> broadcast::Receiver<ImportEvent> {
        let (rx, start) = self.with_queue(user_id, |queue| {
            (queue.events.subscribe(), queue.claim_worker())
        });

        if start {
            self.spawn_worker(user_id);
        }
        rx
    }

    pub fn snapshot(&self, user_id: i64) -> QueueSnapshot {
        let queues = self.lock();
        match queues.get(&user_id) {
            Some(queue) => QueueSnapshot {
                active: queue.active.as_ref().map(|a| a.id.clone()),
                pending: queue.pending.iter().cloned().collect(),
                running: queue.running,
            },
            None => QueueSnapshot {
                active: None,
                pending: Vec::new(),
                running: false,
            },
        }
    }

    fn spawn_worker(&self, user_id: i64) {
        let queue = self.clone();
        tokio::spawn(async move {
            queue.run_worker(user_id).await;
        });
    }

    fn emit(&self, user_id: i64, event: ImportEvent) {
        if let Some(queue) = self.lock().get(&user_id) {
            // Err means no listeners
            let _ = queue.events.send(event);
        }
    }

    async fn run_worker(self, user_id: i64) {
        info!(user_id, "Import worker started");

        loop {
            tokio::time::sleep(self.inner.settings.pacing).await;

            let next = self.with_queue(user_id, |queue| match queue.pending.pop_front() {
                Some(job) => {
                    let token = CancellationToken::new();
                    queue.active = Some(ActiveJob {
                        id: job.id.clone(),
                        token: token.clone(),
                    });
                    Some((job, token))
                }
                None => {
                    queue.active = None;
                    queue.running = false;
                    let _ = queue.events.send(ImportEvent::Done);
                    None
                }
            });

            let Some((job, token)) = next else {
                break;
            };

            let outcome = self.process_job(user_id, &job, &token).await;

            self.with_queue(user_id, |queue| {
                if queue.active.as_ref().is_some_and(|a| a.id == job.id) {
                    queue.active = None;
                }
            });
            self.emit(user_id, outcome);
        }

        info!(user_id, "Import queue drained");
    }

    async fn process_job(&self, user_id: i64, job: &ImportJob, token: &CancellationToken) -> ImportEvent {
        let path = self.download_path(user_id, &job.id);

        if let Err(e) = self.download(user_id, job, &path, token).await {
            remove_quietly(&path).await;
            return match e {
                ImportError::Cancelled => {
                    info!(user_id, job_id = %job.id, "Import job dequeued mid-transfer");
                    ImportEvent::dequeued(&job.id)
                }
                e => {
                    warn!(user_id, job_id = %job.id, error = %e, "Import download failed");
                    ImportEvent::Error {
                        id: job.id.clone(),
                        key: e.key().to_string(),
                        message: e.to_string(),
                    }
                }
            };
        }

        // Past this point the job can no longer be dequeued
        let cancelled = self.with_queue(user_id, |queue| {
            if queue.active.as_ref().is_some_and(|a| a.id == job.id) {
                queue.active = None;
            }
            token.is_cancelled()
        });
        if cancelled {
            remove_quietly(&path).await;
            info!(user_id, job_id = %job.id, "Import job dequeued after transfer");
            return ImportEvent::dequeued(&job.id);
        }

        match self
            .inner
            .ingestor
            .ingest_named(&path, &job.artist, &job.title)
            .await
        {
            Ok(track) => {
                self.inner
                    .channels
                    .broadcast(AudyEvent::TrackAdd { track: track.clone() });
                ImportEvent::Processed {
                    id: job.id.clone(),
                    track,
                }
            }
            Err(e) => {
                remove_quietly(&path).await;
                warn!(user_id, job_id = %job.id, error = %e, "Import ingestion failed");
                ImportEvent::Error {
                    id: job.id.clone(),
                    key: format!("error_{}", e.key()),
                    message: e.to_string(),
                }
            }
        }
    }

    async fn download(
        &self,
        user_id: i64,
        job: &ImportJob,
        path: &Path,
        token: &CancellationToken,
    ) -> Result<(), ImportError> {
        let mut response = tokio::select! {
            _ = token.cancelled() => return Err(ImportError::Cancelled),
            response = self.inner.http.get(&job.url).send() => response?,
        };

        if !response.status().is_success() {
            return Err(ImportError::Status(response.status().as_u16()));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(path).await?;

        let total = response.content_length().filter(|len| *len > 0);
        let mut received: u64 = 0;
        let mut last_percent: Option<u8> = None;

        loop {
            let chunk = tokio::select! {
                _ = token.cancelled() => return Err(ImportError::Cancelled),
                chunk = response.chunk() => chunk?,
            };
            let Some(chunk) = chunk else {
                break;
            };

            file.write_all(&chunk).await?;
            received += chunk.len() as u64;

            if let Some(total) = total {
                let percent = (received.saturating_mul(100) / total).min(100) as u8;
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    self.emit(
                        user_id,
                        ImportEvent::Progress {
                            id: job.id.clone(),
                            percent,
                        },
                    );
                }
            }
        }

        file.flush().await?;
        debug!(user_id, job_id = %job.id, bytes = received, "Import download complete");
        Ok(())
    }

    fn download_path(&self, user_id: i64, job_id: &str) -> PathBuf {
        let safe_id: String = job_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.inner
            .ingestor
            .library()
            .import_dir()
            .join(format!("{}-{}.mp3", user_id, safe_id))
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove import file"),
    }
}
