//! Batch ingestion of the server-side drop folder
//!
//! Every `*.mp3` in `upload/ftp_upload` is ingested in name order. The
//! requesting user gets `ftpu_*` progress events; every successful track is
//! announced to everyone with `track_add`. Only one batch runs at a time.

use crate::services::channels::ChannelRegistry;
use crate::services::ingest::{IngestError, TrackIngestor};
use audy_common::events::AudyEvent;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("A batch upload is already in process")]
    AlreadyRunning,

    #[error("Failed to read drop folder: {0}")]
    ReadDir(#[from] std::io::Error),

    #[error("No files to upload")]
    NoFiles,
}

impl BatchError {
    pub fn key(&self) -> &'static str {
        match self {
            BatchError::AlreadyRunning => "ftp_upload_already_in_process",
            BatchError::ReadDir(_) => "ftp_upload_dir_read",
            BatchError::NoFiles => "ftp_upload_no_files",
        }
    }
}

/// Per-run counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct BatchUpload {
    running: Arc<AtomicBool>,
    ingestor: Arc<TrackIngestor>,
    channels: ChannelRegistry,
}

/// Clears the running flag however the batch task ends
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl BatchUpload {
    pub fn new(ingestor: Arc<TrackIngestor>, channels: ChannelRegistry) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            ingestor,
            channels,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start a batch for `user_id`, returning the number of candidates
    ///
    /// The files are processed on a background task.
    pub fn start(&self, user_id: i64) -> Result<(usize, JoinHandle<BatchSummary>), BatchError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BatchError::AlreadyRunning);
        }
        let guard = RunningGuard(Arc::clone(&self.running));

        let files = self.candidates()?;
        if files.is_empty() {
            return Err(BatchError::NoFiles);
        }

        let count = files.len();
        self.channels
            .send_to(user_id, AudyEvent::FtpuStart { files: count });
        info!(user_id, files = count, "Batch upload started");

        let batch = self.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            batch.run(user_id, files).await
        });

        Ok((count, handle))
    }

    fn candidates(&self) -> std::io::Result<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(self.ingestor.library().batch_dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.to_lowercase().ends_with(".mp3") {
                files.push((name, entry.path()));
            }
        }
        files.sort();
        Ok(files)
    }

    async fn run(&self, user_id: i64, files: Vec<(String, PathBuf)>) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for (file_name, path) in files {
            let (success, key) = match self.ingestor.ingest(&path, &file_name).await {
                Ok(track) => {
                    self.channels.broadcast(AudyEvent::TrackAdd { track });
                    summary.processed += 1;
                    (true, String::new())
                }
                Err(e) => {
                    if matches!(e, IngestError::Duplicate(_)) {
                        if let Err(remove) = tokio::fs::remove_file(&path).await {
                            warn!(file = %file_name, error = %remove, "Failed to remove duplicate");
                        }
                    }
                    warn!(file = %file_name, error = %e, "Batch file failed");
                    summary.failed += 1;
                    (false, e.key().to_string())
                }
            };

            self.channels.send_to(
                user_id,
                AudyEvent::FtpuFileProcessed {
                    file_name,
                    key,
                    success,
                },
            );
        }

        self.channels.send_to(user_id, AudyEvent::FtpuDone);
        info!(
            user_id,
            processed = summary.processed,
            failed = summary.failed,
            "Batch upload finished"
        );
        summary
    }
}
