//! Track ingestion pipeline
//!
//! Turns an audio file on local disk into a stored, catalogued track:
//!
//! 1. Header sniff + demuxer probe (MPEG audio only)
//! 2. Content id (SHA-256 of the bytes)
//! 3. Duplicate check against the catalog and concurrent ingestions
//! 4. Duration from the demuxed frames
//! 5. Staged move into `music/<id>/track`
//! 6. Artist/title from the original file name, or given by the caller
//! 7. Artwork from embedded tags
//! 8. Catalog insert
//!
//! Every failure leaves no artifact for the content id behind. The source
//! file is consumed only once the track is staged; on earlier failures it
//! is left where it was and cleanup is up to the caller.

pub mod artwork;
pub mod file_name;
pub mod mpeg;

pub use artwork::ArtworkOptions;
pub use file_name::parse_track_file_name;

use crate::catalog::Catalog;
use crate::services::content_hash;
use crate::services::library::LibraryStore;
use audy_common::Track;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

/// Ingestion failure with a stable, client-facing key
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to open file: {0}")]
    OpenFile(io::Error),

    #[error("Not a supported audio format")]
    NotSupportedFormat,

    #[error("Failed to hash file: {0}")]
    HashFailed(io::Error),

    #[error("Track {0} already exists")]
    Duplicate(String),

    #[error("Catalog lookup failed: {0}")]
    LookupFailed(audy_common::Error),

    #[error("Failed to move track into storage: {0}")]
    MoveFailed(io::Error),

    #[error("Failed to persist track: {0}")]
    PersistFailed(audy_common::Error),
}

impl IngestError {
    pub fn key(&self) -> &'static str {
        match self {
            IngestError::OpenFile(_) => "open_file",
            IngestError::NotSupportedFormat => "not_supported_format",
            IngestError::HashFailed(_) => "hash_failed",
            IngestError::Duplicate(_) => "duplicate",
            IngestError::LookupFailed(_) => "lookup_failed",
            IngestError::MoveFailed(_) => "move_failed",
            IngestError::PersistFailed(_) => "persist_failed",
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> io::Error {
    io::Error::other(format!("blocking task failed: {}", e))
}

/// Content id claimed by a running ingestion, released on drop
struct InFlightClaim<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    hash: String,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.hash);
    }
}

pub struct TrackIngestor {
    catalog: Arc<dyn Catalog>,
    library: LibraryStore,
    artwork: ArtworkOptions,
    /// Content ids between duplicate check and catalog insert
    in_flight: Mutex<HashSet<String>>,
}

impl TrackIngestor {
    pub fn new(catalog: Arc<dyn Catalog>, library: LibraryStore, artwork: ArtworkOptions) -> Self {
        Self {
            catalog,
            library,
            artwork,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn library(&self) -> &LibraryStore {
        &self.library
    }

    /// Ingest `source`, naming the track after `original_file_name`
    pub async fn ingest(&self, source: &Path, original_file_name: &str) -> Result<Track, IngestError> {
        let (artist, title) = parse_track_file_name(original_file_name);
        self.ingest_named(source, &artist, &title).await
    }

    /// Ingest `source` under an explicit artist and title
    pub async fn ingest_named(
        &self,
        source: &Path,
        artist: &str,
        title: &str,
    ) -> Result<Track, IngestError> {
        let source: PathBuf = source.to_path_buf();

        // 1. Format
        let path = source.clone();
        let supported = tokio::task::spawn_blocking(move || mpeg::sniff(&path))
            .await
            .map_err(|e| IngestError::OpenFile(join_error(e)))?
            .map_err(IngestError::OpenFile)?;
        if !supported {
            return Err(IngestError::NotSupportedFormat);
        }

        // 2. Content id
        let path = source.clone();
        let hash = tokio::task::spawn_blocking(move || content_hash::hash_file(&path))
            .await
            .map_err(|e| IngestError::HashFailed(join_error(e)))?
            .map_err(IngestError::HashFailed)?;

        // 3. Duplicates, including ones still being ingested
        let _claim = self.claim(&hash).ok_or_else(|| {
            info!(hash = %hash, artist, title, "Identical track already being ingested");
            IngestError::Duplicate(hash.clone())
        })?;
        match self.catalog.find_track_by_hash(&hash).await {
            Ok(Some(_)) => {
                info!(hash = %hash, artist, title, "Duplicate track rejected");
                return Err(IngestError::Duplicate(hash));
            }
            Ok(None) => {}
            Err(e) => return Err(IngestError::LookupFailed(e)),
        }

        // 4. Duration
        let path = source.clone();
        let duration = tokio::task::spawn_blocking(move || mpeg::measure_duration(&path))
            .await
            .map_err(|e| IngestError::OpenFile(join_error(e)))?
            .map_err(|e| {
                warn!(hash = %hash, error = %e, "Duration pass failed");
                IngestError::NotSupportedFormat
            })?;

        // 5 + 7. Stage, render artwork inside the staging dir, publish
        let library = self.library.clone();
        let artwork = self.artwork;
        let staged_hash = hash.clone();
        let has_image = tokio::task::spawn_blocking(move || -> io::Result<bool> {
            let staged = library.stage_track(&source, &staged_hash)?;
            let has_image =
                artwork::extract_artwork(&staged.track_path(), &staged.image_path(), &artwork);
            staged.commit()?;
            Ok(has_image)
        })
        .await
        .map_err(|e| IngestError::MoveFailed(join_error(e)))?
        .map_err(IngestError::MoveFailed)?;

        let track = Track {
            hash,
            artist: artist.to_string(),
            title: title.to_string(),
            has_image,
            lyrics: String::new(),
            timestamp: chrono::Utc::now().timestamp(),
            duration,
        };

        // 8. Persist
        if let Err(e) = self.catalog.insert_track(&track).await {
            if let Err(cleanup) = self.library.remove_track_dir(&track.hash) {
                warn!(hash = %track.hash, error = %cleanup, "Failed to remove unpersisted track");
            }
            return Err(IngestError::PersistFailed(e));
        }

        info!(
            hash = %track.hash,
            artist = %track.artist,
            title = %track.title,
            duration = track.duration,
            has_image = track.has_image,
            "Track ingested"
        );
        Ok(track)
    }

    fn claim(&self, hash: &str) -> Option<InFlightClaim<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(hash.to_string()) {
            return None;
        }
        Some(InFlightClaim {
            in_flight: &self.in_flight,
            hash: hash.to_string(),
        })
    }
}
