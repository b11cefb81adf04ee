//! On-disk library layout
//!
//! ```text
//! <root>/storage.db
//! <root>/music/<content-id>/track
//! <root>/music/<content-id>/image.jpg
//! <root>/upload/              multipart upload spool
//! <root>/upload/import/       remote import downloads
//! <root>/upload/ftp_upload/   batch drop folder
//! ```
//!
//! A track directory only ever appears under its final name through a
//! single rename of a fully written staging directory.

use crate::catalog::Catalog;
use crate::services::content_hash::is_content_id;
use audy_common::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DATABASE_FILE: &str = "storage.db";
pub const TRACK_FILE: &str = "track";
pub const IMAGE_FILE: &str = "image.jpg";
const STAGING_PREFIX: &str = ".staging-";

#[derive(Debug, Clone)]
pub struct LibraryStore {
    root: PathBuf,
}

/// Counts reported by [`LibraryStore::reconcile`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub missing_files: usize,
    pub orphan_dirs: usize,
}

impl LibraryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn music_dir(&self) -> PathBuf {
        self.root.join("music")
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.root.join("upload")
    }

    pub fn import_dir(&self) -> PathBuf {
        self.upload_dir().join("import")
    }

    pub fn batch_dir(&self) -> PathBuf {
        self.upload_dir().join("ftp_upload")
    }

    pub fn track_dir(&self, hash: &str) -> PathBuf {
        self.music_dir().join(hash)
    }

    pub fn track_path(&self, hash: &str) -> PathBuf {
        self.track_dir(hash).join(TRACK_FILE)
    }

    pub fn image_path(&self, hash: &str) -> PathBuf {
        self.track_dir(hash).join(IMAGE_FILE)
    }

    /// Create every directory of the layout
    pub fn ensure_layout(&self) -> io::Result<()> {
        for dir in [
            self.music_dir(),
            self.upload_dir(),
            self.import_dir(),
            self.batch_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Move `source` into a fresh staging directory for `hash`
    ///
    /// The returned [`StagedTrack`] removes the staging directory when
    /// dropped without being committed.
    pub fn stage_track(&self, source: &Path, hash: &str) -> io::Result<StagedTrack> {
        let music = self.music_dir();
        fs::create_dir_all(&music)?;

        let dir = music.join(format!("{}{}-{}", STAGING_PREFIX, hash, Uuid::new_v4()));
        fs::create_dir(&dir)?;

        let staged = StagedTrack {
            dir,
            final_dir: self.track_dir(hash),
            committed: false,
        };
        move_file(source, &staged.track_path())?;
        Ok(staged)
    }

    /// Delete a track directory; a missing directory is not an error
    pub fn remove_track_dir(&self, hash: &str) -> io::Result<()> {
        match fs::remove_dir_all(self.track_dir(hash)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Align catalog and storage tree
    ///
    /// Rows whose `track` file is gone are deleted, then every `music/*`
    /// entry without a row (including abandoned staging directories) is
    /// removed.
    pub async fn reconcile(&self, catalog: &dyn Catalog) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        let tracks = catalog.list_tracks().await?;
        let mut known = std::collections::HashSet::with_capacity(tracks.len());
        for track in tracks {
            if self.track_path(&track.hash).is_file() {
                known.insert(track.hash);
                continue;
            }
            warn!(hash = %track.hash, "Track file missing, removing catalog entry");
            catalog.delete_track(&track.hash).await?;
            report.missing_files += 1;
        }

        let entries = match fs::read_dir(self.music_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_content_id(&name) && known.contains(&name) {
                continue;
            }

            let path = entry.path();
            debug!(path = %path.display(), "Removing unreferenced storage entry");
            let removed = if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match removed {
                Ok(()) => report.orphan_dirs += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove orphan"),
            }
        }

        info!(
            missing_files = report.missing_files,
            orphan_dirs = report.orphan_dirs,
            "Library reconciled"
        );
        Ok(report)
    }
}

/// A track file parked under a staging name
#[derive(Debug)]
pub struct StagedTrack {
    dir: PathBuf,
    final_dir: PathBuf,
    committed: bool,
}

impl StagedTrack {
    pub fn track_path(&self) -> PathBuf {
        self.dir.join(TRACK_FILE)
    }

    pub fn image_path(&self) -> PathBuf {
        self.dir.join(IMAGE_FILE)
    }

    /// Publish the staging directory under its content id
    ///
    /// A directory already holding that id is replaced.
    pub fn commit(mut self) -> io::Result<PathBuf> {
        if self.final_dir.exists() {
            warn!(dir = %self.final_dir.display(), "Replacing stale track directory");
            fs::remove_dir_all(&self.final_dir)?;
        }
        fs::rename(&self.dir, &self.final_dir)?;
        self.committed = true;
        Ok(self.final_dir.clone())
    }
}

impl Drop for StagedTrack {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_dir_all(&self.dir) {
                warn!(dir = %self.dir.display(), error = %e, "Failed to remove staging directory");
            }
        }
    }
}

/// Rename, falling back to copy + delete across filesystems
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(error = %rename_err, "Rename failed, copying instead");
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}
