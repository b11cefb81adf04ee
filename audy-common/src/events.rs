//! Event types for the Audy live-update system
//!
//! Every event travels as a tagged object `{"type": ..., "data": ...}`.
//! `data` is `null` for events that carry no payload. Clients ignore types
//! they do not recognise, and so does [`AudyEvent`] on deserialization
//! (see [`AudyEvent::Unknown`]).

use crate::models::{Track, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of the first event on a freshly opened channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitData {
    /// Full library listing at connection time
    pub tracks: Vec<Track>,
    /// The user owning the channel
    pub user: User,
}

/// Events delivered over a user's live channel
///
/// Library events (`track_add`, `track_update`, `track_lyrics`,
/// `tracks_remove`) are broadcast to every connected user. Channel control
/// events (`init`, `kick`, `destroy`, `error`) and batch upload progress
/// (`ftpu_*`) target a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AudyEvent {
    /// Library snapshot sent once when a channel opens
    Init(InitData),

    /// A track was ingested
    TrackAdd { track: Track },

    /// Artist/title of a track were edited
    TrackUpdate {
        hash: String,
        title: String,
        artist: String,
    },

    /// Lyrics of a track were edited
    TrackLyrics { hash: String, lyrics: String },

    /// Tracks were deleted from the library
    TracksRemove { hashes: Vec<String> },

    /// The user was removed or forcibly logged out
    Kick,

    /// The channel is being closed by request
    Destroy,

    /// Channel-level failure (e.g. `already_connected`)
    Error { key: String, message: String },

    /// Batch upload started with `files` candidates
    FtpuStart { files: usize },

    /// One file of a batch upload finished
    FtpuFileProcessed {
        #[serde(rename = "fileName")]
        file_name: String,
        key: String,
        success: bool,
    },

    /// Batch upload finished
    FtpuDone,

    /// Any event type this build does not know about
    #[serde(other)]
    Unknown,
}

impl AudyEvent {
    /// Wire name of the event, as found in the `type` field
    pub fn event_type(&self) -> &'static str {
        match self {
            AudyEvent::Init(_) => "init",
            AudyEvent::TrackAdd { .. } => "track_add",
            AudyEvent::TrackUpdate { .. } => "track_update",
            AudyEvent::TrackLyrics { .. } => "track_lyrics",
            AudyEvent::TracksRemove { .. } => "tracks_remove",
            AudyEvent::Kick => "kick",
            AudyEvent::Destroy => "destroy",
            AudyEvent::Error { .. } => "error",
            AudyEvent::FtpuStart { .. } => "ftpu_start",
            AudyEvent::FtpuFileProcessed { .. } => "ftpu_file_processed",
            AudyEvent::FtpuDone => "ftpu_done",
            AudyEvent::Unknown => "unknown",
        }
    }

    /// Channel error event
    pub fn error(key: impl Into<String>, message: impl Into<String>) -> Self {
        AudyEvent::Error {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Serialize into the `{type, data}` envelope
    pub fn to_payload(&self) -> serde_json::Result<Value> {
        envelope(self)
    }
}

/// Outcome and progress events of a user's import queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ImportEvent {
    /// Transfer progress of the active job, whole percent
    Progress { id: String, percent: u8 },

    /// Job fetched and ingested
    Processed { id: String, track: Track },

    /// Job failed or was dequeued mid-transfer (`key == "dequeued"`)
    Error {
        id: String,
        key: String,
        message: String,
    },

    /// Queue drained
    Done,
}

/// Error key reported for a job cancelled while transferring
pub const DEQUEUED_KEY: &str = "dequeued";

impl ImportEvent {
    /// Wire name of the event, as found in the `type` field
    pub fn event_type(&self) -> &'static str {
        match self {
            ImportEvent::Progress { .. } => "progress",
            ImportEvent::Processed { .. } => "processed",
            ImportEvent::Error { .. } => "error",
            ImportEvent::Done => "done",
        }
    }

    /// Id of the job this event refers to, if any
    pub fn job_id(&self) -> Option<&str> {
        match self {
            ImportEvent::Progress { id, .. }
            | ImportEvent::Processed { id, .. }
            | ImportEvent::Error { id, .. } => Some(id),
            ImportEvent::Done => None,
        }
    }

    /// Final outcome for a job (anything but progress)
    pub fn is_outcome(&self) -> bool {
        matches!(self, ImportEvent::Processed { .. } | ImportEvent::Error { .. })
    }

    /// Outcome for a job cancelled mid-transfer
    pub fn dequeued(id: impl Into<String>) -> Self {
        ImportEvent::Error {
            id: id.into(),
            key: DEQUEUED_KEY.to_string(),
            message: String::new(),
        }
    }

    /// Serialize into the `{type, data}` envelope
    pub fn to_payload(&self) -> serde_json::Result<Value> {
        envelope(self)
    }
}

/// Adjacently tagged unit variants omit `data`; the wire format wants `null`.
fn envelope<T: Serialize>(event: &T) -> serde_json::Result<Value> {
    let mut value = serde_json::to_value(event)?;
    if let Value::Object(map) = &mut value {
        map.entry("data").or_insert(Value::Null);
    }
    Ok(value)
}
