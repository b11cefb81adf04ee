//! Library models shared between the catalog, the ingestion pipeline and
//! the event stream.

use serde::{Deserialize, Serialize};

/// A stored track.
///
/// `hash` is the content id of the audio payload and doubles as the name of
/// the track's storage directory. It never changes after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Track {
    pub hash: String,
    pub artist: String,
    pub title: String,
    pub has_image: bool,
    pub lyrics: String,
    /// Creation time, unix seconds
    pub timestamp: i64,
    /// Duration in seconds
    pub duration: f32,
}

impl Track {
    /// Display name used for downloads and log lines
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

/// Authenticated user as seen by the streaming and ingestion layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub login: String,
    pub nickname: String,
    pub is_admin: bool,
}
