//! Track catalog
//!
//! The ingestion pipeline, the admin edit endpoints and the startup
//! reconciliation only talk to the catalog through [`Catalog`], so tests
//! can swap in failing or recording implementations.

use audy_common::{Result, Track};
use sqlx::SqlitePool;

#[axum::async_trait]
pub trait Catalog: Send + Sync {
    /// Look a track up by content id
    async fn find_track_by_hash(&self, hash: &str) -> Result<Option<Track>>;

    /// Insert a new track record; an existing content id is an error
    async fn insert_track(&self, track: &Track) -> Result<()>;

    /// Insert or replace a track record
    async fn save_track(&self, track: &Track) -> Result<()>;

    /// Delete a track record, returning whether it existed
    async fn delete_track(&self, hash: &str) -> Result<bool>;

    /// All tracks, newest first
    async fn list_tracks(&self) -> Result<Vec<Track>>;
}

/// SQLite-backed catalog over the `music` table
#[derive(Clone)]
pub struct SqliteCatalog {
    db: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[axum::async_trait]
impl Catalog for SqliteCatalog {
    async fn find_track_by_hash(&self, hash: &str) -> Result<Option<Track>> {
        let track = sqlx::query_as::<_, Track>(
            r#"
            SELECT hash, artist, title, has_image, lyrics, timestamp, duration
            FROM music
            WHERE hash = ?
            "#,
        )
        .bind(hash)
        .fetch_optional(&self.db)
        .await?;

        Ok(track)
    }

    async fn insert_track(&self, track: &Track) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO music (hash, artist, title, has_image, lyrics, timestamp, duration)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&track.hash)
        .bind(&track.artist)
        .bind(&track.title)
        .bind(track.has_image)
        .bind(&track.lyrics)
        .bind(track.timestamp)
        .bind(track.duration)
        .execute(&self.db)
        .await?;

        tracing::debug!(hash = %track.hash, "Inserted track");
        Ok(())
    }

    async fn save_track(&self, track: &Track) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO music (hash, artist, title, has_image, lyrics, timestamp, duration)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(hash) DO UPDATE SET
                artist = excluded.artist,
                title = excluded.title,
                has_image = excluded.has_image,
                lyrics = excluded.lyrics,
                timestamp = excluded.timestamp,
                duration = excluded.duration
            "#,
        )
        .bind(&track.hash)
        .bind(&track.artist)
        .bind(&track.title)
        .bind(track.has_image)
        .bind(&track.lyrics)
        .bind(track.timestamp)
        .bind(track.duration)
        .execute(&self.db)
        .await?;

        tracing::debug!(hash = %track.hash, "Saved track");
        Ok(())
    }

    async fn delete_track(&self, hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM music WHERE hash = ?")
            .bind(hash)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_tracks(&self) -> Result<Vec<Track>> {
        let tracks = sqlx::query_as::<_, Track>(
            r#"
            SELECT hash, artist, title, has_image, lyrics, timestamp, duration
            FROM music
            ORDER BY timestamp DESC, hash
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(tracks)
    }
}
