//! Library mutation endpoints (admin only)
//!
//! Every successful mutation is broadcast to all open channels.

use crate::auth::AdminUser;
use crate::services::content_hash::is_content_id;
use crate::{ApiError, ApiResult, AppState};
use audy_common::events::AudyEvent;
use audy_common::Track;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// Multipart field carrying the uploaded file
pub const UPLOAD_FIELD: &str = "track";

/// POST /api/upload
///
/// Spools the `track` field to `upload/`, ingests it and announces the new
/// track with `track_add`.
pub async fn upload_track(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Track>)> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("Upload has no file name".to_string()))?;

        let spool = state.library.upload_dir().join(format!("{}.upload", Uuid::new_v4()));
        tokio::fs::create_dir_all(state.library.upload_dir()).await?;

        let written = async {
            let mut file = tokio::fs::File::create(&spool).await?;
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Upload interrupted: {}", e)))?
            {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<_, ApiError>(())
        }
        .await;

        if let Err(e) = written {
            remove_spool(&spool).await;
            return Err(e);
        }

        info!(user_id = user.id, file = %file_name, "Track uploaded");
        return match state.ingestor.ingest(&spool, &file_name).await {
            Ok(track) => {
                state.channels.broadcast(AudyEvent::TrackAdd {
                    track: track.clone(),
                });
                Ok((StatusCode::CREATED, Json(track)))
            }
            Err(e) => {
                remove_spool(&spool).await;
                Err(e.into())
            }
        };
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}

async fn remove_spool(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove upload spool");
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchStarted {
    pub files: usize,
}

/// POST /api/ftp_upload
///
/// Starts ingesting the drop folder in the background. Progress arrives on
/// the caller's channel as `ftpu_*` events.
pub async fn start_batch_upload(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
) -> ApiResult<(StatusCode, Json<BatchStarted>)> {
    let (files, _handle) = state.batch.start(user.id)?;
    Ok((StatusCode::ACCEPTED, Json(BatchStarted { files })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTrackRequest {
    pub hash: String,
    pub artist: String,
    pub title: String,
}

/// POST /api/updatetrack
pub async fn update_track(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(request): Json<UpdateTrackRequest>,
) -> ApiResult<Json<Track>> {
    let artist = request.artist.trim();
    let title = request.title.trim();
    if artist.is_empty() || title.is_empty() {
        return Err(ApiError::BadRequest(
            "Artist and title must not be empty".to_string(),
        ));
    }

    let mut track = find_track(&state, &request.hash).await?;
    track.artist = artist.to_string();
    track.title = title.to_string();
    state.catalog.save_track(&track).await?;

    state.channels.broadcast(AudyEvent::TrackUpdate {
        hash: track.hash.clone(),
        title: track.title.clone(),
        artist: track.artist.clone(),
    });
    Ok(Json(track))
}

#[derive(Debug, Deserialize)]
pub struct SetLyricsRequest {
    pub hash: String,
    pub lyrics: String,
}

/// POST /api/setlyrics
pub async fn set_lyrics(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(request): Json<SetLyricsRequest>,
) -> ApiResult<Json<Track>> {
    let mut track = find_track(&state, &request.hash).await?;
    track.lyrics = request.lyrics;
    state.catalog.save_track(&track).await?;

    state.channels.broadcast(AudyEvent::TrackLyrics {
        hash: track.hash.clone(),
        lyrics: track.lyrics.clone(),
    });
    Ok(Json(track))
}

#[derive(Debug, Deserialize)]
pub struct RemoveTracksRequest {
    pub hashes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RemoveTracksResponse {
    pub removed: Vec<String>,
}

/// POST /api/removetracks
///
/// Unknown hashes are skipped; only removed ones are broadcast.
pub async fn remove_tracks(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Json(request): Json<RemoveTracksRequest>,
) -> ApiResult<Json<RemoveTracksResponse>> {
    let mut removed = Vec::new();

    for hash in request.hashes {
        if !is_content_id(&hash) {
            continue;
        }
        if !state.catalog.delete_track(&hash).await? {
            continue;
        }
        if let Err(e) = state.library.remove_track_dir(&hash) {
            warn!(hash = %hash, error = %e, "Failed to remove track directory");
        }
        removed.push(hash);
    }

    if !removed.is_empty() {
        info!(user_id = user.id, count = removed.len(), "Tracks removed");
        state.channels.broadcast(AudyEvent::TracksRemove {
            hashes: removed.clone(),
        });
    }

    Ok(Json(RemoveTracksResponse { removed }))
}

async fn find_track(state: &AppState, hash: &str) -> ApiResult<Track> {
    if !is_content_id(hash) {
        return Err(ApiError::BadRequest(format!("Invalid track id: {}", hash)));
    }
    state
        .catalog
        .find_track_by_hash(hash)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Track {}", hash)))
}

/// Build library mutation routes
pub fn track_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/upload",
            post(upload_track).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/ftp_upload", post(start_batch_upload))
        .route("/api/updatetrack", post(update_track))
        .route("/api/setlyrics", post(set_lyrics))
        .route("/api/removetracks", post(remove_tracks))
}
