//! Stored audio and artwork
//!
//! `GET /music/:hash` answers every request with 206 and at most one chunk;
//! a request without a `Range` header is treated as `bytes=0-`.

use crate::auth::CurrentUser;
use crate::services::content_hash::is_content_id;
use crate::services::range::{self, ByteRange};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use tokio_util::io::ReaderStream;

const AUDIO_MIME: &str = "audio/mpeg";

fn checked_hash(hash: &str) -> ApiResult<()> {
    if is_content_id(hash) {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("Track {}", hash)))
    }
}

async fn file_size(path: &std::path::Path, what: &str) -> ApiResult<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        Ok(_) => Err(ApiError::NotFound(what.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound(what.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /music/:hash
pub async fn stream_track(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(hash): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    checked_hash(&hash)?;
    let path = state.library.track_path(&hash);
    let size = file_size(&path, &format!("Track {}", hash)).await?;

    let requested = match headers.get(header::RANGE) {
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| ApiError::BadRequest("Range header is not ASCII".to_string()))?;
            range::parse_range(value)?
        }
        None => ByteRange::From {
            start: 0,
            end: None,
        },
    };
    let plan = range::plan(requested, size, state.settings.chunk_size)?;
    let body = range::range_body(&path, &plan).await?;

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, AUDIO_MIME)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, plan.len())
        .header(header::CONTENT_RANGE, plan.content_range())
        .body(body)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// GET /download/:hash
///
/// Whole file as an attachment named `"<artist> - <title>.mp3"`.
pub async fn download_track(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(hash): Path<String>,
) -> ApiResult<Response> {
    checked_hash(&hash)?;
    let track = state
        .catalog
        .find_track_by_hash(&hash)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Track {}", hash)))?;

    let path = state.library.track_path(&hash);
    let size = file_size(&path, &format!("Track {}", hash)).await?;
    let file = tokio::fs::File::open(&path).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, AUDIO_MIME)
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&format!("{}.mp3", track.display_name())),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// GET /api/albumimage/:hash
pub async fn album_image(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(hash): Path<String>,
) -> ApiResult<Response> {
    checked_hash(&hash)?;
    let path = state.library.image_path(&hash);
    let size = file_size(&path, &format!("Artwork {}", hash)).await?;
    let file = tokio::fs::File::open(&path).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(header::CONTENT_LENGTH, size)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 name
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut encoded = String::with_capacity(file_name.len() * 3);
    for byte in file_name.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

/// Build media routes
pub fn media_routes() -> Router<AppState> {
    Router::new()
        .route("/music/:hash", get(stream_track))
        .route("/download/:hash", get(download_track))
        .route("/api/albumimage/:hash", get(album_image))
}
