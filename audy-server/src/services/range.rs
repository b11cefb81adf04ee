//! Single-range partial content for audio playback
//!
//! Each response carries at most `chunk_size` bytes; players follow up with
//! further range requests as they buffer.

use axum::body::Body;
use std::io::SeekFrom;
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Upper bound of the read-ahead buffer for a range body
pub const STREAM_BUFFER_SIZE: usize = 48_000;

/// A parsed `Range: bytes=...` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=start-` or `bytes=start-end` (end inclusive)
    From { start: u64, end: Option<u64> },
    /// `bytes=-len`: the last `len` bytes
    Suffix(u64),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("Malformed range header: {0}")]
    Malformed(String),

    #[error("Range not satisfiable for {size} bytes")]
    NotSatisfiable { size: u64 },
}

/// Parse a single `bytes=` range
pub fn parse_range(header: &str) -> Result<ByteRange, RangeError> {
    let malformed = || RangeError::Malformed(header.to_string());

    let range_set = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(malformed)?
        .trim();
    if range_set.contains(',') {
        return Err(malformed());
    }

    let (start, end) = range_set.split_once('-').ok_or_else(malformed)?;
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        let len: u64 = end.parse().map_err(|_| malformed())?;
        return Ok(ByteRange::Suffix(len));
    }

    let start: u64 = start.parse().map_err(|_| malformed())?;
    let end = if end.is_empty() {
        None
    } else {
        let end: u64 = end.parse().map_err(|_| malformed())?;
        if start > end {
            return Err(malformed());
        }
        Some(end)
    };

    Ok(ByteRange::From { start, end })
}

/// Resolved byte span of one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePlan {
    pub start: u64,
    /// Inclusive
    pub end: u64,
    pub file_size: u64,
    pub buffer_size: usize,
}

impl RangePlan {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.file_size)
    }
}

/// Clamp a requested range to the file and to `chunk_size`
pub fn plan(range: ByteRange, file_size: u64, chunk_size: u64) -> Result<RangePlan, RangeError> {
    let not_satisfiable = RangeError::NotSatisfiable { size: file_size };
    if file_size == 0 {
        return Err(not_satisfiable);
    }
    let last = file_size - 1;

    let (start, end) = match range {
        ByteRange::From { start, end } => {
            if start > last {
                return Err(not_satisfiable);
            }
            (start, end.map_or(last, |end| end.min(last)))
        }
        ByteRange::Suffix(0) => return Err(not_satisfiable),
        ByteRange::Suffix(len) => (file_size.saturating_sub(len), last),
    };

    let chunk_size = chunk_size.max(1);
    let end = end.min(start.saturating_add(chunk_size - 1));
    let span = end - start + 1;

    Ok(RangePlan {
        start,
        end,
        file_size,
        buffer_size: span.min(STREAM_BUFFER_SIZE as u64) as usize,
    })
}

/// Stream exactly the planned span of `path`
pub async fn range_body(path: &Path, plan: &RangePlan) -> std::io::Result<Body> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(plan.start)).await?;

    let reader = file.take(plan.len());
    Ok(Body::from_stream(ReaderStream::with_capacity(
        reader,
        plan.buffer_size,
    )))
}
