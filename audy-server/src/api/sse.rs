//! Shared Server-Sent Events plumbing
//!
//! Payloads go out as unnamed (`message`) events whose data is the
//! `{type, data}` JSON envelope.

use axum::response::sse::{Event, KeepAlive};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Wrap a serialized envelope, logging and skipping serialization failures
pub fn envelope_event(payload: serde_json::Result<Value>, event_type: &str) -> Option<Event> {
    match payload {
        Ok(value) => Some(Event::default().data(value.to_string())),
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
            None
        }
    }
}

pub fn keep_alive() -> KeepAlive {
    KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat")
}
