//! Live channel endpoints
//!
//! `GET /api/init` opens the caller's event stream. The first event is
//! `init` with the full library; after that the stream forwards whatever
//! the registry queues for the user. A user that already has a stream open
//! gets a single `error` event with key `already_connected` instead.

use crate::api::sse::{envelope_event, keep_alive};
use crate::auth::CurrentUser;
use crate::services::channels::ALREADY_CONNECTED_KEY;
use crate::{ApiResult, AppState};
use audy_common::events::{AudyEvent, InitData};
use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::{debug, info};

/// GET /api/init
pub async fn open_channel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let opened = state.channels.open(user.id);

    let init = match &opened {
        Ok(_) => Some(AudyEvent::Init(InitData {
            tracks: state.catalog.list_tracks().await?,
            user: user.clone(),
        })),
        Err(e) => {
            info!(user_id = user.id, "Rejected second channel: {}", e);
            None
        }
    };

    let stream = async_stream::stream! {
        match opened {
            Err(e) => {
                let event = AudyEvent::error(ALREADY_CONNECTED_KEY, e.to_string());
                if let Some(sse) = envelope_event(event.to_payload(), event.event_type()) {
                    yield Ok(sse);
                }
            }
            Ok(mut handle) => {
                if let Some(init) = init {
                    if let Some(sse) = envelope_event(init.to_payload(), init.event_type()) {
                        yield Ok(sse);
                    }
                }

                while let Some(event) = handle.recv().await {
                    debug!(user_id = handle.user_id(), event = event.event_type(), "SSE: forwarding");
                    if let Some(sse) = envelope_event(event.to_payload(), event.event_type()) {
                        yield Ok(sse);
                    }
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(keep_alive()))
}

/// POST /api/closech
pub async fn close_channel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<Value> {
    let closed = state.channels.close(user.id);
    Json(json!({ "closed": closed }))
}

/// Build live channel routes
pub fn channel_routes() -> Router<AppState> {
    Router::new()
        .route("/api/init", get(open_channel))
        .route("/api/closech", post(close_channel))
}
