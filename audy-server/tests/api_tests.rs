//! HTTP surface tests driven through the router with `oneshot`

mod helpers;

use audy_common::events::AudyEvent;
use audy_common::Track;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use helpers::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

const BOUNDARY: &str = "audy-test-boundary";

async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("Response is JSON")
}

fn json_post(builder: axum::http::request::Builder, uri: &str, body: Value) -> Request<Body> {
    builder
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_upload(builder: axum::http::request::Builder, file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"track\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: audio/mpeg\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    builder
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn upload(env: &TestEnv, file_name: &str, data: &[u8]) -> Response {
    env.router()
        .oneshot(multipart_upload(admin_request(), file_name, data))
        .await
        .unwrap()
}

async fn seeded_track(env: &TestEnv, seed: u8) -> Track {
    let response = upload(env, "Seeded Artist - Seeded Title.mp3", &mp3_bytes(12, seed)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Store a raw file of `size` bytes under a valid track id
fn store_raw_track(env: &TestEnv, size: usize) -> String {
    let hash = "ab".repeat(32);
    let path = env.library().track_path(&hash);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    hash
}

fn header_str<'a>(response: &'a Response, name: header::HeaderName) -> &'a str {
    response
        .headers()
        .get(name)
        .expect("Header present")
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let env = create_test_env().await;

    let response = env
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "audy-server");
    assert_eq!(json["connected_channels"], 0);
    assert_eq!(json["batch_running"], false);
}

#[tokio::test]
async fn test_unknown_session_is_unauthorized() {
    let env = create_test_env().await;

    let response = env
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/import/status")
                .header(header::COOKIE, "theme=dark; session_hash=bogus")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_mutations_require_admin() {
    let env = create_test_env().await;

    let response = env
        .router()
        .oneshot(multipart_upload(user_request(), "A - B.mp3", &mp3_bytes(5, 1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = env
        .router()
        .oneshot(json_post(
            user_request(),
            "/api/removetracks",
            json!({ "hashes": ["ab".repeat(32)] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_upload_then_duplicate_conflicts() {
    let env = create_test_env().await;
    let mut channel = env.state.channels.open(env.listener.id).unwrap();

    let response = upload(&env, "Daft Punk - Veridis Quo.mp3", &mp3_bytes(20, 3)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let track: Track = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(track.artist, "Daft Punk");
    assert_eq!(track.title, "Veridis Quo");
    assert_eq!(
        channel.recv().await,
        Some(AudyEvent::TrackAdd {
            track: track.clone()
        })
    );

    let response = upload(&env, "Someone - Else.mp3", &mp3_bytes(20, 3)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"]["code"], "DUPLICATE");

    let spooled = std::fs::read_dir(env.library().upload_dir())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .count();
    assert_eq!(spooled, 0, "Upload spool files must not linger");
}

#[tokio::test]
async fn test_upload_rejects_non_audio() {
    let env = create_test_env().await;

    let response = upload(&env, "readme.mp3", b"hello there").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"]["code"],
        "NOT_SUPPORTED_FORMAT"
    );
}

#[tokio::test]
async fn test_update_track_and_lyrics_broadcast() {
    let env = create_test_env().await;
    let track = seeded_track(&env, 4).await;
    let mut channel = env.state.channels.open(env.listener.id).unwrap();

    let response = env
        .router()
        .oneshot(json_post(
            admin_request(),
            "/api/updatetrack",
            json!({ "hash": track.hash, "artist": " Renamed ", "title": "Retitled" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["artist"], "Renamed");

    let response = env
        .router()
        .oneshot(json_post(
            admin_request(),
            "/api/setlyrics",
            json!({ "hash": track.hash, "lyrics": "la la la" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        channel.recv().await,
        Some(AudyEvent::TrackUpdate {
            hash: track.hash.clone(),
            title: "Retitled".to_string(),
            artist: "Renamed".to_string(),
        })
    );
    assert_eq!(
        channel.recv().await,
        Some(AudyEvent::TrackLyrics {
            hash: track.hash.clone(),
            lyrics: "la la la".to_string(),
        })
    );

    let stored = env
        .state
        .catalog
        .find_track_by_hash(&track.hash)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Retitled");
    assert_eq!(stored.lyrics, "la la la");
}

#[tokio::test]
async fn test_update_unknown_track_is_not_found() {
    let env = create_test_env().await;

    let response = env
        .router()
        .oneshot(json_post(
            admin_request(),
            "/api/updatetrack",
            json!({ "hash": "cd".repeat(32), "artist": "A", "title": "B" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_tracks_skips_unknown() {
    let env = create_test_env().await;
    let track = seeded_track(&env, 5).await;
    let mut channel = env.state.channels.open(env.listener.id).unwrap();

    let response = env
        .router()
        .oneshot(json_post(
            admin_request(),
            "/api/removetracks",
            json!({ "hashes": [track.hash, "ef".repeat(32), "not-a-hash"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["removed"], json!([track.hash]));

    assert_eq!(
        channel.recv().await,
        Some(AudyEvent::TracksRemove {
            hashes: vec![track.hash.clone()]
        })
    );
    assert!(!env.library().track_dir(&track.hash).exists());
    assert!(env.state.catalog.list_tracks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stream_open_ended_range() {
    let env = create_test_env().await;
    let hash = store_raw_track(&env, 1_000_000);

    let response = env
        .router()
        .oneshot(
            user_request()
                .uri(format!("/music/{}", hash))
                .header(header::RANGE, "bytes=500000-")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "audio/mpeg");
    assert_eq!(header_str(&response, header::ACCEPT_RANGES), "bytes");
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        "bytes 500000-999999/1000000"
    );
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), "500000");

    let body = body_bytes(response).await;
    assert_eq!(body.len(), 500_000);
    assert_eq!(body[0], (500_000 % 251) as u8);
}

#[tokio::test]
async fn test_stream_without_range_returns_first_chunk() {
    let env = create_test_env().await;
    let hash = store_raw_track(&env, 1_000_000);

    let response = env
        .router()
        .oneshot(user_get(&format!("/music/{}", hash)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        "bytes 0-511999/1000000"
    );
    assert_eq!(body_bytes(response).await.len(), 512_000);
}

#[tokio::test]
async fn test_stream_range_beyond_end() {
    let env = create_test_env().await;
    let hash = store_raw_track(&env, 1000);

    let response = env
        .router()
        .oneshot(
            user_request()
                .uri(format!("/music/{}", hash))
                .header(header::RANGE, "bytes=1000-")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header_str(&response, header::CONTENT_RANGE), "bytes */1000");
}

#[tokio::test]
async fn test_stream_malformed_range() {
    let env = create_test_env().await;
    let hash = store_raw_track(&env, 1000);

    let response = env
        .router()
        .oneshot(
            user_request()
                .uri(format!("/music/{}", hash))
                .header(header::RANGE, "bytes=0-10,20-30")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stream_unknown_or_invalid_id() {
    let env = create_test_env().await;

    for uri in [format!("/music/{}", "12".repeat(32)), "/music/..%2Fstorage.db".to_string()] {
        let response = env.router().oneshot(user_get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri {}", uri);
    }
}

#[tokio::test]
async fn test_download_uses_display_name() {
    let env = create_test_env().await;
    let track = seeded_track(&env, 6).await;

    let response = env
        .router()
        .oneshot(user_get(&format!("/download/{}", track.hash)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(header_str(&response, header::CONTENT_DISPOSITION)
        .starts_with("attachment; filename=\"Seeded Artist - Seeded Title.mp3\""));
    assert_eq!(body_bytes(response).await, mp3_bytes(12, 6));
}

#[tokio::test]
async fn test_album_image_missing_is_not_found() {
    let env = create_test_env().await;
    let track = seeded_track(&env, 7).await;
    assert!(!track.has_image);

    let response = env
        .router()
        .oneshot(user_get(&format!("/api/albumimage/{}", track.hash)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_import_endpoints_require_admin() {
    let env = create_test_env().await;

    let response = env
        .router()
        .oneshot(json_post(
            user_request(),
            "/api/import/enqueue",
            json!({ "jobs": [{ "id": "j1", "title": "T", "artist": "A", "url": "http://x" }] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(env.state.imports.snapshot(env.listener.id).pending.is_empty());

    let response = env
        .router()
        .oneshot(json_post(
            user_request(),
            "/api/import/dequeue",
            json!({ "id": "j1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    for uri in ["/api/import/status", "/api/import/queue"] {
        let response = env.router().oneshot(user_get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "FORBIDDEN");
    }
}

#[tokio::test]
async fn test_import_endpoints() {
    let env = create_test_env().await;

    let response = env
        .router()
        .oneshot(json_post(
            admin_request(),
            "/api/import/enqueue",
            json!({ "jobs": [{ "id": "", "title": "T", "artist": "A", "url": "http://x" }] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = env
        .router()
        .oneshot(json_post(
            admin_request(),
            "/api/import/dequeue",
            json!({ "id": "missing" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = env
        .router()
        .oneshot(
            admin_request()
                .uri("/api/import/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["running"], false);
    assert_eq!(json["pending"], json!([]));
    assert!(json["active"].is_null());
}

#[tokio::test]
async fn test_ftp_upload_with_empty_folder() {
    let env = create_test_env().await;

    let response = env
        .router()
        .oneshot(
            admin_request()
                .method("POST")
                .uri("/api/ftp_upload")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"]["code"],
        "FTP_UPLOAD_NO_FILES"
    );
}
