//! Test environment: temp root folder, database, state and seeded users

use audy_common::config::LibraryConfig;
use audy_common::User;
use audy_server::catalog::{Catalog, SqliteCatalog};
use audy_server::services::LibraryStore;
use audy_server::AppState;
use axum::body::Body;
use axum::http::{header, Request};
use std::sync::Arc;
use tempfile::TempDir;

pub const ADMIN_SESSION: &str = "admin-session-token";
pub const USER_SESSION: &str = "listener-session-token";

pub struct TestEnv {
    /// Keeps the root folder alive for the test's duration
    pub root: TempDir,
    pub state: AppState,
    pub admin: User,
    pub listener: User,
}

impl TestEnv {
    pub fn library(&self) -> &LibraryStore {
        &self.state.library
    }

    pub fn router(&self) -> axum::Router {
        audy_server::build_router(self.state.clone())
    }
}

/// Defaults with no import pacing
pub fn fast_settings() -> LibraryConfig {
    LibraryConfig {
        import_pacing_ms: 10,
        ..LibraryConfig::default()
    }
}

pub async fn create_test_env() -> TestEnv {
    create_test_env_with(fast_settings(), |catalog| Arc::new(catalog)).await
}

/// Environment with custom settings; `wrap_catalog` may decorate the
/// SQLite catalog (e.g. to inject failures)
pub async fn create_test_env_with<F>(settings: LibraryConfig, wrap_catalog: F) -> TestEnv
where
    F: FnOnce(SqliteCatalog) -> Arc<dyn Catalog>,
{
    let root = TempDir::new().expect("Failed to create temp root");
    let library = LibraryStore::new(root.path());
    library.ensure_layout().expect("Failed to create layout");

    let pool = audy_server::db::init_database_pool(&library.database_path())
        .await
        .expect("Failed to create database");

    let admin = audy_server::db::users::insert_user(&pool, "admin", "Admin", true, ADMIN_SESSION)
        .await
        .unwrap();
    let listener =
        audy_server::db::users::insert_user(&pool, "listener", "Listener", false, USER_SESSION)
            .await
            .unwrap();

    let catalog = wrap_catalog(SqliteCatalog::new(pool.clone()));
    let http = reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("Failed to build HTTP client");

    let state = AppState::with_catalog(pool, catalog, library, settings, http);

    TestEnv {
        root,
        state,
        admin,
        listener,
    }
}

fn with_session(session: &str) -> axum::http::request::Builder {
    Request::builder().header(header::COOKIE, format!("session_hash={}", session))
}

pub fn admin_request() -> axum::http::request::Builder {
    with_session(ADMIN_SESSION)
}

pub fn user_request() -> axum::http::request::Builder {
    with_session(USER_SESSION)
}

/// Empty-body GET as the listener
pub fn user_get(uri: &str) -> Request<Body> {
    user_request().uri(uri).body(Body::empty()).unwrap()
}
