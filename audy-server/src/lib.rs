//! audy-server library interface
//!
//! Exposes the application state and router for the binary and for
//! integration tests.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use crate::catalog::{Catalog, SqliteCatalog};
use crate::services::ingest::ArtworkOptions;
use crate::services::{
    BatchUpload, ChannelRegistry, ImportQueue, ImportSettings, LibraryStore, TrackIngestor,
};
use audy_common::config::LibraryConfig;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (users, sessions)
    pub db: SqlitePool,
    pub catalog: Arc<dyn Catalog>,
    pub library: LibraryStore,
    pub ingestor: Arc<TrackIngestor>,
    /// Live event channels, one per connected user
    pub channels: ChannelRegistry,
    pub imports: ImportQueue,
    pub batch: BatchUpload,
    pub settings: Arc<LibraryConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, library: LibraryStore, settings: LibraryConfig) -> Self {
        let catalog: Arc<dyn Catalog> = Arc::new(SqliteCatalog::new(db.clone()));
        Self::with_catalog(db, catalog, library, settings, reqwest::Client::new())
    }

    /// Build state around an explicit catalog and HTTP client
    pub fn with_catalog(
        db: SqlitePool,
        catalog: Arc<dyn Catalog>,
        library: LibraryStore,
        settings: LibraryConfig,
        http: reqwest::Client,
    ) -> Self {
        let ingestor = Arc::new(TrackIngestor::new(
            Arc::clone(&catalog),
            library.clone(),
            ArtworkOptions {
                max_dimension: settings.artwork_max_dimension,
                square_tolerance: settings.artwork_square_tolerance,
            },
        ));
        let channels = ChannelRegistry::new(settings.channel_capacity);
        let imports = ImportQueue::new(
            http,
            Arc::clone(&ingestor),
            channels.clone(),
            ImportSettings {
                pacing: Duration::from_millis(settings.import_pacing_ms),
                event_capacity: settings.import_event_capacity,
            },
        );
        let batch = BatchUpload::new(Arc::clone(&ingestor), channels.clone());

        Self {
            db,
            catalog,
            library,
            ingestor,
            channels,
            imports,
            batch,
            settings: Arc::new(settings),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::channel_routes())
        .merge(api::track_routes())
        .merge(api::import_routes())
        .merge(api::media_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
