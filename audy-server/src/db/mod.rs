//! Database access for audy-server
//!
//! Single SQLite file (`storage.db`) in the root folder. Tables are created
//! on startup when missing.

pub mod users;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the `music` and `users` tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS music (
            hash TEXT PRIMARY KEY,
            artist TEXT NOT NULL,
            title TEXT NOT NULL,
            has_image INTEGER NOT NULL DEFAULT 0,
            lyrics TEXT NOT NULL DEFAULT '',
            timestamp INTEGER NOT NULL,
            duration REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            login TEXT NOT NULL UNIQUE,
            nickname TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            session_hash TEXT UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (music, users)");

    Ok(())
}
