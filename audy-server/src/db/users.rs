//! User lookups for the session boundary
//!
//! Login and account management live outside this server; it only resolves
//! an existing session to a user.

use audy_common::{Result, User};
use sqlx::SqlitePool;

/// Resolve a session token to its user
pub async fn find_user_by_session(db: &SqlitePool, session_hash: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, login, nickname, is_admin FROM users WHERE session_hash = ?",
    )
    .bind(session_hash)
    .fetch_optional(db)
    .await?;

    Ok(user)
}

/// Insert a user bound to a session token
pub async fn insert_user(
    db: &SqlitePool,
    login: &str,
    nickname: &str,
    is_admin: bool,
    session_hash: &str,
) -> Result<User> {
    let result = sqlx::query(
        "INSERT INTO users (login, nickname, is_admin, session_hash) VALUES (?, ?, ?, ?)",
    )
    .bind(login)
    .bind(nickname)
    .bind(is_admin)
    .bind(session_hash)
    .execute(db)
    .await?;

    Ok(User {
        id: result.last_insert_rowid(),
        login: login.to_string(),
        nickname: nickname.to_string(),
        is_admin,
    })
}
