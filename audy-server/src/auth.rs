//! Session extractors
//!
//! Requests authenticate with the `session_hash` cookie issued by the login
//! flow. [`CurrentUser`] rejects with 401 when the cookie is missing or
//! unknown; [`AdminUser`] additionally rejects non-admins with 403.

use crate::db::users::find_user_by_session;
use crate::error::ApiError;
use crate::AppState;
use audy_common::User;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};

pub const SESSION_COOKIE: &str = "session_hash";

/// Any logged-in user
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// A logged-in administrator
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

/// Value of the session cookie, if sent
pub fn session_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = session_from_headers(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let user = find_user_by_session(&state.db, &session)
            .await?
            .ok_or(ApiError::Unauthorized)?;
        Ok(CurrentUser(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            tracing::warn!(user_id = user.id, "Admin endpoint refused");
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
