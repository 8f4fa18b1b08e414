use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::{
    db::db_pool,
    error::{AppError, AppResult},
    state::AppState,
};

/// The authenticated back-office user a request acts as.
#[derive(Debug, Clone, Serialize)]
pub struct Actor {
    pub id: i64,
    pub name: String,
    pub role_id: i16,
    pub branch_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

pub async fn require_user_id(state: &AppState, headers: &HeaderMap) -> AppResult<i64> {
    if state.config.auth_dev_overrides_enabled() {
        if let Some(raw) = header_str(headers, "x-user-id") {
            return parse_user_id(raw);
        }
    }

    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Unauthorized: missing bearer token.".to_string()))?;
    let secret = state.config.jwt_secret.as_deref().ok_or_else(|| {
        AppError::Unauthorized("Unauthorized: authentication is not configured.".to_string())
    })?;
    user_id_from_token(token, secret)
}

pub async fn require_actor(state: &AppState, headers: &HeaderMap) -> AppResult<Actor> {
    let user_id = require_user_id(state, headers).await?;
    if let Some(actor) = state.actor_cache.get(&user_id).await {
        return Ok(actor);
    }

    let pool = db_pool(state)?;
    let row = sqlx::query("SELECT id, name, role_id, branch_id FROM users WHERE id = $1 LIMIT 1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|error| AppError::Internal(format!("user lookup failed: {error}")))?
        .ok_or_else(|| AppError::Unauthorized("Unauthorized: unknown user.".to_string()))?;

    let actor = Actor {
        id: row
            .try_get("id")
            .map_err(|error| AppError::Internal(format!("users.id: {error}")))?,
        name: row.try_get("name").unwrap_or_default(),
        role_id: row
            .try_get("role_id")
            .map_err(|error| AppError::Internal(format!("users.role_id: {error}")))?,
        branch_id: row.try_get("branch_id").unwrap_or(None),
    };
    state.actor_cache.insert(user_id, actor.clone()).await;
    Ok(actor)
}

fn user_id_from_token(token: &str, secret: &str) -> AppResult<i64> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|error| {
        tracing::debug!(error = %error, "Rejected bearer token");
        AppError::Unauthorized("Unauthorized: invalid token.".to_string())
    })?;
    parse_user_id(&data.claims.sub)
}

fn parse_user_id(raw: &str) -> AppResult<i64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::Unauthorized("Unauthorized: invalid user id.".to_string()))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = header_str(headers, "authorization")?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|token| !token.is_empty())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
