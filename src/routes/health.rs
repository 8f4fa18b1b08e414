use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Duration;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let db_ok = match &state.db_pool {
        // Bounded so health answers even when the first connect hangs.
        Some(pool) => match tokio::time::timeout(
            Duration::from_secs(3),
            sqlx::query("SELECT 1").fetch_one(pool),
        )
        .await
        {
            Ok(Ok(_)) => true,
            Ok(Err(error)) => {
                tracing::error!(error = %error, "Health check DB query failed");
                false
            }
            Err(_) => {
                tracing::error!("Health check DB query timed out (3s)");
                false
            }
        },
        None => true,
    };

    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "app": state.config.app_name,
        "now": Utc::now().to_rfc3339(),
        "db": db_ok,
    }))
}
