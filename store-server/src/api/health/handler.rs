//! Health Check Handler

use axum::{Json, extract::State};
use serde::Serialize;

use crate::core::ServerState;
use crate::utils::AppResult;
use crate::utils::now_millis;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub environment: String,
    pub timestamp: i64,
}

/// GET /api/health - 健康检查（含数据库连通性）
pub async fn health(State(state): State<ServerState>) -> AppResult<Json<HealthStatus>> {
    // A ping that actually touches the pool
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.db.pool)
        .await
        .map_err(|e| crate::utils::AppError::Database(e.to_string()))?;

    Ok(Json(HealthStatus {
        status: "ok",
        environment: state.config.environment.clone(),
        timestamp: now_millis(),
    }))
}
