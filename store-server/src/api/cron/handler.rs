//! Cron Handlers

use axum::{Json, extract::State, http::HeaderMap};

use crate::core::ServerState;
use crate::orders::reaper::{SweepSummary, sweep_reserved_orders};
use crate::utils::{AppError, AppResult};

const CRON_SECRET_HEADER: &str = "x-cron-secret";

fn check_secret(state: &ServerState, headers: &HeaderMap) -> Result<(), AppError> {
    let expected = state
        .config
        .cron_secret
        .as_deref()
        .ok_or_else(|| AppError::Forbidden("Cron endpoint disabled".into()))?;
    let provided = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided != expected {
        return Err(AppError::Forbidden("Invalid cron secret".into()));
    }
    Ok(())
}

/// POST /api/cron/release-stock - 回收超时未支付订单
pub async fn release_stock(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> AppResult<Json<SweepSummary>> {
    check_secret(&state, &headers)?;
    let summary = sweep_reserved_orders(&state.db, &state.notifier).await?;
    Ok(Json(summary))
}
