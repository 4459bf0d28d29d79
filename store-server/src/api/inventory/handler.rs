//! Inventory API Handlers (admin)

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::auth::AdminUser;
use crate::core::ServerState;
use crate::db::models::LedgerEntry;
use crate::inventory::{self, Reconciliation};
use crate::utils::AppResult;

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub product_id: i64,
    /// +N 进货 / -N 报损下架
    pub change: i64,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct AdjustResponse {
    pub product_id: i64,
    pub stock: i64,
}

/// POST /api/inventory/adjust - 人工库存调整
pub async fn adjust(
    State(state): State<ServerState>,
    admin: AdminUser,
    Json(payload): Json<AdjustRequest>,
) -> AppResult<Json<AdjustResponse>> {
    let change = inventory::adjust_stock(
        &state.db,
        payload.product_id,
        payload.change,
        &payload.reason,
        &admin.id,
    )
    .await?;
    Ok(Json(AdjustResponse {
        product_id: change.product_id,
        stock: change.after,
    }))
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub product_id: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// GET /api/inventory/ledger - 台账查询（倒序）
pub async fn ledger(
    State(state): State<ServerState>,
    _admin: AdminUser,
    Query(query): Query<LedgerQuery>,
) -> AppResult<Json<Vec<LedgerEntry>>> {
    let mut conn = state
        .db
        .pool
        .acquire()
        .await
        .map_err(|e| crate::utils::AppError::Database(e.to_string()))?;
    let entries = inventory::ledger::query_entries(
        &mut *conn,
        query.product_id,
        query.limit.clamp(1, 1000),
        query.offset.max(0),
    )
    .await?;
    Ok(Json(entries))
}

/// GET /api/inventory/reconcile/:product_id - 台账重放对账
pub async fn reconcile(
    State(state): State<ServerState>,
    _admin: AdminUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<Reconciliation>> {
    let mut conn = state
        .db
        .pool
        .acquire()
        .await
        .map_err(|e| crate::utils::AppError::Database(e.to_string()))?;
    let report = inventory::ledger::reconcile(&mut *conn, product_id).await?;
    Ok(Json(report))
}
