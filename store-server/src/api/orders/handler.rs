//! Order API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use crate::auth::{AdminUser, CurrentUser};
use crate::core::ServerState;
use crate::db::models::{Order, OrderDetail};
use crate::db::repository::OrderRepository;
use crate::orders;
use crate::orders::payment::WebhookOutcome;
use crate::utils::{AppError, AppResult};

// =============================================================================
// 用户侧
// =============================================================================

/// GET /api/orders - 我的订单列表
pub async fn list_mine(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Order>>> {
    let repo = OrderRepository::new(state.db.clone());
    let orders = repo.find_by_user(&user.id).await?;
    Ok(Json(orders))
}

/// GET /api/orders/:id - 我的订单详情（含条目与状态轨迹）
pub async fn get_mine(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<OrderDetail>> {
    let repo = OrderRepository::new(state.db.clone());
    let detail = repo.find_detail(id).await?;
    // Ownership check: someone else's order looks like a missing one
    if detail.order.user_id != user.id {
        return Err(AppError::NotFound(format!("Order {}", id)));
    }
    Ok(Json(detail))
}

// =============================================================================
// 管理端
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct VerifySlipRequest {
    pub amount: f64,
    pub slip_ref: String,
}

/// POST /api/orders/:id/verify-slip - 人工核验转账凭证
pub async fn verify_slip(
    State(state): State<ServerState>,
    admin: AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<VerifySlipRequest>,
) -> AppResult<Json<WebhookOutcome>> {
    let outcome = orders::verify_slip(
        &state.db,
        id,
        payload.amount,
        &payload.slip_ref,
        &admin.id,
    )
    .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct ShipRequest {
    pub tracking_number: String,
}

/// POST /api/orders/:id/ship - 发货
pub async fn ship(
    State(state): State<ServerState>,
    admin: AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<ShipRequest>,
) -> AppResult<Json<Order>> {
    if payload.tracking_number.trim().is_empty() {
        return Err(AppError::Validation("tracking_number is required".into()));
    }
    let order = orders::ship_order(
        &state.db,
        &state.notifier,
        id,
        &payload.tracking_number,
        &admin.id,
    )
    .await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/complete - 确认送达
pub async fn complete(
    State(state): State<ServerState>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Order>> {
    let order = orders::complete_order(&state.db, id, &admin.id).await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

/// POST /api/orders/:id/cancel - 取消订单并返还库存
pub async fn cancel(
    State(state): State<ServerState>,
    admin: AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<CancelRequest>,
) -> AppResult<Json<Order>> {
    if payload.reason.trim().is_empty() {
        return Err(AppError::Validation("cancellation reason is required".into()));
    }
    let order = orders::admin_cancel(
        &state.db,
        &state.notifier,
        id,
        &payload.reason,
        &admin.id,
    )
    .await?;
    Ok(Json(order))
}
