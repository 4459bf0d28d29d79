//! Cart API Handlers
//!
//! 购物车是全量替换语义：PUT 提交期望的完整目标状态，服务端
//! 按差额调整库存。响应里带 `removed_expired`，前端据此提示
//! "N 件商品因预留超时被移除"。

use axum::{Json, extract::State};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::cart;
use crate::core::ServerState;
use crate::db::models::{DesiredItem, ResolvedCart};
use crate::notify::NotifyEvent;
use crate::utils::AppResult;
use crate::utils::error::{AppResponse, ok, ok_with_message};

#[derive(Debug, Deserialize)]
pub struct CartSyncRequest {
    pub items: Vec<DesiredItem>,
}

/// 清扫到过期预留时：广播领域事件 + 响应附带用户提示
fn respond(
    state: &ServerState,
    user_id: &str,
    cart: ResolvedCart,
) -> Json<AppResponse<ResolvedCart>> {
    if cart.removed_expired > 0 {
        state.notifier.emit(NotifyEvent::ReservationReleased {
            user_id: user_id.to_string(),
            removed: cart.removed_expired,
        });
        let message = format!(
            "{} item(s) removed due to reservation timeout",
            cart.removed_expired
        );
        ok_with_message(cart, message)
    } else {
        ok(cart)
    }
}

/// GET /api/cart - 读取购物车（先清扫过期预留）
pub async fn read(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<AppResponse<ResolvedCart>>> {
    let cart = cart::read_cart(&state.db, &user.id).await?;
    Ok(respond(&state, &user.id, cart))
}

/// PUT /api/cart - 全量同步购物车
pub async fn sync(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<CartSyncRequest>,
) -> AppResult<Json<AppResponse<ResolvedCart>>> {
    let cart = cart::sync_cart(&state.db, &user.id, &payload.items).await?;
    Ok(respond(&state, &user.id, cart))
}
