//! Checkout API Handler

use axum::{Json, extract::State};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::Order;
use crate::orders;
use crate::utils::AppResult;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: Option<String>,
}

/// POST /api/checkout - 将购物车转为 reserved 订单（全有或全无）
pub async fn checkout(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<Order>> {
    let order = orders::checkout(
        &state.db,
        &user.id,
        payload.shipping_address.as_deref(),
    )
    .await?;
    Ok(Json(order))
}
