//! Payment Webhook Handler
//!
//! 网关会重发事件，处理器幂等：重放返回 200 且 `applied = false`，
//! 网关据此停止重试。

use axum::{Json, extract::State};

use crate::core::ServerState;
use crate::orders::payment::{WebhookEvent, WebhookOutcome, handle_webhook};
use crate::utils::AppResult;

/// POST /api/payments/webhook - 支付网关事件入口
pub async fn webhook(
    State(state): State<ServerState>,
    Json(event): Json<WebhookEvent>,
) -> AppResult<Json<WebhookOutcome>> {
    let outcome = handle_webhook(&state.db, event).await?;
    Ok(Json(outcome))
}
