//! Cron API 模块
//!
//! 超时订单回收由外部调度器（cron / 云定时器）周期性调用，
//! 通过 `x-cron-secret` 共享密钥鉴权。密钥未配置时一律拒绝。

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/cron/release-stock", post(handler::release_stock))
}
