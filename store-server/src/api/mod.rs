//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`products`] - 商品目录接口
//! - [`cart`] - 购物车（预留）接口
//! - [`checkout`] - 结算接口
//! - [`orders`] - 订单查询与管理端履约接口
//! - [`payments`] - 支付网关 webhook
//! - [`inventory`] - 库存调整、台账、对账接口
//! - [`cron`] - 定时任务触发端点

pub mod cart;
pub mod checkout;
pub mod cron;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod products;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};

/// Assemble the full application router
pub fn router(state: ServerState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(products::router())
        .merge(cart::router())
        .merge(checkout::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(inventory::router())
        .merge(cron::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
