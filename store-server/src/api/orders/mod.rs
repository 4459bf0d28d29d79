//! Orders API 模块
//!
//! 用户侧只读；履约动作（核验、发货、完成、取消）要求 `x-admin-id`。

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", order_routes())
}

fn order_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list_mine))
        .route("/{id}", get(handler::get_mine))
        .route("/{id}/verify-slip", post(handler::verify_slip))
        .route("/{id}/ship", post(handler::ship))
        .route("/{id}/complete", post(handler::complete))
        .route("/{id}/cancel", post(handler::cancel))
}
