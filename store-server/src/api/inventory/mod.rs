//! Inventory API 模块（管理端）

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/inventory", inventory_routes())
}

fn inventory_routes() -> Router<ServerState> {
    Router::new()
        .route("/adjust", post(handler::adjust))
        .route("/ledger", get(handler::ledger))
        .route("/reconcile/{product_id}", get(handler::reconcile))
}
