//! Cart Model
//!
//! 每个用户一个购物车，(user_id, product_id) 唯一。
//! 加入购物车即扣减库存（软预留），`expires_at` 到期由清扫返还。

use serde::{Deserialize, Serialize};

/// Cart line as stored
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartItem {
    pub user_id: String,
    pub product_id: i64,
    pub quantity: i64,
    /// Unix millis. Rolls forward on every touch of the cart line.
    pub expires_at: i64,
}

/// Cart line joined with live product data (for API responses)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: i64,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
    pub expires_at: i64,
}

/// Client's desired target state for one product (full replacement semantics)
#[derive(Debug, Clone, Deserialize)]
pub struct DesiredItem {
    pub product_id: i64,
    /// 0 means "remove"
    pub quantity: i64,
}

/// Result of a cart read or sync
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedCart {
    pub items: Vec<CartLine>,
    /// Lines removed because their reservation timed out — for the
    /// user-facing "N item(s) removed" notice.
    pub removed_expired: u64,
}
