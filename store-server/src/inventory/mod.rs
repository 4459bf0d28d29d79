//! Inventory Module
//!
//! 库存一致性核心：
//! - [`mutator`] - 原子库存增减原语（条件 UPDATE，无读-改-写窗口）
//! - [`ledger`] - 只追加库存台账 + 对账重放
//!
//! 所有库存变动（购物车预留、结算、超时返还、人工调整）都必须经过
//! [`mutator::try_adjust`] 并在同一事务内写台账 — 没有特权旁路。

pub mod ledger;
pub mod mutator;

pub use ledger::{LedgerBreak, Reconciliation};
pub use mutator::{StockChange, adjust_stock, try_adjust};

use crate::db::models::OrderStatus;

/// 库存/订单领域错误
///
/// 分类见错误处理设计：争用失败可重试（客户端减量重试）、
/// 策略违反不可重试、基础设施失败整体回滚后可安全重试。
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    // ========== Contention failure (expected, frequent) ==========
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: i64,
        requested: i64,
        available: i64,
    },

    // ========== Policy violations ==========
    #[error(
        "Purchase quota exceeded for product {product_id}: limit {limit}, already bought {bought}, requested {requested}"
    )]
    QuotaExceeded {
        product_id: i64,
        limit: i64,
        bought: i64,
        requested: i64,
    },

    #[error("Payment amount mismatch: expected {expected:.2}, received {received:.2}")]
    AmountMismatch { expected: f64, received: f64 },

    #[error("Possible duplicate payment slip: order {suspected_order_id} has a similar amount on the same day")]
    DuplicateSlip { suspected_order_id: i64 },

    // ========== Not found ==========
    #[error("Product {0} not found")]
    ProductNotFound(i64),

    #[error("Order {0} not found")]
    OrderNotFound(i64),

    // ========== Request/state problems ==========
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Illegal status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    // ========== Infrastructure (fully rolled back, safe to retry) ==========
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for InventoryError {
    fn from(err: sqlx::Error) -> Self {
        InventoryError::Database(err.to_string())
    }
}

impl InventoryError {
    /// SQLite 写争用导致的事务中止（busy / locked / snapshot 过期）。
    /// 事务整体回滚，调用方可安全重试整个工作单元。
    pub fn is_retryable_contention(&self) -> bool {
        match self {
            InventoryError::Database(msg) => {
                let msg = msg.to_ascii_lowercase();
                msg.contains("database is locked")
                    || msg.contains("database is busy")
                    || msg.contains("snapshot")
            }
            _ => false,
        }
    }
}

/// Result type for inventory/order operations
pub type InventoryResult<T> = Result<T, InventoryError>;
