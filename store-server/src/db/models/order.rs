//! Order Model
//!
//! 订单生命周期状态机：
//!
//! ```text
//! reserved → paid → shipped → completed
//!     │        │       │
//!     └────────┴───────┴──→ cancelled     (任意非终态可取消)
//!              └──────────→ refunded      (退款完成)
//! ```
//!
//! 不允许跳跃前进；终态 (completed / cancelled / refunded) 不再触碰库存。

use serde::{Deserialize, Serialize};

// =============================================================================
// Order Status
// =============================================================================

/// Order lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Stock committed, awaiting payment. The reaper may expire this state.
    Reserved,
    Paid,
    Shipped,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Terminal states never mutate stock again
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    /// Legal forward edges of the state machine
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        match (self, next) {
            (OrderStatus::Reserved, OrderStatus::Paid) => true,
            (OrderStatus::Paid, OrderStatus::Shipped) => true,
            (OrderStatus::Shipped, OrderStatus::Completed) => true,
            // Cancellation is reachable from any non-terminal state
            (from, OrderStatus::Cancelled) => !from.is_terminal(),
            // Refund completion is reachable from any non-terminal state
            (from, OrderStatus::Refunded) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Reserved => "reserved",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Order
// =============================================================================

/// A checkout attempt
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: String,
    pub status: OrderStatus,
    pub total_amount: f64,
    pub shipping_address: Option<String>,
    /// External payment gateway transaction/slip reference
    pub payment_ref: Option<String>,
    pub tracking_number: Option<String>,
    pub refund_id: Option<String>,
    pub refund_amount: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Order line. `price` is frozen at checkout — later catalog price changes
/// never affect historical totals.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub price: f64,
}

/// Append-only status trail. `actor = None` means the system (reaper, webhook).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderStatusHistory {
    pub id: i64,
    pub order_id: i64,
    pub status: OrderStatus,
    pub reason: Option<String>,
    pub actor: Option<String>,
    pub created_at: i64,
}

/// Order with items and status trail (for API responses)
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub status_history: Vec<OrderStatusHistory>,
}
