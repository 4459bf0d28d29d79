//! Orders Module
//!
//! 订单编排层：
//! - [`checkout`] - 全有或全无的结算事务
//! - [`reaper`] - 超时未支付订单回收
//! - [`payment`] - 支付网关 webhook + 人工转账凭证核验
//! - [`fulfilment`] - 管理端发货/完成/取消
//!
//! 状态转换一律经过 [`transition`]：校验状态机、更新订单行、追加
//! 状态历史，三者同一事务。

pub mod checkout;
pub mod fulfilment;
pub mod payment;
pub mod reaper;

pub use checkout::checkout;
pub use fulfilment::{admin_cancel, complete_order, ship_order};
pub use payment::{WebhookEvent, WebhookOutcome, handle_webhook, verify_slip};
pub use reaper::{SweepSummary, sweep_reserved_orders};

use sqlx::SqliteConnection;

use crate::db::models::{LedgerEntryType, Order, OrderItem, OrderStatus};
use crate::inventory::{self, InventoryError, InventoryResult};
use crate::utils::now_millis;

/// Load an order within the caller's transaction.
pub(crate) async fn load_order(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> InventoryResult<Order> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?1")
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(InventoryError::OrderNotFound(order_id))
}

/// Apply a status transition: validate the edge, update the order row,
/// append to the status trail. Caller owns the transaction.
pub(crate) async fn transition(
    conn: &mut SqliteConnection,
    order: &Order,
    next: OrderStatus,
    reason: Option<&str>,
    actor: Option<&str>,
) -> InventoryResult<()> {
    if !order.status.can_transition_to(next) {
        return Err(InventoryError::InvalidTransition {
            from: order.status,
            to: next,
        });
    }

    let now = now_millis();
    sqlx::query("UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(next)
        .bind(now)
        .bind(order.id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "INSERT INTO order_status_history (order_id, status, reason, actor, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(order.id)
    .bind(next)
    .bind(reason)
    .bind(actor)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    tracing::info!(
        order_id = order.id,
        from = %order.status,
        to = %next,
        "Order status transition"
    );
    Ok(())
}

/// Return every line of an order back to stock, ledgered as `cancel`.
/// Used by the reaper, payment-failed webhooks and admin cancellation.
pub(crate) async fn release_order_stock(
    conn: &mut SqliteConnection,
    order_id: i64,
    actor: Option<&str>,
    note: &str,
) -> InventoryResult<()> {
    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_item WHERE order_id = ?1")
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

    for item in &items {
        let change = inventory::try_adjust(&mut *conn, item.product_id, item.quantity).await?;
        inventory::ledger::record(
            &mut *conn,
            &change,
            LedgerEntryType::Cancel,
            Some(order_id),
            actor,
            Some(note),
        )
        .await?;
    }
    Ok(())
}
