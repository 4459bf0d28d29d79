//! Reservation Reaper
//!
//! 回收超时未支付的 `reserved` 订单：返还每一行库存（台账 `cancel`），
//! 订单转入 `cancelled`。由定时端点触发（外部 cron），单条订单失败
//! 只计数、不中断整次扫描。
//!
//! 订单的支付窗口取其商品中最短的 `reservation_minutes`。

use serde::Serialize;

use crate::db::DbService;
use crate::db::models::OrderStatus;
use crate::inventory::InventoryResult;
use crate::notify::{Notifier, NotifyEvent};
use crate::orders;
use crate::utils::now_millis;

/// Outcome of one reaper pass
#[derive(Debug, Default, Serialize)]
pub struct SweepSummary {
    /// Candidate orders examined
    pub processed: u64,
    /// Orders actually expired by this pass
    pub expired: u64,
    /// Orders that failed to expire (logged, left for the next pass)
    pub errors: u64,
}

/// Expire every overdue `reserved` order. Each order gets its own
/// transaction so one poisoned order cannot block the rest.
pub async fn sweep_reserved_orders(
    db: &DbService,
    notifier: &Notifier,
) -> InventoryResult<SweepSummary> {
    let now = now_millis();

    // Deadline per order = created_at + shortest reservation window among
    // its items, converted to millis.
    let overdue: Vec<i64> = sqlx::query_scalar(
        "SELECT o.id FROM orders o \
         WHERE o.status = 'reserved' \
           AND ?1 > o.created_at + 60000 * \
               (SELECT MIN(p.reservation_minutes) \
                FROM order_item oi JOIN product p ON p.id = oi.product_id \
                WHERE oi.order_id = o.id) \
         ORDER BY o.id",
    )
    .bind(now)
    .fetch_all(&db.pool)
    .await?;

    let mut summary = SweepSummary::default();
    for order_id in overdue {
        summary.processed += 1;
        match expire_order(db, order_id).await {
            Ok(Some(user_id)) => {
                summary.expired += 1;
                notifier.emit(NotifyEvent::OrderCancelled {
                    order_id,
                    user_id,
                    reason: "payment window expired".to_string(),
                });
            }
            // Lost the race against a payment or manual action; nothing to do
            Ok(None) => {}
            Err(e) => {
                summary.errors += 1;
                tracing::error!(order_id, error = %e, "Failed to expire order");
            }
        }
    }

    if summary.processed > 0 {
        tracing::info!(
            processed = summary.processed,
            expired = summary.expired,
            errors = summary.errors,
            "Reservation sweep finished"
        );
    }
    Ok(summary)
}

/// Expire one order. Returns the owner's user id when the order was actually
/// expired, `None` when a concurrent transition got there first.
async fn expire_order(db: &DbService, order_id: i64) -> InventoryResult<Option<String>> {
    let mut tx = db.pool.begin().await?;

    // Re-check inside the transaction: a webhook may have paid the order
    // between the candidate query and this point.
    let order = orders::load_order(&mut *tx, order_id).await?;
    if order.status != OrderStatus::Reserved {
        return Ok(None);
    }

    orders::release_order_stock(&mut *tx, order_id, None, "reservation timeout").await?;
    orders::transition(
        &mut *tx,
        &order,
        OrderStatus::Cancelled,
        Some("payment window expired"),
        None,
    )
    .await?;

    tx.commit().await?;
    Ok(Some(order.user_id))
}
