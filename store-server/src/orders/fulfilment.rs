//! Admin Fulfilment
//!
//! 管理端的订单推进：发货、完成、取消。状态机校验在 [`orders::transition`]，
//! 这里只负责各转换附带的副作用（运单号、库存返还、通知）。

use crate::db::DbService;
use crate::db::models::{Order, OrderStatus};
use crate::inventory::InventoryResult;
use crate::notify::{Notifier, NotifyEvent};
use crate::orders;

/// Mark a paid order as shipped, attaching the carrier tracking number.
pub async fn ship_order(
    db: &DbService,
    notifier: &Notifier,
    order_id: i64,
    tracking_number: &str,
    admin: &str,
) -> InventoryResult<Order> {
    let mut tx = db.pool.begin().await?;
    let order = orders::load_order(&mut *tx, order_id).await?;

    orders::transition(
        &mut *tx,
        &order,
        OrderStatus::Shipped,
        Some("order shipped"),
        Some(admin),
    )
    .await?;
    sqlx::query("UPDATE orders SET tracking_number = ?1 WHERE id = ?2")
        .bind(tracking_number)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

    let order = orders::load_order(&mut *tx, order_id).await?;
    tx.commit().await?;

    notifier.emit(NotifyEvent::OrderShipped {
        order_id,
        user_id: order.user_id.clone(),
    });
    Ok(order)
}

/// Mark a shipped order as completed (delivery confirmed).
pub async fn complete_order(db: &DbService, order_id: i64, admin: &str) -> InventoryResult<Order> {
    let mut tx = db.pool.begin().await?;
    let order = orders::load_order(&mut *tx, order_id).await?;

    orders::transition(
        &mut *tx,
        &order,
        OrderStatus::Completed,
        Some("delivery confirmed"),
        Some(admin),
    )
    .await?;

    let order = orders::load_order(&mut *tx, order_id).await?;
    tx.commit().await?;
    Ok(order)
}

/// Cancel a non-terminal order, returning its stock.
///
/// Cancellation from `shipped` still releases stock: the carrier will bring
/// the goods back, and the units must become sellable again.
pub async fn admin_cancel(
    db: &DbService,
    notifier: &Notifier,
    order_id: i64,
    reason: &str,
    admin: &str,
) -> InventoryResult<Order> {
    let mut tx = db.pool.begin().await?;
    let order = orders::load_order(&mut *tx, order_id).await?;

    orders::transition(
        &mut *tx,
        &order,
        OrderStatus::Cancelled,
        Some(reason),
        Some(admin),
    )
    .await?;
    orders::release_order_stock(&mut *tx, order_id, Some(admin), reason).await?;

    let order = orders::load_order(&mut *tx, order_id).await?;
    tx.commit().await?;

    notifier.emit(NotifyEvent::OrderCancelled {
        order_id,
        user_id: order.user_id.clone(),
        reason: reason.to_string(),
    });
    Ok(order)
}
