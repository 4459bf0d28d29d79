//! Payment & Verification Event Handlers
//!
//! 两条支付确认路径，最终效果一致（`reserved → paid`）：
//! - 网关 webhook：必须幂等，网关会重发同一事件
//! - 人工转账凭证核验：管理员核对金额后确认，带金额容差与重复凭证探测
//!
//! 退款完成事件只做财务状态标记，**从不**返还库存 — 货可能已在途。

use serde::{Deserialize, Serialize};

use crate::db::DbService;
use crate::db::models::OrderStatus;
use crate::inventory::{InventoryError, InventoryResult};
use crate::orders;
use crate::utils::now_millis;
use crate::utils::time::{day_end_millis, day_start_millis, to_calendar_date};

/// 核验金额容差：±1%
const AMOUNT_TOLERANCE: f64 = 0.01;
/// 重复凭证探测窗口：同一自然日、金额 ±5%
const DUPLICATE_TOLERANCE: f64 = 0.05;

/// Incoming gateway event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WebhookEvent {
    PaymentSucceeded {
        order_id: i64,
        payment_ref: String,
    },
    PaymentFailed {
        order_id: i64,
        payment_ref: String,
        reason: Option<String>,
    },
    RefundCompleted {
        order_id: i64,
        refund_id: String,
        amount: f64,
    },
}

/// What the handler did with the event
#[derive(Debug, Serialize)]
pub struct WebhookOutcome {
    pub order_id: i64,
    pub status: OrderStatus,
    /// false = duplicate/out-of-date event, acknowledged without effect
    pub applied: bool,
}

/// Apply a gateway event. Replays acknowledge without re-applying —
/// the gateway redelivers, we must not double-transition.
pub async fn handle_webhook(db: &DbService, event: WebhookEvent) -> InventoryResult<WebhookOutcome> {
    match event {
        WebhookEvent::PaymentSucceeded {
            order_id,
            payment_ref,
        } => payment_succeeded(db, order_id, &payment_ref).await,
        WebhookEvent::PaymentFailed {
            order_id,
            payment_ref,
            reason,
        } => payment_failed(db, order_id, &payment_ref, reason.as_deref()).await,
        WebhookEvent::RefundCompleted {
            order_id,
            refund_id,
            amount,
        } => refund_completed(db, order_id, &refund_id, amount).await,
    }
}

async fn payment_succeeded(
    db: &DbService,
    order_id: i64,
    payment_ref: &str,
) -> InventoryResult<WebhookOutcome> {
    let mut tx = db.pool.begin().await?;
    let order = orders::load_order(&mut *tx, order_id).await?;

    if order.status != OrderStatus::Reserved {
        // Replay or a race already resolved elsewhere; acknowledge as-is
        tracing::info!(order_id, status = %order.status, "payment_succeeded ignored");
        return Ok(WebhookOutcome {
            order_id,
            status: order.status,
            applied: false,
        });
    }

    sqlx::query("UPDATE orders SET payment_ref = ?1 WHERE id = ?2")
        .bind(payment_ref)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
    orders::transition(
        &mut *tx,
        &order,
        OrderStatus::Paid,
        Some("payment confirmed by gateway"),
        None,
    )
    .await?;
    tx.commit().await?;

    Ok(WebhookOutcome {
        order_id,
        status: OrderStatus::Paid,
        applied: true,
    })
}

async fn payment_failed(
    db: &DbService,
    order_id: i64,
    payment_ref: &str,
    reason: Option<&str>,
) -> InventoryResult<WebhookOutcome> {
    let mut tx = db.pool.begin().await?;
    let order = orders::load_order(&mut *tx, order_id).await?;

    if order.status != OrderStatus::Reserved {
        tracing::info!(order_id, status = %order.status, "payment_failed ignored");
        return Ok(WebhookOutcome {
            order_id,
            status: order.status,
            applied: false,
        });
    }

    orders::release_order_stock(&mut *tx, order_id, None, "payment failed").await?;
    sqlx::query("UPDATE orders SET payment_ref = ?1 WHERE id = ?2")
        .bind(payment_ref)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
    orders::transition(
        &mut *tx,
        &order,
        OrderStatus::Cancelled,
        reason.or(Some("payment failed")),
        None,
    )
    .await?;
    tx.commit().await?;

    Ok(WebhookOutcome {
        order_id,
        status: OrderStatus::Cancelled,
        applied: true,
    })
}

/// Refund completion is a financial reversal, not an inventory reversal.
/// Stock stays untouched; restocking returned goods is a separate manual
/// adjustment once they physically arrive.
async fn refund_completed(
    db: &DbService,
    order_id: i64,
    refund_id: &str,
    amount: f64,
) -> InventoryResult<WebhookOutcome> {
    let mut tx = db.pool.begin().await?;
    let order = orders::load_order(&mut *tx, order_id).await?;

    if order.status.is_terminal() {
        tracing::info!(order_id, status = %order.status, "refund_completed ignored");
        return Ok(WebhookOutcome {
            order_id,
            status: order.status,
            applied: false,
        });
    }

    sqlx::query("UPDATE orders SET refund_id = ?1, refund_amount = ?2 WHERE id = ?3")
        .bind(refund_id)
        .bind(amount)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
    orders::transition(
        &mut *tx,
        &order,
        OrderStatus::Refunded,
        Some("refund completed by gateway"),
        None,
    )
    .await?;
    tx.commit().await?;

    Ok(WebhookOutcome {
        order_id,
        status: OrderStatus::Refunded,
        applied: true,
    })
}

/// Manual bank-slip verification by an admin.
///
/// Gates, in order:
/// 1. the order must still be `reserved`
/// 2. the slip amount must match the order total within ±1%
/// 3. no other live order of a similar amount on the same calendar day —
///    a classic trick is paying once and submitting the slip twice
pub async fn verify_slip(
    db: &DbService,
    order_id: i64,
    amount: f64,
    slip_ref: &str,
    admin: &str,
) -> InventoryResult<WebhookOutcome> {
    let mut tx = db.pool.begin().await?;
    let order = orders::load_order(&mut *tx, order_id).await?;

    if order.status != OrderStatus::Reserved {
        return Err(InventoryError::InvalidTransition {
            from: order.status,
            to: OrderStatus::Paid,
        });
    }

    if (amount - order.total_amount).abs() > AMOUNT_TOLERANCE * order.total_amount {
        return Err(InventoryError::AmountMismatch {
            expected: order.total_amount,
            received: amount,
        });
    }

    let today = to_calendar_date(now_millis());
    let duplicate: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM orders \
         WHERE id != ?1 \
           AND created_at >= ?2 AND created_at < ?3 \
           AND ABS(total_amount - ?4) <= ?5 \
           AND status IN ('reserved', 'paid', 'shipped', 'completed') \
         LIMIT 1",
    )
    .bind(order_id)
    .bind(day_start_millis(today))
    .bind(day_end_millis(today))
    .bind(amount)
    .bind(DUPLICATE_TOLERANCE * amount)
    .fetch_optional(&mut *tx)
    .await?;
    if let Some(suspected_order_id) = duplicate {
        tracing::warn!(
            order_id,
            suspected_order_id,
            amount,
            "Possible duplicate payment slip"
        );
        return Err(InventoryError::DuplicateSlip { suspected_order_id });
    }

    sqlx::query("UPDATE orders SET payment_ref = ?1 WHERE id = ?2")
        .bind(slip_ref)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
    orders::transition(
        &mut *tx,
        &order,
        OrderStatus::Paid,
        Some("bank slip verified"),
        Some(admin),
    )
    .await?;
    tx.commit().await?;

    Ok(WebhookOutcome {
        order_id,
        status: OrderStatus::Paid,
        applied: true,
    })
}
