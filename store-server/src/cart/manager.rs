//! Reservation (Cart) Manager
//!
//! `sync_cart` 接收客户端期望的完整目标状态（全量替换，非增量），
//! 与清扫后的当前状态做 diff，按差额调用原子扣减原语。
//!
//! 整个 diff-and-sync（过期清扫、限购检查、所有商品的增减、台账、
//! 购物车行写入）在一个事务内执行 — 任何一个商品失败，整次同步
//! 全部回滚，不存在部分生效。

use std::collections::HashMap;

use sqlx::SqliteConnection;

use crate::db::DbService;
use crate::db::models::{CartItem, CartLine, DesiredItem, LedgerEntryType, Product, ResolvedCart};
use crate::inventory::{self, InventoryError, InventoryResult};
use crate::utils::time::{minutes_to_millis, now_millis};

/// Read the user's cart, sweeping expired holds first.
pub async fn read_cart(db: &DbService, user_id: &str) -> InventoryResult<ResolvedCart> {
    let now = now_millis();
    let mut tx = db.pool.begin().await?;
    let removed_expired = sweep_expired(&mut *tx, user_id, now).await?;
    let items = load_lines(&mut *tx, user_id).await?;
    tx.commit().await?;

    Ok(ResolvedCart {
        items,
        removed_expired,
    })
}

/// Release every expired hold in the user's cart within the caller's
/// transaction. Returns the number of removed lines for the user-facing
/// "N item(s) removed due to reservation timeout" notice.
///
/// Invoked at the start of every cart read/write and at checkout, so every
/// diff is computed against truthful state.
pub async fn sweep_expired(
    conn: &mut SqliteConnection,
    user_id: &str,
    now: i64,
) -> InventoryResult<u64> {
    let expired = sqlx::query_as::<_, CartItem>(
        "SELECT * FROM cart_item WHERE user_id = ?1 AND expires_at < ?2",
    )
    .bind(user_id)
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;

    if expired.is_empty() {
        return Ok(0);
    }

    for item in &expired {
        let change = inventory::try_adjust(&mut *conn, item.product_id, item.quantity).await?;
        inventory::ledger::record(
            &mut *conn,
            &change,
            LedgerEntryType::Release,
            None,
            None,
            Some("reservation timeout"),
        )
        .await?;
    }

    sqlx::query("DELETE FROM cart_item WHERE user_id = ?1 AND expires_at < ?2")
        .bind(user_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    tracing::info!(
        user_id,
        removed = expired.len(),
        "Expired cart reservations released"
    );

    Ok(expired.len() as u64)
}

/// SQLite 写争用时整体重试的上限。事务已完整回滚，重试是安全的。
const MAX_ATTEMPTS: u32 = 3;

/// Replace the user's cart with `desired`, adjusting stock by the diff.
///
/// Quantity 0 (or absence from `desired`) means "remove". Every surviving
/// line's expiry rolls forward to `now + reservation_minutes` — the timer
/// resets on any touch of the cart.
pub async fn sync_cart(
    db: &DbService,
    user_id: &str,
    desired: &[DesiredItem],
) -> InventoryResult<ResolvedCart> {
    // Validate the request shape before touching the store
    let mut seen: HashMap<i64, ()> = HashMap::new();
    for item in desired {
        if item.quantity < 0 {
            return Err(InventoryError::Validation(format!(
                "negative quantity for product {}",
                item.product_id
            )));
        }
        if seen.insert(item.product_id, ()).is_some() {
            return Err(InventoryError::Validation(format!(
                "product {} listed twice",
                item.product_id
            )));
        }
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        match sync_cart_once(db, user_id, desired).await {
            Err(e) if e.is_retryable_contention() && attempt < MAX_ATTEMPTS => {
                tracing::warn!(user_id, attempt, "Cart sync hit write contention, retrying");
                continue;
            }
            other => return other,
        }
    }
}

async fn sync_cart_once(
    db: &DbService,
    user_id: &str,
    desired: &[DesiredItem],
) -> InventoryResult<ResolvedCart> {
    let now = now_millis();
    let mut tx = db.pool.begin().await?;

    // 1. Sweep so the diff is computed against truthful state
    let removed_expired = sweep_expired(&mut *tx, user_id, now).await?;

    // 2. Current state
    let current = sqlx::query_as::<_, CartItem>("SELECT * FROM cart_item WHERE user_id = ?1")
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
    let current_qty: HashMap<i64, i64> = current
        .iter()
        .map(|item| (item.product_id, item.quantity))
        .collect();

    // 3. Apply the desired lines
    for item in desired {
        if item.quantity == 0 {
            continue; // handled by the removal pass below
        }

        let product = sqlx::query_as::<_, Product>(
            "SELECT * FROM product WHERE id = ?1 AND is_active = 1",
        )
        .bind(item.product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(InventoryError::ProductNotFound(item.product_id))?;

        let held = current_qty.get(&item.product_id).copied().unwrap_or(0);
        let delta = item.quantity - held;

        if delta > 0 {
            check_quota(&mut *tx, user_id, &product, item.quantity).await?;
            let change = inventory::try_adjust(&mut *tx, item.product_id, -delta).await?;
            inventory::ledger::record(
                &mut *tx,
                &change,
                LedgerEntryType::Reserve,
                None,
                Some(user_id),
                None,
            )
            .await?;
        } else if delta < 0 {
            let change = inventory::try_adjust(&mut *tx, item.product_id, -delta).await?;
            inventory::ledger::record(
                &mut *tx,
                &change,
                LedgerEntryType::Release,
                None,
                Some(user_id),
                Some("cart quantity reduced"),
            )
            .await?;
        }

        // Rolling expiry: reset on every touch, including delta == 0
        let expires_at = now + minutes_to_millis(product.reservation_minutes);
        sqlx::query(
            "INSERT INTO cart_item (user_id, product_id, quantity, expires_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (user_id, product_id) \
             DO UPDATE SET quantity = excluded.quantity, expires_at = excluded.expires_at",
        )
        .bind(user_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;
    }

    // 4. Full removal for lines absent from desired (or desired with qty 0)
    let desired_qty: HashMap<i64, i64> = desired
        .iter()
        .map(|item| (item.product_id, item.quantity))
        .collect();
    for item in &current {
        let keep = desired_qty.get(&item.product_id).copied().unwrap_or(0) > 0;
        if keep {
            continue;
        }
        let change = inventory::try_adjust(&mut *tx, item.product_id, item.quantity).await?;
        inventory::ledger::record(
            &mut *tx,
            &change,
            LedgerEntryType::Release,
            None,
            Some(user_id),
            Some("removed from cart"),
        )
        .await?;
        sqlx::query("DELETE FROM cart_item WHERE user_id = ?1 AND product_id = ?2")
            .bind(user_id)
            .bind(item.product_id)
            .execute(&mut *tx)
            .await?;
    }

    let items = load_lines(&mut *tx, user_id).await?;
    tx.commit().await?;

    Ok(ResolvedCart {
        items,
        removed_expired,
    })
}

/// 限购检查：历史订单（非 cancelled）购买量 + 本次目标量不得超过上限。
///
/// 取消的订单已把库存退回，不计入"已购"；退款是财务逆转而非库存逆转，
/// 仍然计入。
async fn check_quota(
    conn: &mut SqliteConnection,
    user_id: &str,
    product: &Product,
    desired_qty: i64,
) -> InventoryResult<()> {
    if product.quota_limit <= 0 {
        return Ok(());
    }

    let bought: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(oi.quantity), 0) \
         FROM order_item oi JOIN orders o ON o.id = oi.order_id \
         WHERE o.user_id = ?1 AND oi.product_id = ?2 AND o.status != 'cancelled'",
    )
    .bind(user_id)
    .bind(product.id)
    .fetch_one(&mut *conn)
    .await?;

    if bought + desired_qty > product.quota_limit {
        return Err(InventoryError::QuotaExceeded {
            product_id: product.id,
            limit: product.quota_limit,
            bought,
            requested: desired_qty,
        });
    }
    Ok(())
}

async fn load_lines(conn: &mut SqliteConnection, user_id: &str) -> InventoryResult<Vec<CartLine>> {
    let lines = sqlx::query_as::<_, CartLine>(
        "SELECT ci.product_id, p.name, p.price, ci.quantity, ci.expires_at \
         FROM cart_item ci JOIN product p ON p.id = ci.product_id \
         WHERE ci.user_id = ?1 ORDER BY ci.product_id",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cart_stock, in_memory_db, seed_product, stock_of};

    fn want(product_id: i64, quantity: i64) -> DesiredItem {
        DesiredItem {
            product_id,
            quantity,
        }
    }

    // ========================================================================
    // 基本 diff 语义
    // ========================================================================

    #[tokio::test]
    async fn test_add_decrements_and_sets_expiry() {
        let db = in_memory_db().await;
        let pid = seed_product(&db, "Widget", 9.9, 10, 1, 0).await;

        let before = now_millis();
        let cart = sync_cart(&db, "u1", &[want(pid, 3)]).await.unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
        assert_eq!(stock_of(&db, pid).await, 7);
        // expiresAt ≈ now + 1 min
        let expires = cart.items[0].expires_at;
        assert!(expires >= before + 60_000 && expires <= now_millis() + 60_000);
    }

    #[tokio::test]
    async fn test_increase_and_decrease_apply_delta_only() {
        let db = in_memory_db().await;
        let pid = seed_product(&db, "Widget", 9.9, 10, 30, 0).await;

        sync_cart(&db, "u1", &[want(pid, 2)]).await.unwrap();
        assert_eq!(stock_of(&db, pid).await, 8);

        sync_cart(&db, "u1", &[want(pid, 5)]).await.unwrap();
        assert_eq!(stock_of(&db, pid).await, 5);

        sync_cart(&db, "u1", &[want(pid, 1)]).await.unwrap();
        assert_eq!(stock_of(&db, pid).await, 9);
    }

    #[tokio::test]
    async fn test_absent_product_is_full_removal() {
        let db = in_memory_db().await;
        let pid = seed_product(&db, "Widget", 9.9, 10, 30, 0).await;
        let other = seed_product(&db, "Gadget", 4.0, 5, 30, 0).await;

        sync_cart(&db, "u1", &[want(pid, 3), want(other, 2)])
            .await
            .unwrap();
        assert_eq!(stock_of(&db, pid).await, 7);
        assert_eq!(stock_of(&db, other).await, 3);

        // pid absent from desired → removed, stock returned
        let cart = sync_cart(&db, "u1", &[want(other, 2)]).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(stock_of(&db, pid).await, 10);
        assert_eq!(stock_of(&db, other).await, 3);
    }

    #[tokio::test]
    async fn test_quantity_zero_means_remove() {
        let db = in_memory_db().await;
        let pid = seed_product(&db, "Widget", 9.9, 10, 30, 0).await;

        sync_cart(&db, "u1", &[want(pid, 4)]).await.unwrap();
        let cart = sync_cart(&db, "u1", &[want(pid, 0)]).await.unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(stock_of(&db, pid).await, 10);
    }

    // ========================================================================
    // 失败路径：无部分生效
    // ========================================================================

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_whole_sync() {
        let db = in_memory_db().await;
        let a = seed_product(&db, "Plenty", 1.0, 10, 30, 0).await;
        let b = seed_product(&db, "Scarce", 1.0, 1, 30, 0).await;

        let err = sync_cart(&db, "u1", &[want(a, 2), want(b, 5)])
            .await
            .unwrap_err();
        match err {
            InventoryError::InsufficientStock { product_id, .. } => assert_eq!(product_id, b),
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // The earlier successful decrement of `a` was rolled back with it
        assert_eq!(stock_of(&db, a).await, 10);
        assert_eq!(stock_of(&db, b).await, 1);
        assert_eq!(cart_stock(&db, "u1").await, 0);
    }

    #[tokio::test]
    async fn test_unknown_product_fails_sync() {
        let db = in_memory_db().await;
        let err = sync_cart(&db, "u1", &[want(777, 1)]).await.unwrap_err();
        assert!(matches!(err, InventoryError::ProductNotFound(777)));
    }

    #[tokio::test]
    async fn test_negative_quantity_rejected() {
        let db = in_memory_db().await;
        let pid = seed_product(&db, "Widget", 9.9, 10, 30, 0).await;
        let err = sync_cart(&db, "u1", &[want(pid, -1)]).await.unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }

    // ========================================================================
    // 限购 (quota)
    // ========================================================================

    // Scenario C: limit 2, one prior order with qty 2 → adding 1 fails
    #[tokio::test]
    async fn test_quota_counts_prior_orders() {
        let db = in_memory_db().await;
        let pid = seed_product(&db, "Limited", 99.0, 10, 30, 2).await;

        let now = now_millis();
        let order_id: i64 = sqlx::query_scalar(
            "INSERT INTO orders (user_id, status, total_amount, created_at, updated_at) \
             VALUES ('u1', 'completed', 198.0, ?1, ?1) RETURNING id",
        )
        .bind(now)
        .fetch_one(&db.pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO order_item (order_id, product_id, quantity, price) \
             VALUES (?1, ?2, 2, 99.0)",
        )
        .bind(order_id)
        .bind(pid)
        .execute(&db.pool)
        .await
        .unwrap();

        let err = sync_cart(&db, "u1", &[want(pid, 1)]).await.unwrap_err();
        match err {
            InventoryError::QuotaExceeded {
                limit,
                bought,
                requested,
                ..
            } => {
                assert_eq!(limit, 2);
                assert_eq!(bought, 2);
                assert_eq!(requested, 1);
            }
            other => panic!("expected QuotaExceeded, got {other:?}"),
        }
        assert_eq!(stock_of(&db, pid).await, 10);
    }

    #[tokio::test]
    async fn test_cancelled_orders_do_not_count_toward_quota() {
        let db = in_memory_db().await;
        let pid = seed_product(&db, "Limited", 99.0, 10, 30, 2).await;

        let now = now_millis();
        let order_id: i64 = sqlx::query_scalar(
            "INSERT INTO orders (user_id, status, total_amount, created_at, updated_at) \
             VALUES ('u1', 'cancelled', 198.0, ?1, ?1) RETURNING id",
        )
        .bind(now)
        .fetch_one(&db.pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO order_item (order_id, product_id, quantity, price) \
             VALUES (?1, ?2, 2, 99.0)",
        )
        .bind(order_id)
        .bind(pid)
        .execute(&db.pool)
        .await
        .unwrap();

        let cart = sync_cart(&db, "u1", &[want(pid, 2)]).await.unwrap();
        assert_eq!(cart.items[0].quantity, 2);
    }

    // ========================================================================
    // 过期清扫
    // ========================================================================

    // Scenario A: hold expires → stock restored exactly once, cart empty
    #[tokio::test]
    async fn test_expired_hold_restored_exactly_once() {
        let db = in_memory_db().await;
        let pid = seed_product(&db, "Widget", 9.9, 10, 1, 0).await;

        sync_cart(&db, "u1", &[want(pid, 3)]).await.unwrap();
        assert_eq!(stock_of(&db, pid).await, 7);

        // Force the hold into the past instead of sleeping
        sqlx::query("UPDATE cart_item SET expires_at = ?1 WHERE user_id = 'u1'")
            .bind(now_millis() - 1)
            .execute(&db.pool)
            .await
            .unwrap();

        let cart = read_cart(&db, "u1").await.unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.removed_expired, 1);
        assert_eq!(stock_of(&db, pid).await, 10);

        // Second read: nothing left to restore
        let cart = read_cart(&db, "u1").await.unwrap();
        assert_eq!(cart.removed_expired, 0);
        assert_eq!(stock_of(&db, pid).await, 10);
    }

    #[tokio::test]
    async fn test_sync_sweeps_before_diffing() {
        let db = in_memory_db().await;
        let pid = seed_product(&db, "Widget", 9.9, 10, 30, 0).await;

        sync_cart(&db, "u1", &[want(pid, 3)]).await.unwrap();
        sqlx::query("UPDATE cart_item SET expires_at = ?1 WHERE user_id = 'u1'")
            .bind(now_millis() - 1)
            .execute(&db.pool)
            .await
            .unwrap();

        // The expired hold is released first, then 2 units re-reserved
        let cart = sync_cart(&db, "u1", &[want(pid, 2)]).await.unwrap();
        assert_eq!(cart.removed_expired, 1);
        assert_eq!(cart.items[0].quantity, 2);
        assert_eq!(stock_of(&db, pid).await, 8);
    }
}
