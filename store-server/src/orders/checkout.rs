//! Order Transaction Orchestrator
//!
//! 结算是一个全有或全无的事务：任何一件商品扣减失败，整个订单
//! 不存在，不会出现"半个订单"。
//!
//! 购物车预留只是软持有：结算时先把持有量归还，再对每件商品重新执行
//! 权威的条件扣减作为真正的销售事务。两步在同一事务内，对有效持有
//! 净效果为零；即使购物车账目过期或损坏，条件扣减仍然兜底防超卖。
//! 结算后每条订单行在库存上恰好留有一次未偿扣减，失败/取消路径
//! 返还一次即可。

use crate::db::DbService;
use crate::db::models::{CartItem, LedgerEntryType, Order, OrderStatus, Product};
use crate::inventory::{self, InventoryError, InventoryResult};
use crate::utils::now_millis;
use crate::{cart, orders};

/// SQLite 写争用时整体重试的上限。事务已完整回滚，重试是安全的。
const MAX_ATTEMPTS: u32 = 3;

/// Convert the user's cart into an order in `reserved` status.
///
/// The expiry sweep runs first in its own committed transaction, then one
/// transaction does the rest:
/// 1. decrement stock per line (the authoritative gate)
/// 2. create the order with prices frozen at this instant
/// 3. ledger a `sale` entry per line
/// 4. clear the cart
pub async fn checkout(
    db: &DbService,
    user_id: &str,
    shipping_address: Option<&str>,
) -> InventoryResult<Order> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match checkout_once(db, user_id, shipping_address).await {
            Err(e) if e.is_retryable_contention() && attempt < MAX_ATTEMPTS => {
                tracing::warn!(user_id, attempt, "Checkout hit write contention, retrying");
                continue;
            }
            other => return other,
        }
    }
}

async fn checkout_once(
    db: &DbService,
    user_id: &str,
    shipping_address: Option<&str>,
) -> InventoryResult<Order> {
    let now = now_millis();

    // The sweep commits on its own: an aborted checkout must not resurrect
    // holds that had already timed out, and its release ledger rows stand
    // whether or not an order comes out of this call.
    let mut sweep_tx = db.pool.begin().await?;
    cart::sweep_expired(&mut *sweep_tx, user_id, now).await?;
    sweep_tx.commit().await?;

    let mut tx = db.pool.begin().await?;

    let lines = sqlx::query_as::<_, CartItem>("SELECT * FROM cart_item WHERE user_id = ?1")
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
    if lines.is_empty() {
        return Err(InventoryError::EmptyCart);
    }

    // Convert each hold into a sale: return the held units, then re-run the
    // authoritative conditional decrement against the live product row.
    // First failure aborts the whole transaction.
    let mut priced: Vec<(CartItem, Product, inventory::StockChange)> =
        Vec::with_capacity(lines.len());
    let mut total = 0.0f64;
    for line in lines {
        let product =
            sqlx::query_as::<_, Product>("SELECT * FROM product WHERE id = ?1 AND is_active = 1")
                .bind(line.product_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(InventoryError::ProductNotFound(line.product_id))?;

        let released = inventory::try_adjust(&mut *tx, line.product_id, line.quantity).await?;
        inventory::ledger::record(
            &mut *tx,
            &released,
            LedgerEntryType::Release,
            None,
            Some(user_id),
            Some("cart hold converted at checkout"),
        )
        .await?;

        let change = inventory::try_adjust(&mut *tx, line.product_id, -line.quantity).await?;
        total += product.price * line.quantity as f64;
        priced.push((line, product, change));
    }

    let order_id: i64 = sqlx::query_scalar(
        "INSERT INTO orders (user_id, status, total_amount, shipping_address, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5) RETURNING id",
    )
    .bind(user_id)
    .bind(OrderStatus::Reserved)
    .bind(total)
    .bind(shipping_address)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    for (line, product, change) in &priced {
        sqlx::query(
            "INSERT INTO order_item (order_id, product_id, quantity, price) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(product.price)
        .execute(&mut *tx)
        .await?;

        // The sale movement is ledgered against the order; the cart's earlier
        // reserve/release entries stand on their own.
        inventory::ledger::record(
            &mut *tx,
            change,
            LedgerEntryType::Sale,
            Some(order_id),
            Some(user_id),
            None,
        )
        .await?;
    }

    sqlx::query(
        "INSERT INTO order_status_history (order_id, status, reason, actor, created_at) \
         VALUES (?1, ?2, 'order placed', ?3, ?4)",
    )
    .bind(order_id)
    .bind(OrderStatus::Reserved)
    .bind(user_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM cart_item WHERE user_id = ?1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let order = orders::load_order(&mut *tx, order_id).await?;
    tx.commit().await?;

    tracing::info!(
        order_id,
        user_id,
        total_amount = total,
        "Checkout committed"
    );
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::sync_cart;
    use crate::db::models::DesiredItem;
    use crate::test_support::{in_memory_db, seed_product, stock_of};

    fn want(product_id: i64, quantity: i64) -> DesiredItem {
        DesiredItem {
            product_id,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_checkout_creates_reserved_order_with_frozen_prices() {
        let db = in_memory_db().await;
        let a = seed_product(&db, "Widget", 10.0, 10, 30, 0).await;
        let b = seed_product(&db, "Gadget", 2.5, 10, 30, 0).await;

        sync_cart(&db, "u1", &[want(a, 2), want(b, 4)]).await.unwrap();
        let order = checkout(&db, "u1", Some("1 Main St")).await.unwrap();

        assert_eq!(order.status, OrderStatus::Reserved);
        assert_eq!(order.total_amount, 30.0);
        assert_eq!(order.shipping_address.as_deref(), Some("1 Main St"));

        // Hold converted to sale: net stock unchanged by checkout itself
        assert_eq!(stock_of(&db, a).await, 8);
        assert_eq!(stock_of(&db, b).await, 6);

        // Catalog price change after checkout must not touch the order
        sqlx::query("UPDATE product SET price = 99.0 WHERE id = ?1")
            .bind(a)
            .execute(&db.pool)
            .await
            .unwrap();
        let price: f64 = sqlx::query_scalar(
            "SELECT price FROM order_item WHERE order_id = ?1 AND product_id = ?2",
        )
        .bind(order.id)
        .bind(a)
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(price, 10.0);

        // Cart is gone
        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cart_item WHERE user_id = 'u1'")
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let db = in_memory_db().await;
        let err = checkout(&db, "u1", None).await.unwrap_err();
        assert!(matches!(err, InventoryError::EmptyCart));
    }

    #[tokio::test]
    async fn test_all_or_nothing_on_line_failure() {
        let db = in_memory_db().await;
        let a = seed_product(&db, "Plenty", 1.0, 10, 30, 0).await;
        let b = seed_product(&db, "Pulled", 1.0, 3, 30, 0).await;

        sync_cart(&db, "u1", &[want(a, 2), want(b, 3)]).await.unwrap();
        // The second product is withdrawn from sale before checkout lands
        sqlx::query("UPDATE product SET is_active = 0 WHERE id = ?1")
            .bind(b)
            .execute(&db.pool)
            .await
            .unwrap();

        let err = checkout(&db, "u1", None).await.unwrap_err();
        assert!(matches!(err, InventoryError::ProductNotFound(id) if id == b));

        // No order, and the first line's conversion was rolled back with it
        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(orders, 0);
        assert_eq!(stock_of(&db, a).await, 8);
        assert_eq!(stock_of(&db, b).await, 0);
        let cart_lines: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cart_item WHERE user_id = 'u1'")
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(cart_lines, 2);
    }

    // Conversion is net-zero on stock and leaves exactly one sale entry
    #[tokio::test]
    async fn test_checkout_conserves_stock_and_ledgers_sale() {
        let db = in_memory_db().await;
        let pid = seed_product(&db, "Widget", 2.0, 5, 30, 0).await;

        sync_cart(&db, "u1", &[want(pid, 2)]).await.unwrap();
        assert_eq!(stock_of(&db, pid).await, 3);

        let order = checkout(&db, "u1", None).await.unwrap();
        assert_eq!(order.total_amount, 4.0);
        assert_eq!(stock_of(&db, pid).await, 3);

        let sales: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock_ledger WHERE product_id = ?1 AND entry_type = 'sale'",
        )
        .bind(pid)
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(sales, 1);
    }

    #[tokio::test]
    async fn test_expired_cart_lines_do_not_reach_checkout() {
        let db = in_memory_db().await;
        let a = seed_product(&db, "Widget", 10.0, 10, 30, 0).await;

        sync_cart(&db, "u1", &[want(a, 2)]).await.unwrap();
        sqlx::query("UPDATE cart_item SET expires_at = ?1 WHERE user_id = 'u1'")
            .bind(now_millis() - 1)
            .execute(&db.pool)
            .await
            .unwrap();

        // The sweep empties the cart first, so checkout sees nothing to buy
        let err = checkout(&db, "u1", None).await.unwrap_err();
        assert!(matches!(err, InventoryError::EmptyCart));

        // The sweep committed even though no order was created: stock is
        // back, the cart rows are gone, and the release is on the ledger
        assert_eq!(stock_of(&db, a).await, 10);
        let cart_lines: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cart_item WHERE user_id = 'u1'")
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(cart_lines, 0);
        let releases: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock_ledger WHERE product_id = ?1 AND entry_type = 'release'",
        )
        .bind(a)
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(releases, 1);
    }
}
