//! Atomic Stock Mutator
//!
//! 唯一允许修改 `product.stock` 的原语。检查与更新合并为单条条件
//! UPDATE（带 RETURNING），并发扣减同一件商品时由存储层保证恰好一个
//! 成功 — 应用层不做任何读-改-写。

use sqlx::SqliteConnection;

use super::ledger;
use super::{InventoryError, InventoryResult};
use crate::db::DbService;
use crate::db::models::LedgerEntryType;
use crate::utils::now_millis;

/// Outcome of a successful stock mutation — exact before/after balances
/// for the accompanying ledger entry.
#[derive(Debug, Clone, Copy)]
pub struct StockChange {
    pub product_id: i64,
    pub before: i64,
    pub after: i64,
    pub delta: i64,
}

/// Conditionally adjust a product's stock by `delta`.
///
/// - `delta < 0` (consume): succeeds only if `stock + delta >= 0`, checked and
///   applied in one indivisible statement.
/// - `delta > 0` (return): always succeeds — callers return exactly what they
///   decremented, over-return is their bug, not this layer's.
/// - `delta == 0` is rejected.
///
/// Runs on a plain connection so callers can place it inside their own
/// transaction together with the ledger write and any order/cart mutation.
pub async fn try_adjust(
    conn: &mut SqliteConnection,
    product_id: i64,
    delta: i64,
) -> InventoryResult<StockChange> {
    if delta == 0 {
        return Err(InventoryError::Validation(
            "stock adjustment delta must be non-zero".to_string(),
        ));
    }

    let after: Option<i64> = sqlx::query_scalar(
        "UPDATE product SET stock = stock + ?1, updated_at = ?3 \
         WHERE id = ?2 AND stock + ?1 >= 0 \
         RETURNING stock",
    )
    .bind(delta)
    .bind(product_id)
    .bind(now_millis())
    .fetch_optional(&mut *conn)
    .await?;

    match after {
        Some(after) => Ok(StockChange {
            product_id,
            before: after - delta,
            after,
            delta,
        }),
        None => {
            // Zero rows: either the product is missing or the floor would be
            // crossed. No mutation happened in either case.
            let available: Option<i64> =
                sqlx::query_scalar("SELECT stock FROM product WHERE id = ?1")
                    .bind(product_id)
                    .fetch_optional(&mut *conn)
                    .await?;

            match available {
                Some(available) => Err(InventoryError::InsufficientStock {
                    product_id,
                    requested: -delta,
                    available,
                }),
                None => Err(InventoryError::ProductNotFound(product_id)),
            }
        }
    }
}

/// Admin manual stock adjustment (`+N` / `-N` with a mandatory reason).
///
/// Same mutator, same ledger, same non-negativity gate as every other path.
/// Positive deltas are recorded as `restock`, negative as `adjustment`.
pub async fn adjust_stock(
    db: &DbService,
    product_id: i64,
    delta: i64,
    reason: &str,
    actor: &str,
) -> InventoryResult<StockChange> {
    if reason.trim().is_empty() {
        return Err(InventoryError::Validation(
            "adjustment reason is required".to_string(),
        ));
    }

    let entry_type = if delta > 0 {
        LedgerEntryType::Restock
    } else {
        LedgerEntryType::Adjustment
    };

    let mut tx = db.pool.begin().await?;
    let change = try_adjust(&mut *tx, product_id, delta).await?;
    ledger::record(
        &mut *tx,
        &change,
        entry_type,
        None,
        Some(actor),
        Some(reason),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        product_id,
        delta,
        stock = change.after,
        actor,
        "Manual stock adjustment applied"
    );

    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::test_support::{seed_product, temp_db};

    #[tokio::test]
    async fn test_adjust_down_and_up() {
        let db = DbService::open_in_memory().await.unwrap();
        let pid = seed_product(&db, "Widget", 9.5, 10, 30, 0).await;

        let mut conn = db.pool.acquire().await.unwrap();
        let change = try_adjust(&mut *conn, pid, -4).await.unwrap();
        assert_eq!(change.before, 10);
        assert_eq!(change.after, 6);

        let change = try_adjust(&mut *conn, pid, 4).await.unwrap();
        assert_eq!(change.before, 6);
        assert_eq!(change.after, 10);
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_not_applied() {
        let db = DbService::open_in_memory().await.unwrap();
        let pid = seed_product(&db, "Widget", 9.5, 2, 30, 0).await;

        let mut conn = db.pool.acquire().await.unwrap();
        let err = try_adjust(&mut *conn, pid, -5).await.unwrap_err();
        match err {
            InventoryError::InsufficientStock {
                product_id,
                requested,
                available,
            } => {
                assert_eq!(product_id, pid);
                assert_eq!(requested, 5);
                assert_eq!(available, 2);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // Verify on the held connection; the in-memory pool has only one
        let stock: i64 = sqlx::query_scalar("SELECT stock FROM product WHERE id = ?1")
            .bind(pid)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(stock, 2);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let db = DbService::open_in_memory().await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        let err = try_adjust(&mut *conn, 999, -1).await.unwrap_err();
        assert!(matches!(err, InventoryError::ProductNotFound(999)));
    }

    #[tokio::test]
    async fn test_zero_delta_rejected() {
        let db = DbService::open_in_memory().await.unwrap();
        let pid = seed_product(&db, "Widget", 9.5, 1, 30, 0).await;
        let mut conn = db.pool.acquire().await.unwrap();
        let err = try_adjust(&mut *conn, pid, 0).await.unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }

    // 并发争用：库存 5，8 个并发扣减各 1 → 恰好 5 成功 3 失败
    #[tokio::test]
    async fn test_concurrent_decrements_never_oversell() {
        let (db, _dir) = temp_db().await;
        let pid = seed_product(&db, "Last Units", 19.9, 5, 30, 0).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = db.pool.clone();
            handles.push(tokio::spawn(async move {
                let mut conn = pool.acquire().await.unwrap();
                try_adjust(&mut *conn, pid, -1).await
            }));
        }

        let mut ok = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(InventoryError::InsufficientStock { .. }) => insufficient += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(ok, 5);
        assert_eq!(insufficient, 3);

        let stock: i64 = sqlx::query_scalar("SELECT stock FROM product WHERE id = ?1")
            .bind(pid)
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(stock, 0);
    }

    #[tokio::test]
    async fn test_admin_adjust_rejected_below_floor() {
        let db = DbService::open_in_memory().await.unwrap();
        let pid = seed_product(&db, "Damaged Goods", 5.0, 2, 30, 0).await;

        let err = adjust_stock(&db, pid, -5, "damaged", "admin-1")
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { .. }));

        let stock: i64 = sqlx::query_scalar("SELECT stock FROM product WHERE id = ?1")
            .bind(pid)
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(stock, 2);
    }

    #[tokio::test]
    async fn test_admin_adjust_requires_reason() {
        let db = DbService::open_in_memory().await.unwrap();
        let pid = seed_product(&db, "Widget", 5.0, 2, 30, 0).await;
        let err = adjust_stock(&db, pid, -1, "  ", "admin-1").await.unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }
}
