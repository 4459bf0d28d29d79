//! Stock Ledger
//!
//! 只追加的库存台账。每条记录携带精确的 before/after 余额，
//! 与引发它的库存变动在同一事务内写入。
//!
//! ## 对账
//!
//! [`reconcile`] 从零重放某商品的全部台账：
//! - 每条的 `before_balance` 必须等于上一条的 `after_balance`（链连续性）
//! - 每条的 `after_balance` 必须等于 `before_balance + change`
//! - 重放终值必须等于当前 `product.stock`

use serde::Serialize;
use sqlx::SqliteConnection;

use super::{InventoryError, InventoryResult, StockChange};
use crate::db::models::{LedgerEntry, LedgerEntryType};
use crate::utils::now_millis;

/// Append one ledger entry within the caller's transaction.
///
/// Balances come from the [`StockChange`] the mutator returned, so the row is
/// exact by construction. Returns the entry's sequence id.
pub async fn record(
    conn: &mut SqliteConnection,
    change: &StockChange,
    entry_type: LedgerEntryType,
    order_id: Option<i64>,
    actor: Option<&str>,
    note: Option<&str>,
) -> InventoryResult<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO stock_ledger \
         (product_id, change, before_balance, after_balance, entry_type, order_id, actor, note, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
         RETURNING id",
    )
    .bind(change.product_id)
    .bind(change.delta)
    .bind(change.before)
    .bind(change.after)
    .bind(entry_type)
    .bind(order_id)
    .bind(actor)
    .bind(note)
    .bind(now_millis())
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Query ledger entries, newest first, optionally scoped to one product.
pub async fn query_entries(
    conn: &mut SqliteConnection,
    product_id: Option<i64>,
    limit: i64,
    offset: i64,
) -> InventoryResult<Vec<LedgerEntry>> {
    let entries = match product_id {
        Some(pid) => {
            sqlx::query_as::<_, LedgerEntry>(
                "SELECT * FROM stock_ledger WHERE product_id = ?1 \
                 ORDER BY id DESC LIMIT ?2 OFFSET ?3",
            )
            .bind(pid)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_as::<_, LedgerEntry>(
                "SELECT * FROM stock_ledger ORDER BY id DESC LIMIT ?1 OFFSET ?2",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await?
        }
    };
    Ok(entries)
}

/// 台账链断裂点
#[derive(Debug, Serialize)]
pub struct LedgerBreak {
    /// 断裂处的台账序列号
    pub entry_id: i64,
    /// 期望的 before_balance（上一条的 after_balance）
    pub expected_before: i64,
    /// 实际的 before_balance
    pub actual_before: i64,
}

/// 对账结果
#[derive(Debug, Serialize)]
pub struct Reconciliation {
    pub product_id: i64,
    /// 重放台账得到的余额
    pub ledger_balance: i64,
    /// 当前 `product.stock`
    pub stock: i64,
    pub entries: u64,
    pub breaks: Vec<LedgerBreak>,
    /// 链完整且重放终值等于当前库存
    pub consistent: bool,
}

/// Replay a product's full ledger from zero and compare with live stock.
pub async fn reconcile(
    conn: &mut SqliteConnection,
    product_id: i64,
) -> InventoryResult<Reconciliation> {
    let stock: i64 = sqlx::query_scalar("SELECT stock FROM product WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(InventoryError::ProductNotFound(product_id))?;

    let rows = sqlx::query_as::<_, LedgerEntry>(
        "SELECT * FROM stock_ledger WHERE product_id = ?1 ORDER BY id",
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut balance = 0i64;
    let mut breaks = Vec::new();
    for entry in &rows {
        if entry.before_balance != balance {
            breaks.push(LedgerBreak {
                entry_id: entry.id,
                expected_before: balance,
                actual_before: entry.before_balance,
            });
        }
        if entry.after_balance != entry.before_balance + entry.change {
            breaks.push(LedgerBreak {
                entry_id: entry.id,
                expected_before: entry.before_balance + entry.change,
                actual_before: entry.after_balance,
            });
        }
        balance = entry.after_balance;
    }

    let consistent = breaks.is_empty() && balance == stock;
    if !consistent {
        tracing::warn!(
            product_id,
            ledger_balance = balance,
            stock,
            breaks = breaks.len(),
            "Ledger reconciliation mismatch"
        );
    }

    Ok(Reconciliation {
        product_id,
        ledger_balance: balance,
        stock,
        entries: rows.len() as u64,
        breaks,
        consistent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::inventory::try_adjust;
    use crate::test_support::seed_product;

    // 往返：-5 再 +5，库存不变，两条台账净变动为零
    #[tokio::test]
    async fn test_round_trip_sums_to_zero() {
        let db = DbService::open_in_memory().await.unwrap();
        let pid = seed_product(&db, "Widget", 3.0, 10, 30, 0).await;

        let mut tx = db.pool.begin().await.unwrap();
        let down = try_adjust(&mut *tx, pid, -5).await.unwrap();
        record(&mut *tx, &down, LedgerEntryType::Reserve, None, None, None)
            .await
            .unwrap();
        let up = try_adjust(&mut *tx, pid, 5).await.unwrap();
        record(&mut *tx, &up, LedgerEntryType::Release, None, None, None)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let net: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(change), 0) FROM stock_ledger WHERE product_id = ?1 \
             AND entry_type IN ('reserve', 'release')",
        )
        .bind(pid)
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(net, 0);

        let stock: i64 = sqlx::query_scalar("SELECT stock FROM product WHERE id = ?1")
            .bind(pid)
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(stock, 10);
    }

    #[tokio::test]
    async fn test_reconcile_clean_history() {
        let db = DbService::open_in_memory().await.unwrap();
        let pid = seed_product(&db, "Widget", 3.0, 10, 30, 0).await;

        let mut tx = db.pool.begin().await.unwrap();
        for delta in [-3i64, -2, 4, -1] {
            let change = try_adjust(&mut *tx, pid, delta).await.unwrap();
            let entry_type = if delta < 0 {
                LedgerEntryType::Reserve
            } else {
                LedgerEntryType::Release
            };
            record(&mut *tx, &change, entry_type, None, None, None)
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();

        let mut conn = db.pool.acquire().await.unwrap();
        let report = reconcile(&mut *conn, pid).await.unwrap();
        assert!(report.consistent, "breaks: {:?}", report.breaks);
        assert_eq!(report.ledger_balance, report.stock);
        assert_eq!(report.stock, 8);
        // seed restock + four movements
        assert_eq!(report.entries, 5);
    }

    #[tokio::test]
    async fn test_reconcile_detects_unlogged_mutation() {
        let db = DbService::open_in_memory().await.unwrap();
        let pid = seed_product(&db, "Widget", 3.0, 10, 30, 0).await;

        // A stock write that bypassed the ledger — exactly what reconciliation
        // is there to catch.
        sqlx::query("UPDATE product SET stock = stock - 2 WHERE id = ?1")
            .bind(pid)
            .execute(&db.pool)
            .await
            .unwrap();

        let mut conn = db.pool.acquire().await.unwrap();
        let report = reconcile(&mut *conn, pid).await.unwrap();
        assert!(!report.consistent);
        assert_eq!(report.ledger_balance, 10);
        assert_eq!(report.stock, 8);
    }

    #[tokio::test]
    async fn test_reconcile_unknown_product() {
        let db = DbService::open_in_memory().await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        let err = reconcile(&mut *conn, 42).await.unwrap_err();
        assert!(matches!(err, InventoryError::ProductNotFound(42)));
    }
}
