//! Stock Ledger Model
//!
//! 库存台账：每次库存变动一条不可变记录。
//! 按 id 顺序重放所有条目必须精确还原当前 `product.stock`（对账不变式）。

use serde::{Deserialize, Serialize};

/// Ledger entry type（枚举，非自由文本 — `note` 字段承载人类备注）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LedgerEntryType {
    /// Cart soft hold took units
    Reserve,
    /// Expired hold returned units
    Release,
    /// Checkout committed a sale
    Sale,
    /// Order cancellation returned units
    Cancel,
    /// Admin manual adjustment (signed)
    Adjustment,
    /// Stock provisioned (product creation, replenishment)
    Restock,
}

impl std::fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LedgerEntryType::Reserve => "reserve",
            LedgerEntryType::Release => "release",
            LedgerEntryType::Sale => "sale",
            LedgerEntryType::Cancel => "cancel",
            LedgerEntryType::Adjustment => "adjustment",
            LedgerEntryType::Restock => "restock",
        };
        write!(f, "{}", s)
    }
}

/// Immutable audit row — never updated or deleted once written
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    /// Global sequence (rowid) — replay order
    pub id: i64,
    pub product_id: i64,
    /// Signed delta (positive = stock returned, negative = consumed)
    pub change: i64,
    pub before_balance: i64,
    pub after_balance: i64,
    pub entry_type: LedgerEntryType,
    /// Causing order, if any
    pub order_id: Option<i64>,
    /// Operator id; None = system
    pub actor: Option<String>,
    /// Free-text human context (e.g. adjustment reason)
    pub note: Option<String>,
    pub created_at: i64,
}
