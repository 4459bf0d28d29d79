//! Product Model
//!
//! `stock` 是可售数量的唯一事实来源 — 预留直接从该字段扣减，
//! 不是"总量减预留"的派生值。

use serde::{Deserialize, Serialize};

/// Sellable item
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
    /// Available units. Never negative; enforced by the atomic mutator.
    pub stock: i64,
    /// Minutes a cart hold survives before the sweep returns it.
    pub reservation_minutes: i64,
    /// Lifetime per-buyer purchase cap. 0 = unlimited.
    pub quota_limit: i64,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

fn default_reservation_minutes() -> i64 {
    30
}

/// Create payload
#[derive(Debug, Clone, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    pub price: f64,
    /// Initial stock provision — recorded as a `restock` ledger entry.
    #[serde(default)]
    pub stock: i64,
    #[serde(default = "default_reservation_minutes")]
    pub reservation_minutes: i64,
    #[serde(default)]
    pub quota_limit: i64,
}

/// Update payload
///
/// `stock` 不在此处更新 — 所有库存变动必须走 inventory 模块
/// (原子扣减 + 台账)，目录编辑没有特权旁路。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub reservation_minutes: Option<i64>,
    pub quota_limit: Option<i64>,
    pub is_active: Option<bool>,
}
