//! Cart Module
//!
//! 软预留（soft hold）：加入购物车立即扣减库存，`expires_at` 到期由
//! 惰性清扫（任意购物车读写前）或订单级 Reaper 返还。

pub mod manager;

pub use manager::{read_cart, sweep_expired, sync_cart};
