//! 时间工具函数
//!
//! 全栈统一使用 `i64` Unix millis；日历计算（自然日边界）用 chrono。

use chrono::{DateTime, NaiveDate, Utc};

/// 当前时间 (Unix millis)
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 分钟 → 毫秒
pub fn minutes_to_millis(minutes: i64) -> i64 {
    minutes * 60 * 1000
}

/// Unix millis → 自然日 (UTC)
///
/// 用于"同一自然日"判断（重复凭证检测）。
pub fn to_calendar_date(millis: i64) -> NaiveDate {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.date_naive())
        .unwrap_or_else(|| Utc::now().date_naive())
}

/// 自然日起始 (00:00:00 UTC) → Unix millis
pub fn day_start_millis(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc().timestamp_millis())
        .unwrap_or(0)
}

/// 自然日结束 → 次日 00:00:00 的 Unix millis
///
/// 调用方使用 `< end` (不含) 语义。
pub fn day_end_millis(date: NaiveDate) -> i64 {
    let next_day = date.succ_opt().unwrap_or(date);
    day_start_millis(next_day)
}
