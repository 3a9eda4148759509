//! 账本记录与行键
//!
//! 行键是 `MAX_TICKS - 写入时刻 ticks` 的定宽十进制字符串，
//! 因此按行键升序即按时间降序（最新的记录排在最前）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 9999-12-31T23:59:59.9999999Z 对应的 tick 值
pub const MAX_TICKS: i64 = 3_155_378_975_999_999_999;

/// 1970-01-01T00:00:00Z 对应的 tick 值
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// 每秒 tick 数（1 tick = 100ns）
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// 行键宽度，足以容纳 `MAX_TICKS`
pub const ROW_KEY_WIDTH: usize = 19;

/// 自 0001-01-01T00:00:00Z 起的 100ns 间隔数
pub fn ticks(at: DateTime<Utc>) -> i64 {
    at.timestamp()
        .saturating_mul(TICKS_PER_SECOND)
        .saturating_add(i64::from(at.timestamp_subsec_nanos() / 100))
        .saturating_add(UNIX_EPOCH_TICKS)
}

/// 计算写入时刻对应的行键
pub fn row_key(at: DateTime<Utc>) -> String {
    format!(
        "{:0width$}",
        MAX_TICKS - ticks(at),
        width = ROW_KEY_WIDTH
    )
}

/// 从行键还原写入时刻（精度 100ns）
pub fn row_key_time(key: &str) -> Option<DateTime<Utc>> {
    if key.len() != ROW_KEY_WIDTH {
        return None;
    }
    let reversed: i64 = key.parse().ok()?;
    let since_epoch = MAX_TICKS.checked_sub(reversed)?.checked_sub(UNIX_EPOCH_TICKS)?;
    let secs = since_epoch.div_euclid(TICKS_PER_SECOND);
    let nanos = (since_epoch.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// 最小/最大时间哨兵值不是合法的查询边界
///
/// tick 域之外（不晚于 0001-01-01T00:00:00Z 或不早于 `MAX_TICKS`）的时刻都视为哨兵。
pub fn is_sentinel(at: DateTime<Utc>) -> bool {
    let at_ticks = ticks(at);
    at_ticks <= 0 || at_ticks >= MAX_TICKS
}

/// 待写入的记录，时间戳由存储端分配
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub partition_key: String,
    pub row_key: String,
    pub severity: i32,
    pub message: String,
}

/// 账本中的一条记录，写入后不可修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogEntry {
    /// 分区键，等于应用名称
    pub partition_key: String,
    /// 倒序时间行键
    pub row_key: String,
    pub severity: i32,
    pub message: String,
    /// 存储端分配的时间戳
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_row_key_is_fixed_width() {
        let key = row_key(Utc::now());
        assert_eq!(key.len(), ROW_KEY_WIDTH);
        assert!(key.chars().all(|c| c.is_ascii_digit()));

        let far = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(row_key(far).len(), ROW_KEY_WIDTH);
    }

    #[test]
    fn test_later_writes_sort_first() {
        let t1 = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        let t2 = t1 + Duration::nanoseconds(100);
        let t3 = t1 + Duration::days(400);
        assert!(row_key(t1) > row_key(t2));
        assert!(row_key(t2) > row_key(t3));
    }

    #[test]
    fn test_known_tick_values() {
        let epoch = DateTime::from_timestamp(0, 0).unwrap();
        assert_eq!(ticks(epoch), UNIX_EPOCH_TICKS);
        assert_eq!(row_key(epoch), "2534023007999999999");
    }

    #[test]
    fn test_row_key_time_inverts_row_key() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap() + Duration::nanoseconds(1_234_500);
        assert_eq!(row_key_time(&row_key(at)), Some(at));
        assert_eq!(row_key_time("not-a-key"), None);
        assert_eq!(row_key_time("123"), None);
    }

    #[test]
    fn test_sentinels() {
        assert!(is_sentinel(DateTime::<Utc>::MIN_UTC));
        assert!(is_sentinel(DateTime::<Utc>::MAX_UTC));
        assert!(!is_sentinel(Utc::now()));

        let min_value = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(ticks(min_value), 0);
        assert!(is_sentinel(min_value));
        assert!(!is_sentinel(min_value + Duration::nanoseconds(100)));

        let max_value = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap()
            + Duration::nanoseconds(999_999_900);
        assert_eq!(ticks(max_value), MAX_TICKS);
        assert!(is_sentinel(max_value));
        assert!(!is_sentinel(max_value - Duration::nanoseconds(100)));
    }
}
