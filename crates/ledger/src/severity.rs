//! 严重级别与写入过滤

use serde::{Deserialize, Serialize};

/// 不过滤任何写入的阈值
pub const UNFILTERED: i32 = -1;

/// 严重级别，数值越小越严重
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Severity {
    /// 严重问题
    Exception = 1,
    /// 需要留意的事项
    Alert = 3,
    /// 提示信息
    Info = 5,
    /// 调试信息
    Debug = 7,
}

impl Severity {
    pub fn level(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Exception => "SEV_EXCEPTION",
            Self::Alert => "SEV_ALERT",
            Self::Info => "SEV_INFO",
            Self::Debug => "SEV_DEBUG",
        }
    }
}

/// 写入阈值
///
/// 启动时从配置构造一次，之后只读。级别数值大于 `max` 的写入被静默跳过；
/// `max = -1` 表示不过滤。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityFilter {
    max: i32,
}

impl SeverityFilter {
    pub fn new(max: i32) -> Self {
        Self { max }
    }

    pub fn unfiltered() -> Self {
        Self::new(UNFILTERED)
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn is_unfiltered(&self) -> bool {
        self.max == UNFILTERED
    }

    /// 该级别的写入是否放行
    pub fn allows(&self, level: i32) -> bool {
        self.is_unfiltered() || level <= self.max
    }
}

impl Default for SeverityFilter {
    fn default() -> Self {
        Self::unfiltered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfiltered_allows_everything() {
        let filter = SeverityFilter::unfiltered();
        for sev in [
            Severity::Exception,
            Severity::Alert,
            Severity::Info,
            Severity::Debug,
        ] {
            assert!(filter.allows(sev.level()));
        }
        assert!(filter.allows(1_000));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let filter = SeverityFilter::new(Severity::Alert.level());
        assert!(filter.allows(Severity::Exception.level()));
        assert!(filter.allows(Severity::Alert.level()));
        assert!(!filter.allows(Severity::Info.level()));
        assert!(!filter.allows(Severity::Debug.level()));
    }

    #[test]
    fn test_zero_threshold_blocks_all_levels() {
        let filter = SeverityFilter::new(0);
        assert!(!filter.allows(Severity::Exception.level()));
    }
}
