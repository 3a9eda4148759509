//! 账本 Prometheus 指标

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts, Registry};

lazy_static! {
    /// 写入结果计数（written / filtered / dropped）
    pub static ref LEDGER_WRITES: IntCounterVec = IntCounterVec::new(
        Opts::new("ledger_writes_total", "Total number of ledger write attempts by outcome")
            .namespace("sourcelinks"),
        &["outcome"]
    ).unwrap();

    /// 存储故障计数
    pub static ref LEDGER_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("ledger_failures_total", "Total number of ledger storage failures by operation")
            .namespace("sourcelinks"),
        &["operation"]
    ).unwrap();
}

/// 把账本指标注册到指定 Registry
pub fn register_ledger_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(LEDGER_WRITES.clone()))?;
    registry.register(Box::new(LEDGER_FAILURES.clone()))?;
    Ok(())
}

pub(crate) fn record_write(outcome: &str) {
    LEDGER_WRITES.with_label_values(&[outcome]).inc();
}

pub(crate) fn record_failure(operation: &str) {
    LEDGER_FAILURES.with_label_values(&[operation]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_record() {
        let registry = Registry::new();
        register_ledger_metrics(&registry).unwrap();
        record_write("written");
        record_failure("delete");

        let families = registry.gather();
        let names: Vec<_> = families.iter().map(|f| f.get_name().to_string()).collect();
        assert!(names.contains(&"sourcelinks_ledger_writes_total".to_string()));
        assert!(names.contains(&"sourcelinks_ledger_failures_total".to_string()));

        // 同一 Registry 不能重复注册
        assert!(register_ledger_metrics(&registry).is_err());
    }
}
