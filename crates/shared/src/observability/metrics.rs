//! 业务指标模块
//!
//! 基于 metrics crate 记录券码相关指标。
//! 本库只负责记录，recorder（Prometheus 等）由宿主进程安装；未安装时记录为空操作。

/// 注册指标描述
///
/// 这些描述会出现在导出端的 HELP 注释中
pub fn describe_metrics(service_name: &str) {
    metrics::describe_counter!("voucher_created_total", "Total number of vouchers created");
    metrics::describe_counter!(
        "voucher_code_collisions_total",
        "Generated codes rejected by the unique constraint"
    );
    metrics::describe_counter!(
        "voucher_validations_total",
        "Total number of voucher validations by outcome"
    );
    metrics::describe_counter!(
        "voucher_redemptions_total",
        "Total number of redemption transitions by outcome"
    );
    metrics::describe_histogram!(
        "voucher_redemption_duration_seconds",
        "Redemption transition duration in seconds"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 记录券创建
#[inline]
pub fn record_voucher_created(voucher_type: &str, count: u64) {
    metrics::counter!(
        "voucher_created_total",
        "voucher_type" => voucher_type.to_string()
    )
    .increment(count);
}

/// 记录券码唯一约束冲突
#[inline]
pub fn record_code_collision() {
    metrics::counter!("voucher_code_collisions_total").increment(1);
}

/// 记录校验结果
///
/// outcome 为 "ok" 或拒绝原因码
#[inline]
pub fn record_validation(outcome: &'static str) {
    metrics::counter!("voucher_validations_total", "outcome" => outcome).increment(1);
}

/// 记录兑换
#[inline]
pub fn record_redemption(outcome: &'static str, duration_secs: f64) {
    metrics::counter!("voucher_redemptions_total", "outcome" => outcome).increment(1);

    metrics::histogram!("voucher_redemption_duration_seconds").record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 即使没有安装 recorder，这些函数也不应该 panic
        describe_metrics("voucher-test");
        record_voucher_created("monetary", 3);
        record_code_collision();
        record_validation("ok");
        record_validation("EXPIRED");
        record_redemption("success", 0.02);
    }
}
