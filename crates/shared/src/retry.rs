//! 冲突重试
//!
//! 对并发写冲突（行锁不可用、序列化失败等）按固定间隔有限次重试。
//! 哪些错误可以重试由调用方通过 `is_retryable` 判定，其余错误立即返回。

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次执行）
    pub max_retries: u32,
    /// 两次执行之间的等待时间
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// 只重试一次
    pub fn once(delay: Duration) -> Self {
        Self::new(1, delay)
    }

    /// 不重试
    pub fn never() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// 已失败 `failures` 次后是否还能再试
    pub fn allows(&self, failures: u32) -> bool {
        failures <= self.max_retries
    }
}

/// 按策略执行异步操作
///
/// 返回最后一次执行的结果；可重试错误在用尽次数后原样返回
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut failures: u32 = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if failures > 0 {
                    debug!(operation = operation_name, failures, "重试后成功");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        failures += 1;
        if !is_retryable(&err) || !policy.allows(failures) {
            return Err(err);
        }

        warn!(
            operation = operation_name,
            failures,
            delay_ms = policy.delay.as_millis() as u64,
            error = %err,
            "操作冲突，等待后重试"
        );
        tokio::time::sleep(policy.delay).await;
    }
}
