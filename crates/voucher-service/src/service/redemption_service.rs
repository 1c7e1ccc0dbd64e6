//! 券兑换服务
//!
//! 执行 "未兑换 -> 已兑换" 的状态迁移，并在成功后广播兑换通知。
//!
//! ## 兑换流程
//!
//! 1. 仓储在单个事务内锁定券行、读取名额并重新规划（复用/认领/新建）
//! 2. 遇到存储冲突时按固定间隔重试一次，再次冲突则返回 `StoreConflict`
//! 3. 成功后记录指标，异步通知所有已注册的接收方
//!
//! 接收方失败不会回滚兑换。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};
use voucher_shared::config::VoucherConfig;
use voucher_shared::observability::metrics;
use voucher_shared::retry::{RetryPolicy, retry_with_policy};

use crate::clock::Clock;
use crate::error::{Result, VoucherError};
use crate::models::{Redemption, Voucher, VoucherType};
use crate::notification::{NotificationSender, RedemptionCompleted, RedemptionNotifier};
use crate::repository::VoucherRepositoryTrait;
use crate::service::eligibility::EligibilityEngine;

/// 券兑换服务
pub struct RedemptionService<R>
where
    R: VoucherRepositoryTrait,
{
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    eligibility: EligibilityEngine<R>,
    notification_sender: NotificationSender,
    retry_policy: RetryPolicy,
}

impl<R> RedemptionService<R>
where
    R: VoucherRepositoryTrait,
{
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>, config: &VoucherConfig) -> Self {
        Self {
            eligibility: EligibilityEngine::new(repo.clone(), clock.clone()),
            repo,
            clock,
            notification_sender: NotificationSender::new(),
            retry_policy: RetryPolicy::once(Duration::from_millis(config.redeem_retry_delay_ms)),
        }
    }

    /// 注册兑换通知接收方
    pub fn with_notifier(mut self, notifier: Arc<dyn RedemptionNotifier>) -> Self {
        info!(notifier = notifier.name(), "RedemptionService 通知接收方已注册");
        self.notification_sender.register(notifier);
        self
    }

    /// 兑换券
    ///
    /// 调用方应先通过校验；事务内仍会基于最新状态判定，名额已满等情况返回对应拒绝原因
    #[instrument(skip(self, voucher), fields(voucher_id = voucher.id, user = user.unwrap_or("-")))]
    pub async fn redeem(&self, voucher: &Voucher, user: Option<&str>) -> Result<Redemption> {
        let started = Instant::now();
        let now = self.clock.now();

        let result = retry_with_policy(
            &self.retry_policy,
            "voucher_redeem",
            VoucherError::is_conflict,
            || self.repo.claim_slot(voucher.id, user.map(str::to_string), now),
        )
        .await;

        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok(redemption) => {
                metrics::record_redemption("success", elapsed);
                info!(
                    redemption_id = redemption.id,
                    code = %voucher.code,
                    "券兑换成功"
                );

                self.notification_sender
                    .send_async(RedemptionCompleted::new(voucher, &redemption, now));
                Ok(redemption)
            }
            Err(e) => {
                let outcome = match &e {
                    VoucherError::Rejected(reason) => reason.code(),
                    VoucherError::StoreConflict => "conflict",
                    _ => "error",
                };
                metrics::record_redemption(outcome, elapsed);
                warn!(outcome, error = %e, "券兑换失败");
                Err(e)
            }
        }
    }

    /// 校验并兑换
    pub async fn validate_and_redeem(
        &self,
        code: &str,
        user: Option<&str>,
        allowed_types: Option<&[VoucherType]>,
    ) -> Result<(Voucher, Redemption)> {
        let voucher = self.eligibility.validate(code, user, allowed_types).await?;
        let redemption = self.redeem(&voucher, user).await?;
        Ok((voucher, redemption))
    }

    /// 校验引擎
    pub fn eligibility(&self) -> &EligibilityEngine<R> {
        &self.eligibility
    }
}
