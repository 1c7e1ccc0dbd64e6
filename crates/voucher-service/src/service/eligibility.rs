//! 券码校验引擎
//!
//! 判断给定券码能否被（可选的）用户在当前场景下兑换，不能时给出具体原因。
//!
//! ## 校验顺序（先命中者返回）
//!
//! 1. 券码不存在 -> `CodeNotFound`
//! 2. 匿名用户且非单次券 -> `UserRequired`
//! 3. 已兑换次数达到上限 -> `AlreadyFullyRedeemed`
//! 4. 用户已有名额：已兑换 -> `AlreadyUsedByAccount`，未兑换则跳过第 5 步
//! 5. 用户无名额且限制人数：名额已全部绑定 -> `NotValidForAccount`
//! 6. 类型不在允许范围 -> `TypeNotAllowedHere`
//! 7. 已过期 -> `Expired`
//!
//! 校验只读，结果仅供参考；兑换事务内会基于最新状态再次判定。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use voucher_shared::observability::metrics;

use crate::clock::Clock;
use crate::error::{RejectionReason, Result, VoucherError};
use crate::models::slot_claim::find_own_slot;
use crate::models::{Redemption, SlotSummary, Voucher, VoucherType};
use crate::repository::VoucherRepositoryTrait;

/// 对已加载的券与名额执行校验（第 2 步起）
pub fn evaluate(
    voucher: &Voucher,
    slots: &[Redemption],
    user: Option<&str>,
    allowed_types: Option<&[VoucherType]>,
    now: DateTime<Utc>,
) -> std::result::Result<(), RejectionReason> {
    if user.is_none() && !voucher.is_single_use() {
        return Err(RejectionReason::UserRequired);
    }

    let summary = SlotSummary::of(slots);
    if voucher.is_fully_redeemed(summary.redeemed) {
        return Err(RejectionReason::AlreadyFullyRedeemed);
    }

    match find_own_slot(slots, user) {
        Some(slot) if slot.is_redeemed() => return Err(RejectionReason::AlreadyUsedByAccount),
        Some(_) => {}
        None if !voucher.is_unlimited() => {
            let limit = voucher.user_limit as i64;
            if summary.bound as i64 >= limit {
                return Err(RejectionReason::NotValidForAccount);
            }
            if summary.redeemed as i64 >= limit {
                return Err(RejectionReason::AlreadyFullyRedeemed);
            }
        }
        None => {}
    }

    if let Some(allowed) = allowed_types {
        if !allowed.contains(&voucher.voucher_type) {
            return Err(RejectionReason::TypeNotAllowedHere);
        }
    }

    if voucher.is_expired(now) {
        return Err(RejectionReason::Expired);
    }

    Ok(())
}

/// 券码校验引擎
pub struct EligibilityEngine<R>
where
    R: VoucherRepositoryTrait,
{
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R> EligibilityEngine<R>
where
    R: VoucherRepositoryTrait,
{
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// 校验券码
    ///
    /// 通过时返回券，拒绝时返回 `VoucherError::Rejected`
    #[instrument(skip(self, allowed_types), fields(code = %code, user = user.unwrap_or("-")))]
    pub async fn validate(
        &self,
        code: &str,
        user: Option<&str>,
        allowed_types: Option<&[VoucherType]>,
    ) -> Result<Voucher> {
        let outcome = self.check(code, user, allowed_types).await;

        match &outcome {
            Ok(voucher) => {
                metrics::record_validation("ok");
                info!(voucher_id = voucher.id, "券码校验通过");
            }
            Err(VoucherError::Rejected(reason)) => {
                metrics::record_validation(reason.code());
                info!(reason = reason.code(), "券码校验未通过");
            }
            Err(_) => metrics::record_validation("error"),
        }

        outcome
    }

    async fn check(
        &self,
        code: &str,
        user: Option<&str>,
        allowed_types: Option<&[VoucherType]>,
    ) -> Result<Voucher> {
        let voucher = self
            .repo
            .get_voucher_by_code(code)
            .await?
            .ok_or(RejectionReason::CodeNotFound)?;

        let slots = self.repo.list_redemptions(voucher.id).await?;
        evaluate(&voucher, &slots, user, allowed_types, self.clock.now())?;

        Ok(voucher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::repository::MockVoucherRepositoryTrait;
    use chrono::Duration;

    fn voucher(user_limit: i32) -> Voucher {
        Voucher {
            id: 1,
            code: "CODE".to_string(),
            voucher_type: VoucherType::new("monetary"),
            value: 100,
            user_limit,
            created_at: Utc::now(),
            valid_until: None,
            campaign_id: None,
        }
    }

    fn slot(id: i64, user: Option<&str>, redeemed: bool) -> Redemption {
        Redemption {
            id,
            voucher_id: 1,
            user_id: user.map(str::to_string),
            redeemed_at: redeemed.then(Utc::now),
        }
    }

    #[test]
    fn test_anonymous_requires_single_use() {
        let now = Utc::now();
        assert_eq!(evaluate(&voucher(1), &[], None, None, now), Ok(()));
        assert_eq!(
            evaluate(&voucher(0), &[], None, None, now),
            Err(RejectionReason::UserRequired)
        );
        assert_eq!(
            evaluate(&voucher(3), &[], None, None, now),
            Err(RejectionReason::UserRequired)
        );
    }

    #[test]
    fn test_fully_redeemed_before_account_checks() {
        let slots = [slot(1, Some("alice"), true)];
        assert_eq!(
            evaluate(&voucher(1), &slots, Some("alice"), None, Utc::now()),
            Err(RejectionReason::AlreadyFullyRedeemed)
        );
    }

    #[test]
    fn test_already_used_by_account() {
        let slots = [slot(1, Some("alice"), true)];
        assert_eq!(
            evaluate(&voucher(2), &slots, Some("alice"), None, Utc::now()),
            Err(RejectionReason::AlreadyUsedByAccount)
        );
        assert_eq!(
            evaluate(&voucher(0), &slots, Some("alice"), None, Utc::now()),
            Err(RejectionReason::AlreadyUsedByAccount)
        );
    }

    #[test]
    fn test_reserved_slot_skips_identity_check() {
        let slots = [slot(1, Some("alice"), false)];
        assert_eq!(
            evaluate(&voucher(1), &slots, Some("alice"), None, Utc::now()),
            Ok(())
        );
    }

    #[test]
    fn test_bound_to_other_user_is_not_valid() {
        let slots = [slot(1, Some("alice"), false)];
        assert_eq!(
            evaluate(&voucher(1), &slots, Some("bob"), None, Utc::now()),
            Err(RejectionReason::NotValidForAccount)
        );
    }

    #[test]
    fn test_type_not_allowed_precedes_expiry() {
        let mut v = voucher(1);
        v.valid_until = Some(Utc::now() - Duration::days(1));
        let allowed = [VoucherType::new("percentage")];

        assert_eq!(
            evaluate(&v, &[], None, Some(&allowed), Utc::now()),
            Err(RejectionReason::TypeNotAllowedHere)
        );
        assert_eq!(
            evaluate(&v, &[], None, None, Utc::now()),
            Err(RejectionReason::Expired)
        );
    }

    #[test]
    fn test_allowed_type_passes() {
        let allowed = [VoucherType::new("monetary"), VoucherType::new("percentage")];
        assert_eq!(
            evaluate(&voucher(1), &[], None, Some(&allowed), Utc::now()),
            Ok(())
        );
    }

    #[tokio::test]
    async fn test_validate_unknown_code() {
        let mut repo = MockVoucherRepositoryTrait::new();
        repo.expect_get_voucher_by_code().returning(|_| Ok(None));
        repo.expect_list_redemptions().never();

        let engine = EligibilityEngine::new(Arc::new(repo), Arc::new(ManualClock::new(Utc::now())));
        let err = engine.validate("NOPE", None, None).await.unwrap_err();
        assert_eq!(err.rejection(), Some(RejectionReason::CodeNotFound));
    }

    #[tokio::test]
    async fn test_validate_uses_clock_for_expiry() {
        let now = Utc::now();
        let mut expiring = voucher(1);
        expiring.valid_until = Some(now + Duration::hours(1));

        let mut repo = MockVoucherRepositoryTrait::new();
        let stored = expiring.clone();
        repo.expect_get_voucher_by_code()
            .returning(move |_| Ok(Some(stored.clone())));
        repo.expect_list_redemptions().returning(|_| Ok(vec![]));

        let clock = Arc::new(ManualClock::new(now));
        let engine = EligibilityEngine::new(Arc::new(repo), clock.clone());

        assert_eq!(engine.validate("CODE", None, None).await.unwrap(), expiring);

        clock.advance(Duration::hours(2));
        let err = engine.validate("CODE", None, None).await.unwrap_err();
        assert_eq!(err.rejection(), Some(RejectionReason::Expired));
    }
}
