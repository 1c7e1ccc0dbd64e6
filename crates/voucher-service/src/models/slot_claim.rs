//! 兑换名额规划
//!
//! 根据券与其当前名额，决定本次兑换应如何落库。规划是纯函数，
//! Postgres 仓储在持锁事务中、内存仓储在互斥锁内各自调用一次，
//! 保证落库决策基于最新状态。

use crate::error::RejectionReason;

use super::redemption::{Redemption, SlotSummary};
use super::voucher::Voucher;

/// 名额认领方案
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotClaim {
    /// 用户自己的名额已兑换，仅刷新兑换时间，不占用新名额
    Restamp(i64),
    /// 认领用户自己的（或匿名的）未兑换名额
    Claim(i64),
    /// 将一个未绑定且未兑换的名额绑定给用户（需 CAS 保护）
    Adopt(i64),
    /// 新建名额
    Create,
}

impl SlotClaim {
    /// 规划兑换方案
    ///
    /// 匿名用户从不刷新他人的匿名名额，已满时直接拒绝
    pub fn plan(
        voucher: &Voucher,
        slots: &[Redemption],
        user: Option<&str>,
    ) -> Result<Self, RejectionReason> {
        let summary = SlotSummary::of(slots);
        let full = voucher.is_fully_redeemed(summary.redeemed);
        let identities_taken =
            !voucher.is_unlimited() && summary.bound as i64 >= voucher.user_limit as i64;

        let Some(user_id) = user else {
            return match find_unredeemed_unbound(slots) {
                Some(_) if full => Err(RejectionReason::AlreadyFullyRedeemed),
                Some(slot) => Ok(Self::Claim(slot.id)),
                None if full => Err(RejectionReason::AlreadyFullyRedeemed),
                None if identities_taken => Err(RejectionReason::NotValidForAccount),
                None => Ok(Self::Create),
            };
        };

        if let Some(own) = slots.iter().find(|s| s.belongs_to(Some(user_id))) {
            return match own.is_redeemed() {
                true => Ok(Self::Restamp(own.id)),
                false if full => Err(RejectionReason::AlreadyFullyRedeemed),
                false => Ok(Self::Claim(own.id)),
            };
        }

        if full {
            return Err(RejectionReason::AlreadyFullyRedeemed);
        }
        if identities_taken {
            return Err(RejectionReason::NotValidForAccount);
        }

        Ok(match find_unredeemed_unbound(slots) {
            Some(slot) => Self::Adopt(slot.id),
            None => Self::Create,
        })
    }

    /// 是否会占用一个新的兑换名额
    pub fn consumes_use(&self) -> bool {
        !matches!(self, Self::Restamp(_))
    }
}

/// 查找用户对应的名额
///
/// 匿名用户有多个匿名名额时优先返回未兑换的
pub fn find_own_slot<'a>(slots: &'a [Redemption], user: Option<&str>) -> Option<&'a Redemption> {
    match user {
        Some(_) => slots.iter().find(|s| s.belongs_to(user)),
        None => find_unredeemed_unbound(slots).or_else(|| slots.iter().find(|s| s.belongs_to(None))),
    }
}

fn find_unredeemed_unbound(slots: &[Redemption]) -> Option<&Redemption> {
    slots
        .iter()
        .find(|s| s.user_id.is_none() && !s.is_redeemed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VoucherType;
    use chrono::Utc;

    fn voucher(user_limit: i32) -> Voucher {
        Voucher {
            id: 7,
            code: "CODE".to_string(),
            voucher_type: VoucherType::new("monetary"),
            value: 10,
            user_limit,
            created_at: Utc::now(),
            valid_until: None,
            campaign_id: None,
        }
    }

    fn slot(id: i64, user: Option<&str>, redeemed: bool) -> Redemption {
        Redemption {
            id,
            voucher_id: 7,
            user_id: user.map(str::to_string),
            redeemed_at: redeemed.then(Utc::now),
        }
    }

    #[test]
    fn test_anonymous_on_fresh_voucher_creates() {
        assert_eq!(SlotClaim::plan(&voucher(1), &[], None), Ok(SlotClaim::Create));
    }

    #[test]
    fn test_anonymous_claims_unredeemed_null_slot() {
        let slots = [slot(1, None, true), slot(2, None, false)];
        assert_eq!(
            SlotClaim::plan(&voucher(2), &slots, None),
            Ok(SlotClaim::Claim(2))
        );
    }

    #[test]
    fn test_anonymous_never_restamps() {
        let slots = [slot(1, None, true)];
        assert_eq!(
            SlotClaim::plan(&voucher(1), &slots, None),
            Err(RejectionReason::AlreadyFullyRedeemed)
        );
    }

    #[test]
    fn test_anonymous_on_bound_voucher_is_not_valid() {
        let slots = [slot(1, Some("alice"), false)];
        assert_eq!(
            SlotClaim::plan(&voucher(1), &slots, None),
            Err(RejectionReason::NotValidForAccount)
        );
    }

    #[test]
    fn test_user_claims_reserved_slot() {
        let slots = [slot(3, Some("alice"), false)];
        assert_eq!(
            SlotClaim::plan(&voucher(1), &slots, Some("alice")),
            Ok(SlotClaim::Claim(3))
        );
    }

    #[test]
    fn test_user_restamps_own_redeemed_slot() {
        let slots = [slot(3, Some("alice"), true)];
        let plan = SlotClaim::plan(&voucher(1), &slots, Some("alice"));
        assert_eq!(plan, Ok(SlotClaim::Restamp(3)));
        assert!(!plan.unwrap().consumes_use());
    }

    #[test]
    fn test_user_adopts_unbound_slot() {
        let slots = [slot(4, None, false)];
        assert_eq!(
            SlotClaim::plan(&voucher(2), &slots, Some("bob")),
            Ok(SlotClaim::Adopt(4))
        );
    }

    #[test]
    fn test_user_rejected_when_identities_taken() {
        let slots = [slot(1, Some("alice"), false)];
        assert_eq!(
            SlotClaim::plan(&voucher(1), &slots, Some("bob")),
            Err(RejectionReason::NotValidForAccount)
        );
    }

    #[test]
    fn test_full_takes_precedence_over_identities() {
        let slots = [slot(1, Some("alice"), true), slot(2, Some("carol"), true)];
        assert_eq!(
            SlotClaim::plan(&voucher(2), &slots, Some("bob")),
            Err(RejectionReason::AlreadyFullyRedeemed)
        );
    }

    #[test]
    fn test_unlimited_always_creates_for_new_users() {
        let slots: Vec<_> = (0..50)
            .map(|i| slot(i, Some(format!("user-{i}").as_str()), true))
            .collect();
        assert_eq!(
            SlotClaim::plan(&voucher(0), &slots, Some("newcomer")),
            Ok(SlotClaim::Create)
        );
    }

    #[test]
    fn test_find_own_slot_prefers_unredeemed_anonymous() {
        let slots = [slot(1, None, true), slot(2, None, false)];
        assert_eq!(find_own_slot(&slots, None).map(|s| s.id), Some(2));

        let slots = [slot(1, None, true)];
        assert_eq!(find_own_slot(&slots, None).map(|s| s.id), Some(1));
        assert!(find_own_slot(&slots, Some("alice")).is_none());
    }
}
