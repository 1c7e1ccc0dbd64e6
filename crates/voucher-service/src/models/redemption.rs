//! 兑换记录实体定义
//!
//! 每条记录是券的一个"名额"：user_id 为空表示匿名或尚未绑定用户，
//! redeemed_at 为空表示已预留但未兑换。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 兑换记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub id: i64,
    pub voucher_id: i64,
    #[sqlx(default)]
    pub user_id: Option<String>,
    #[sqlx(default)]
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl Redemption {
    /// 是否已兑换
    pub fn is_redeemed(&self) -> bool {
        self.redeemed_at.is_some()
    }

    /// 是否属于给定用户；user 为 None 时匹配匿名名额
    pub fn belongs_to(&self, user: Option<&str>) -> bool {
        self.user_id.as_deref() == user
    }
}

/// 名额汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotSummary {
    /// 已兑换名额数
    pub redeemed: usize,
    /// 已绑定用户的名额数
    pub bound: usize,
    /// 名额总数
    pub total: usize,
    /// 最近一次兑换时间
    pub last_redeemed_at: Option<DateTime<Utc>>,
}

impl SlotSummary {
    pub fn of(slots: &[Redemption]) -> Self {
        slots.iter().fold(
            Self {
                total: slots.len(),
                ..Self::default()
            },
            |mut acc, slot| {
                if slot.user_id.is_some() {
                    acc.bound += 1;
                }
                if let Some(at) = slot.redeemed_at {
                    acc.redeemed += 1;
                    acc.last_redeemed_at = Some(acc.last_redeemed_at.map_or(at, |prev| prev.max(at)));
                }
                acc
            },
        )
    }
}
