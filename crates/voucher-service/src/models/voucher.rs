//! 券实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 券码最大长度（含前缀与分隔符），与存储列宽一致
pub const MAX_CODE_LENGTH: usize = 64;

/// 券类型
///
/// 开放枚举，合法取值由配置中的 `voucher.types` 决定
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct VoucherType(String);

impl VoucherType {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VoucherType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VoucherType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for VoucherType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// 券
///
/// `user_limit` 含义：0 不限人数，1 单次券，N 最多 N 个不同用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub id: i64,
    /// 券码（全局唯一，创建后不可变）
    pub code: String,
    /// 券类型
    #[serde(rename = "type")]
    pub voucher_type: VoucherType,
    /// 面值，含义由类型决定
    pub value: i64,
    /// 可使用的不同用户数
    pub user_limit: i32,
    pub created_at: DateTime<Utc>,
    /// 有效期截止时间（null 表示永不过期）
    #[sqlx(default)]
    pub valid_until: Option<DateTime<Utc>>,
    /// 所属活动
    #[sqlx(default)]
    pub campaign_id: Option<i64>,
}

impl Voucher {
    /// 是否不限使用人数
    pub fn is_unlimited(&self) -> bool {
        self.user_limit == 0
    }

    /// 是否为单次券（匿名用户仅可使用单次券）
    pub fn is_single_use(&self) -> bool {
        self.user_limit == 1
    }

    /// 已兑换次数是否达到上限
    pub fn is_fully_redeemed(&self, redeemed_count: usize) -> bool {
        !self.is_unlimited() && redeemed_count as i64 >= self.user_limit as i64
    }

    /// 是否已过期（截止时间严格早于 now）
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| until < now)
    }

    /// 剩余可用次数，不限人数时返回 None
    pub fn remaining_uses(&self, redeemed_count: usize) -> Option<i64> {
        if self.is_unlimited() {
            return None;
        }
        Some((self.user_limit as i64 - redeemed_count as i64).max(0))
    }
}

/// 待创建的券
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVoucher {
    pub code: String,
    pub voucher_type: VoucherType,
    pub value: i64,
    pub user_limit: i32,
    pub valid_until: Option<DateTime<Utc>>,
    pub campaign_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// 券列表过滤条件
///
/// `Used` 与 `Unused` 互补，合起来覆盖全部券
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoucherFilter {
    #[default]
    All,
    /// 至少有一条已兑换记录
    Used,
    /// 没有任何已兑换记录（包括仅有预留名额的券）
    Unused,
    /// 截止时间早于当前时间
    Expired,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn voucher(user_limit: i32, valid_until: Option<DateTime<Utc>>) -> Voucher {
        Voucher {
            id: 1,
            code: "ABC".to_string(),
            voucher_type: VoucherType::new("monetary"),
            value: 100,
            user_limit,
            created_at: Utc::now(),
            valid_until,
            campaign_id: None,
        }
    }

    #[test]
    fn test_unlimited_voucher_never_fully_redeemed() {
        let v = voucher(0, None);
        assert!(!v.is_fully_redeemed(0));
        assert!(!v.is_fully_redeemed(10_000));
        assert_eq!(v.remaining_uses(5), None);
    }

    #[test]
    fn test_limited_voucher_fully_redeemed_at_limit() {
        let v = voucher(3, None);
        assert!(!v.is_fully_redeemed(2));
        assert!(v.is_fully_redeemed(3));
        assert_eq!(v.remaining_uses(1), Some(2));
        assert_eq!(v.remaining_uses(3), Some(0));
    }

    #[test]
    fn test_expiry_is_strict() {
        let now = Utc::now();
        assert!(!voucher(1, None).is_expired(now));
        assert!(!voucher(1, Some(now)).is_expired(now));
        assert!(voucher(1, Some(now - Duration::seconds(1))).is_expired(now));
        assert!(!voucher(1, Some(now + Duration::days(1))).is_expired(now));
    }

    #[test]
    fn test_serialize_uses_type_field() {
        let json = serde_json::to_value(voucher(1, None)).unwrap();
        assert_eq!(json["type"], "monetary");
        assert_eq!(json["userLimit"], 1);
        assert!(json.get("voucherType").is_none());
    }
}
