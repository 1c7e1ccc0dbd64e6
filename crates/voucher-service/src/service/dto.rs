//! 服务层数据传输对象
//!
//! 定义服务层与外部交互使用的请求与视图，与内部领域模型解耦

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Redemption, Voucher, VoucherType};

/// 单张券创建请求
///
/// 未指定 code 时自动生成；users 中的每个用户会获得一个预留名额
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVoucherRequest {
    pub voucher_type: VoucherType,
    pub value: i64,
    pub users: Vec<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub prefix: String,
    pub campaign_id: Option<i64>,
    /// 默认 1（单次券）
    pub user_limit: i32,
    /// 显式指定的券码
    pub code: Option<String>,
    /// 是否分段，None 时使用配置默认值
    pub segmented: Option<bool>,
}

impl CreateVoucherRequest {
    pub fn new(voucher_type: impl Into<VoucherType>, value: i64) -> Self {
        Self {
            voucher_type: voucher_type.into(),
            value,
            users: Vec::new(),
            valid_until: None,
            prefix: String::new(),
            campaign_id: None,
            user_limit: 1,
            code: None,
            segmented: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.users.push(user_id.into());
        self
    }

    pub fn with_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users.extend(users.into_iter().map(Into::into));
        self
    }

    pub fn with_valid_until(mut self, valid_until: DateTime<Utc>) -> Self {
        self.valid_until = Some(valid_until);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_campaign(mut self, campaign_id: i64) -> Self {
        self.campaign_id = Some(campaign_id);
        self
    }

    pub fn with_user_limit(mut self, user_limit: i32) -> Self {
        self.user_limit = user_limit;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_segmented(mut self, segmented: bool) -> Self {
        self.segmented = Some(segmented);
        self
    }
}

/// 批量创建请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVouchersRequest {
    pub quantity: u32,
    pub voucher_type: VoucherType,
    pub value: i64,
    pub valid_until: Option<DateTime<Utc>>,
    pub prefix: String,
    pub campaign_id: Option<i64>,
    pub segmented: Option<bool>,
}

impl CreateVouchersRequest {
    pub fn new(quantity: u32, voucher_type: impl Into<VoucherType>, value: i64) -> Self {
        Self {
            quantity,
            voucher_type: voucher_type.into(),
            value,
            valid_until: None,
            prefix: String::new(),
            campaign_id: None,
            segmented: None,
        }
    }

    pub fn with_valid_until(mut self, valid_until: DateTime<Utc>) -> Self {
        self.valid_until = Some(valid_until);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_campaign(mut self, campaign_id: i64) -> Self {
        self.campaign_id = Some(campaign_id);
        self
    }

    pub fn with_segmented(mut self, segmented: bool) -> Self {
        self.segmented = Some(segmented);
        self
    }

    /// 展开为单张创建请求
    pub(crate) fn to_single(&self) -> CreateVoucherRequest {
        CreateVoucherRequest {
            voucher_type: self.voucher_type.clone(),
            value: self.value,
            users: Vec::new(),
            valid_until: self.valid_until,
            prefix: self.prefix.clone(),
            campaign_id: self.campaign_id,
            user_limit: 1,
            code: None,
            segmented: self.segmented,
        }
    }
}

/// 券状态视图
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherStatus {
    pub voucher: Voucher,
    pub redemptions: Vec<Redemption>,
    pub redeemed_count: usize,
    pub is_redeemed: bool,
    pub is_expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_redeemed_at: Option<DateTime<Utc>>,
    /// 不限人数时为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_uses: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_voucher_request_defaults() {
        let request = CreateVoucherRequest::new("monetary", 500);
        assert_eq!(request.user_limit, 1);
        assert!(request.users.is_empty());
        assert!(request.code.is_none());
        assert!(request.segmented.is_none());
    }

    #[test]
    fn test_create_voucher_request_builder() {
        let request = CreateVoucherRequest::new("percentage", 15)
            .with_users(["alice", "bob"])
            .with_user("carol")
            .with_prefix("SPRING-")
            .with_campaign(3)
            .with_user_limit(5)
            .with_segmented(true);

        assert_eq!(request.users, vec!["alice", "bob", "carol"]);
        assert_eq!(request.prefix, "SPRING-");
        assert_eq!(request.campaign_id, Some(3));
        assert_eq!(request.user_limit, 5);
        assert_eq!(request.segmented, Some(true));
    }

    #[test]
    fn test_batch_request_expands_to_single_use() {
        let single = CreateVouchersRequest::new(10, "monetary", 100)
            .with_prefix("B-")
            .to_single();
        assert_eq!(single.user_limit, 1);
        assert_eq!(single.prefix, "B-");
        assert!(single.users.is_empty());
    }
}
