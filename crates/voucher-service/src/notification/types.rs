//! 通知事件类型

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Redemption, Voucher, VoucherType};

/// 兑换完成事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionCompleted {
    pub event_id: Uuid,
    pub voucher_id: i64,
    pub redemption_id: i64,
    pub code: String,
    #[serde(rename = "type")]
    pub voucher_type: VoucherType,
    pub value: i64,
    pub user_id: Option<String>,
    pub redeemed_at: DateTime<Utc>,
}

impl RedemptionCompleted {
    pub fn new(voucher: &Voucher, redemption: &Redemption, redeemed_at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            voucher_id: voucher.id,
            redemption_id: redemption.id,
            code: voucher.code.clone(),
            voucher_type: voucher.voucher_type.clone(),
            value: voucher.value,
            user_id: redemption.user_id.clone(),
            redeemed_at: redemption.redeemed_at.unwrap_or(redeemed_at),
        }
    }
}
