//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Campaign, NewCampaign, NewVoucher, Redemption, Voucher, VoucherFilter};

/// 券仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoucherRepositoryTrait: Send + Sync {
    // 券
    /// 插入券及预留名额；券码冲突返回 `DuplicateCode`
    async fn insert_voucher(&self, voucher: &NewVoucher, reserved_users: &[String])
    -> Result<Voucher>;
    async fn get_voucher(&self, id: i64) -> Result<Option<Voucher>>;
    async fn get_voucher_by_code(&self, code: &str) -> Result<Option<Voucher>>;
    async fn list_vouchers(
        &self,
        filter: VoucherFilter,
        campaign_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Voucher>>;
    async fn count_vouchers(
        &self,
        filter: VoucherFilter,
        campaign_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<i64>;

    // 兑换名额
    async fn list_redemptions(&self, voucher_id: i64) -> Result<Vec<Redemption>>;

    /// 原子地认领一个兑换名额
    ///
    /// 在最新状态上重新规划；并发冲突返回 `StoreConflict`，
    /// 名额已满等情况返回对应的拒绝原因
    async fn claim_slot(
        &self,
        voucher_id: i64,
        user_id: Option<String>,
        redeemed_at: DateTime<Utc>,
    ) -> Result<Redemption>;
}

/// 活动仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignRepositoryTrait: Send + Sync {
    /// 名称重复返回 `CampaignNameTaken`
    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign>;
    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>>;
    async fn get_campaign_by_name(&self, name: &str) -> Result<Option<Campaign>>;
    async fn list_campaigns(&self) -> Result<Vec<Campaign>>;
    /// 仍有券引用时返回 `CampaignInUse`
    async fn delete_campaign(&self, id: i64) -> Result<()>;
    /// 将活动下的券全部转移到另一个活动（或解除归属），返回转移数量
    async fn reassign_vouchers(&self, from: i64, to: Option<i64>) -> Result<u64>;
}
