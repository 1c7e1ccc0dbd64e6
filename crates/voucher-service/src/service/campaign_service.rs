//! 活动管理服务
//!
//! 活动的创建、查询、删除（限制策略）、券转移与统计。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::clock::Clock;
use crate::error::{Result, VoucherError};
use crate::models::{Campaign, CampaignStats, NewCampaign, VoucherFilter};
use crate::repository::{CampaignRepositoryTrait, VoucherRepositoryTrait};

/// 活动管理服务
pub struct CampaignService<C, R>
where
    C: CampaignRepositoryTrait,
    R: VoucherRepositoryTrait,
{
    campaign_repo: Arc<C>,
    voucher_repo: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<C, R> CampaignService<C, R>
where
    C: CampaignRepositoryTrait,
    R: VoucherRepositoryTrait,
{
    pub fn new(campaign_repo: Arc<C>, voucher_repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self {
            campaign_repo,
            voucher_repo,
            clock,
        }
    }

    /// 创建活动
    #[instrument(skip(self, campaign), fields(name = %campaign.name))]
    pub async fn create_campaign(&self, campaign: NewCampaign) -> Result<Campaign> {
        let name = campaign.name.trim();
        if name.is_empty() {
            return Err(VoucherError::Validation("活动名称不能为空".to_string()));
        }

        let campaign = NewCampaign {
            name: name.to_string(),
            description: campaign.description,
        };
        let created = self.campaign_repo.create_campaign(&campaign).await?;
        info!(campaign_id = created.id, "活动创建成功");

        Ok(created)
    }

    pub async fn get_campaign(&self, id: i64) -> Result<Campaign> {
        self.campaign_repo
            .get_campaign(id)
            .await?
            .ok_or(VoucherError::CampaignNotFound(id))
    }

    pub async fn get_campaign_by_name(&self, name: &str) -> Result<Option<Campaign>> {
        self.campaign_repo.get_campaign_by_name(name).await
    }

    /// 按名称排序列出活动
    pub async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        self.campaign_repo.list_campaigns().await
    }

    /// 删除活动
    ///
    /// 仍有券引用时返回 `CampaignInUse`，需先调用 [`Self::reassign_vouchers`]
    #[instrument(skip(self))]
    pub async fn delete_campaign(&self, id: i64) -> Result<()> {
        self.campaign_repo.delete_campaign(id).await?;
        info!(campaign_id = id, "活动已删除");
        Ok(())
    }

    /// 转移活动下的全部券，to 为 None 时解除归属
    #[instrument(skip(self))]
    pub async fn reassign_vouchers(&self, from: i64, to: Option<i64>) -> Result<u64> {
        if to == Some(from) {
            return Err(VoucherError::Validation(
                "源活动与目标活动相同".to_string(),
            ));
        }

        let moved = self.campaign_repo.reassign_vouchers(from, to).await?;
        info!(from, to = ?to, moved, "活动券已转移");
        Ok(moved)
    }

    /// 活动统计
    #[instrument(skip(self))]
    pub async fn campaign_stats(&self, id: i64) -> Result<CampaignStats> {
        self.get_campaign(id).await?;

        let now = self.clock.now();
        Ok(CampaignStats {
            campaign_id: id,
            total: self.count(VoucherFilter::All, id, now).await?,
            used: self.count(VoucherFilter::Used, id, now).await?,
            unused: self.count(VoucherFilter::Unused, id, now).await?,
            expired: self.count(VoucherFilter::Expired, id, now).await?,
        })
    }

    async fn count(
        &self,
        filter: VoucherFilter,
        campaign_id: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.voucher_repo
            .count_vouchers(filter, Some(campaign_id), now)
            .await
    }
}
